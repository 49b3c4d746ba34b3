//! Response envelopes per endpoint.
//!
//! Payloads are validated here, at the edge, so nothing loosely typed flows
//! further into the cache.

use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;
use tracing::warn;

use super::error::ApiError;
use super::transport::{ApiResponse, ResponseBody};
use super::types::{LoginResponse, Meeting};

pub const STATUS_SUCCESS: &str = "success";
pub const STATUS_ERROR: &str = "error";

/// Generic `{ status, message?, data? }` shape used by most endpoints.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
  #[serde(default)]
  pub status: Option<String>,
  #[serde(default)]
  pub message: Option<String>,
  #[serde(default = "Option::default")]
  pub data: Option<T>,
}

/// `GET /jadwalruangan`: `{ data: Meeting[] }`. Rows stay raw until
/// `parse_schedule` checks them one by one.
#[derive(Debug, Deserialize)]
pub struct ScheduleEnvelope {
  #[serde(default)]
  pub data: Option<Vec<Value>>,
}

fn parse_error(response: &ApiResponse, message: String) -> ApiError {
  ApiError::Parse {
    message,
    method: response.method.to_string(),
    url: response.url.clone(),
  }
}

fn application_error(response: &ApiResponse, message: String) -> ApiError {
  ApiError::Application {
    message,
    body: response.data.clone().into_json(),
    method: response.method.to_string(),
    url: response.url.clone(),
  }
}

/// Parse a login reply. Anything but `"status": "success"` is a rejection.
pub fn parse_login(response: &ApiResponse, fallback: &str) -> Result<LoginResponse, ApiError> {
  let value = match &response.data {
    ResponseBody::Json(value) => value.clone(),
    _ => return Err(parse_error(response, "expected a JSON login response".to_string())),
  };
  let envelope: Envelope<LoginResponse> = serde_json::from_value(value)
    .map_err(|e| parse_error(response, format!("unexpected login response: {}", e)))?;

  if envelope.status.as_deref() != Some(STATUS_SUCCESS) {
    let message = envelope
      .message
      .filter(|m| !m.trim().is_empty())
      .unwrap_or_else(|| fallback.to_string());
    return Err(application_error(response, message));
  }

  Ok(envelope.data.unwrap_or_default())
}

/// Parse the schedule list. A missing or malformed payload is an empty list;
/// malformed rows are dropped and the rest kept.
pub fn parse_schedule(body: &ResponseBody) -> Vec<Meeting> {
  let Some(value) = body.as_json() else {
    warn!("schedule response was not JSON, treating as empty");
    return Vec::new();
  };
  let rows = match ScheduleEnvelope::deserialize(value) {
    Ok(envelope) => envelope.data.unwrap_or_default(),
    Err(e) => {
      warn!(error = %e, "malformed schedule payload, treating as empty");
      return Vec::new();
    }
  };
  rows
    .iter()
    .enumerate()
    .filter_map(|(index, row)| match Meeting::deserialize(row) {
      Ok(meeting) => Some(meeting),
      Err(e) => {
        warn!(index, error = %e, "skipping malformed schedule row");
        None
      }
    })
    .collect()
}

/// Reject 2xx payloads that report `"status": "error"`; pass the rest through.
pub fn check_application_status(response: &ApiResponse, fallback: &str) -> Result<Value, ApiError> {
  let value = response.data.clone().into_json();
  let is_error = value
    .get("status")
    .and_then(Value::as_str)
    .is_some_and(|s| s.eq_ignore_ascii_case(STATUS_ERROR));
  if is_error {
    let message = value
      .get("message")
      .and_then(Value::as_str)
      .filter(|m| !m.trim().is_empty())
      .map(String::from)
      .unwrap_or_else(|| fallback.to_string());
    return Err(application_error(response, message));
  }
  Ok(value)
}

/// Deserialize a typed payload, unwrapping a nested `data` field if present.
pub fn parse_data<T: DeserializeOwned>(response: &ApiResponse) -> Result<T, ApiError> {
  let value = response.data.clone().into_json();
  let inner = match value {
    Value::Object(mut map) if map.contains_key("data") => map.remove("data").unwrap_or(Value::Null),
    other => other,
  };
  serde_json::from_value(inner).map_err(|e| parse_error(response, e.to_string()))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::transport::Method;
  use serde_json::json;
  use std::collections::BTreeMap;

  fn response(data: ResponseBody) -> ApiResponse {
    ApiResponse {
      data,
      status: 200,
      status_text: "OK".to_string(),
      headers: BTreeMap::new(),
      method: Method::Post,
      url: "http://localhost/login".to_string(),
    }
  }

  #[test]
  fn test_login_success_extracts_token() {
    let r = response(ResponseBody::Json(json!({
      "status": "success",
      "data": {"token": "abc", "user": {"email": "a@b.co", "name": "Ayu"}}
    })));
    let login = parse_login(&r, "fallback").unwrap();
    assert_eq!(login.token.as_deref(), Some("abc"));
    assert_eq!(login.user.unwrap().name.as_deref(), Some("Ayu"));
  }

  #[test]
  fn test_login_failure_uses_server_message() {
    let r = response(ResponseBody::Json(json!({"status": "error", "message": "Akun terkunci"})));
    let err = parse_login(&r, "Email atau password salah").unwrap_err();
    assert!(matches!(err, ApiError::Application { .. }));
    assert_eq!(err.to_string(), "Akun terkunci");
  }

  #[test]
  fn test_login_failure_falls_back() {
    let r = response(ResponseBody::Json(json!({"status": "fail"})));
    let err = parse_login(&r, "Email atau password salah").unwrap_err();
    assert_eq!(err.to_string(), "Email atau password salah");
  }

  #[test]
  fn test_schedule_tolerates_bad_payloads() {
    assert!(parse_schedule(&ResponseBody::Empty).is_empty());
    assert!(parse_schedule(&ResponseBody::Json(json!({"message": "ok"}))).is_empty());
    assert!(parse_schedule(&ResponseBody::Json(json!({"data": "nope"}))).is_empty());
    assert!(parse_schedule(&ResponseBody::Text("<html>".to_string())).is_empty());

    let meetings = parse_schedule(&ResponseBody::Json(json!({
      "status": "success",
      "data": [{"waktu_mulai": "08:00", "waktu_selesai": "09:00", "nama_ruangan": "Squats Room"}]
    })));
    assert_eq!(meetings.len(), 1);
  }

  #[test]
  fn test_schedule_keeps_good_rows_around_bad_ones() {
    let meetings = parse_schedule(&ResponseBody::Json(json!({
      "status": "success",
      "data": [
        {"waktu_mulai": "08:00", "waktu_selesai": "09:00", "nama_ruangan": "Squats Room"},
        {"waktu_mulai": "10:00", "waktu_selesai": "11:00"},
        {"waktu_mulai": "12:00", "waktu_selesai": "13:00", "nama_ruangan": "Lungles Room", "tanggal": 20251007},
        {"waktu_mulai": "14:00", "waktu_selesai": "15:00", "nama_ruangan": "Lungles Room"}
      ]
    })));
    let starts: Vec<&str> = meetings.iter().map(|m| m.start_time.as_str()).collect();
    assert_eq!(starts, ["08:00", "14:00"]);
  }

  #[test]
  fn test_application_status_error() {
    let r = response(ResponseBody::Json(json!({"status": "error"})));
    let err = check_application_status(&r, "Terjadi kesalahan").unwrap_err();
    assert_eq!(err.to_string(), "Terjadi kesalahan");

    let r = response(ResponseBody::Json(json!({"status": "success", "id": 7})));
    assert_eq!(check_application_status(&r, "x").unwrap()["id"], 7);
  }

  #[test]
  fn test_parse_data_unwraps_nested_field() {
    let r = response(ResponseBody::Json(json!({
      "data": {"waktu_mulai": "10:00", "waktu_selesai": "11:00", "nama_ruangan": "Lungles Room"}
    })));
    let meeting: Meeting = parse_data(&r).unwrap();
    assert_eq!(meeting.room_name, "Lungles Room");

    let r = response(ResponseBody::Json(json!({"unexpected": true})));
    let err = parse_data::<Meeting>(&r).unwrap_err();
    assert!(matches!(err, ApiError::Parse { .. }));
  }
}
