//! HTTP transport: one request in, one parsed response (or `ApiError`) out.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};
use url::Url;

use super::error::ApiError;
use super::logger::ApiLogger;
use crate::config::ApiConfig;

pub const JSON_CONTENT_TYPE: &str = "application/json";
const AUTHORIZATION: &str = "authorization";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
  Get,
  Post,
  Put,
  Patch,
  Delete,
}

impl Method {
  pub fn as_str(&self) -> &'static str {
    match self {
      Method::Get => "GET",
      Method::Post => "POST",
      Method::Put => "PUT",
      Method::Patch => "PATCH",
      Method::Delete => "DELETE",
    }
  }

  fn to_reqwest(self) -> reqwest::Method {
    match self {
      Method::Get => reqwest::Method::GET,
      Method::Post => reqwest::Method::POST,
      Method::Put => reqwest::Method::PUT,
      Method::Patch => reqwest::Method::PATCH,
      Method::Delete => reqwest::Method::DELETE,
    }
  }
}

impl std::fmt::Display for Method {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A request described as plain data before it is dispatched.
#[derive(Debug, Clone)]
pub struct Request {
  pub method: Method,
  /// Absolute URL, or a path relative to the configured base URL.
  pub endpoint: String,
  pub body: Option<Value>,
  pub headers: BTreeMap<String, String>,
  pub params: Vec<(String, String)>,
}

impl Request {
  pub fn new(method: Method, endpoint: impl Into<String>) -> Self {
    Self {
      method,
      endpoint: endpoint.into(),
      body: None,
      headers: BTreeMap::new(),
      params: Vec::new(),
    }
  }

  pub fn with_body(mut self, body: Value) -> Self {
    self.body = Some(body);
    self
  }

  pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
    self.headers.insert(name.to_ascii_lowercase(), value.into());
    self
  }

  pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.params.push((name.into(), value.into()));
    self
  }
}

/// Decoded response payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
  Json(Value),
  Text(String),
  Empty,
}

impl ResponseBody {
  pub fn as_json(&self) -> Option<&Value> {
    match self {
      ResponseBody::Json(v) => Some(v),
      _ => None,
    }
  }

  /// Collapse into a JSON value: text becomes a string, empty becomes null.
  pub fn into_json(self) -> Value {
    match self {
      ResponseBody::Json(v) => v,
      ResponseBody::Text(s) => Value::String(s),
      ResponseBody::Empty => Value::Null,
    }
  }

  fn for_log(&self) -> Option<Value> {
    match self {
      ResponseBody::Empty => None,
      other => Some(other.clone().into_json()),
    }
  }
}

/// A successful (2xx) response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
  pub data: ResponseBody,
  pub status: u16,
  pub status_text: String,
  pub headers: BTreeMap<String, String>,
  pub method: Method,
  pub url: String,
}

/// Issues HTTP requests with shared default headers and logs each exchange.
///
/// Default headers (content type, bearer token) are mutable at runtime so a
/// login can attach the token for every later call.
pub struct Transport {
  http: reqwest::Client,
  base_url: RwLock<String>,
  default_headers: RwLock<BTreeMap<String, String>>,
  logger: ApiLogger,
}

impl Transport {
  pub fn new(config: &ApiConfig, logger: ApiLogger) -> color_eyre::Result<Self> {
    let mut builder = reqwest::Client::builder();
    if let Some(secs) = config.timeout_secs {
      builder = builder.timeout(Duration::from_secs(secs));
    }
    let http = builder
      .build()
      .map_err(|e| color_eyre::eyre::eyre!("Failed to create HTTP client: {}", e))?;

    let mut default_headers = BTreeMap::new();
    default_headers.insert("content-type".to_string(), JSON_CONTENT_TYPE.to_string());

    Ok(Self {
      http,
      base_url: RwLock::new(config.base_url.trim_end_matches('/').to_string()),
      default_headers: RwLock::new(default_headers),
      logger,
    })
  }

  pub fn logger(&self) -> &ApiLogger {
    &self.logger
  }

  pub fn base_url(&self) -> String {
    self
      .base_url
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .clone()
  }

  pub fn set_base_url(&self, url: &str) {
    *self.base_url.write().unwrap_or_else(PoisonError::into_inner) =
      url.trim_end_matches('/').to_string();
  }

  pub fn set_default_header(&self, name: &str, value: impl Into<String>) {
    self
      .default_headers
      .write()
      .unwrap_or_else(PoisonError::into_inner)
      .insert(name.to_ascii_lowercase(), value.into());
  }

  pub fn set_auth_token(&self, token: &str) {
    self.set_default_header(AUTHORIZATION, format!("Bearer {}", token));
  }

  /// Blank the Authorization header; empty headers are not sent.
  pub fn clear_auth_token(&self) {
    self.set_default_header(AUTHORIZATION, "");
  }

  /// Current bearer token, if one is set.
  pub fn auth_token(&self) -> Option<String> {
    self
      .default_headers
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .get(AUTHORIZATION)
      .and_then(|v| v.strip_prefix("Bearer "))
      .filter(|t| !t.is_empty())
      .map(String::from)
  }

  /// Defaults overlaid with per-call headers; per-call values win.
  pub fn merged_headers(&self, overrides: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    let mut headers = self
      .default_headers
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .clone();
    for (name, value) in overrides {
      headers.insert(name.to_ascii_lowercase(), value.clone());
    }
    headers
  }

  /// Resolve an endpoint against the base URL and append query parameters.
  pub fn build_url(&self, endpoint: &str, params: &[(String, String)]) -> Result<String, String> {
    let raw = if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
      endpoint.to_string()
    } else {
      let base = self.base_url();
      if endpoint.starts_with('/') {
        format!("{}{}", base, endpoint)
      } else {
        format!("{}/{}", base, endpoint)
      }
    };

    let mut url = Url::parse(&raw).map_err(|e| format!("invalid URL '{}': {}", raw, e))?;
    if !params.is_empty() {
      url.query_pairs_mut().extend_pairs(params.iter());
    }
    Ok(url.to_string())
  }

  pub async fn get(&self, endpoint: &str) -> Result<ApiResponse, ApiError> {
    self.execute(Request::new(Method::Get, endpoint)).await
  }

  pub async fn post(&self, endpoint: &str, body: Value) -> Result<ApiResponse, ApiError> {
    self
      .execute(Request::new(Method::Post, endpoint).with_body(body))
      .await
  }

  pub async fn put(&self, endpoint: &str, body: Value) -> Result<ApiResponse, ApiError> {
    self
      .execute(Request::new(Method::Put, endpoint).with_body(body))
      .await
  }

  pub async fn patch(&self, endpoint: &str, body: Value) -> Result<ApiResponse, ApiError> {
    self
      .execute(Request::new(Method::Patch, endpoint).with_body(body))
      .await
  }

  pub async fn delete(&self, endpoint: &str) -> Result<ApiResponse, ApiError> {
    self.execute(Request::new(Method::Delete, endpoint)).await
  }

  /// Dispatch one request.
  ///
  /// Fails with `ApiError` when the network call fails or the status is
  /// outside [200, 300). Duration is logged whatever the outcome.
  pub async fn execute(&self, request: Request) -> Result<ApiResponse, ApiError> {
    let started = Instant::now();
    let method = request.method;
    let url = match self.build_url(&request.endpoint, &request.params) {
      Ok(url) => url,
      Err(message) => {
        let err = ApiError::Request {
          message,
          method: method.to_string(),
          url: request.endpoint.clone(),
        };
        self
          .logger
          .log_error(method.as_str(), &request.endpoint, &err, Some(started.elapsed()));
        return Err(err);
      }
    };
    let headers = self.merged_headers(&request.headers);

    self.logger.log_request(
      method.as_str(),
      &url,
      request.body.as_ref(),
      Some(&redact(&headers)),
    );

    let result = self.dispatch(method, &url, &headers, request.body.as_ref(), started).await;
    if let Err(err) = &result {
      self
        .logger
        .log_error(method.as_str(), &url, err, Some(started.elapsed()));
    }
    result
  }

  async fn dispatch(
    &self,
    method: Method,
    url: &str,
    headers: &BTreeMap<String, String>,
    body: Option<&Value>,
    started: Instant,
  ) -> Result<ApiResponse, ApiError> {
    let request_error = |message: String| ApiError::Request {
      message,
      method: method.to_string(),
      url: url.to_string(),
    };

    let mut header_map = HeaderMap::new();
    for (name, value) in headers.iter().filter(|(_, v)| !v.is_empty()) {
      let name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| request_error(format!("invalid header name '{}': {}", name, e)))?;
      let value = HeaderValue::from_str(value)
        .map_err(|e| request_error(format!("invalid header value for '{}': {}", name.as_str(), e)))?;
      header_map.insert(name, value);
    }

    let mut builder = self
      .http
      .request(method.to_reqwest(), url)
      .headers(header_map);

    if method != Method::Get {
      if let Some(body) = body {
        let content_type = headers
          .get("content-type")
          .map(String::as_str)
          .unwrap_or(JSON_CONTENT_TYPE);
        builder = builder.body(serialize_body(body, content_type).map_err(request_error)?);
      }
    }

    let response = builder.send().await.map_err(|e| ApiError::Network {
      message: network_message(&e),
      method: method.to_string(),
      url: url.to_string(),
    })?;

    let status = response.status();
    let status_text = status.canonical_reason().unwrap_or_default().to_string();
    let response_headers = extract_headers(response.headers());
    let content_type = response_headers
      .get("content-type")
      .cloned()
      .unwrap_or_default();

    let bytes = response.bytes().await.map_err(|e| ApiError::Network {
      message: network_message(&e),
      method: method.to_string(),
      url: url.to_string(),
    })?;
    let data = parse_body(&bytes, &content_type).map_err(|message| ApiError::Parse {
      message,
      method: method.to_string(),
      url: url.to_string(),
    })?;

    self.logger.log_response(
      method.as_str(),
      url,
      status.as_u16(),
      data.for_log().as_ref(),
      started.elapsed(),
      Some(&response_headers),
    );

    if !status.is_success() {
      return Err(ApiError::Http {
        status: status.as_u16(),
        status_text,
        body: data,
        method: method.to_string(),
        url: url.to_string(),
      });
    }

    Ok(ApiResponse {
      data,
      status: status.as_u16(),
      status_text,
      headers: response_headers,
      method,
      url: url.to_string(),
    })
  }
}

impl std::fmt::Debug for Transport {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Transport")
      .field("base_url", &self.base_url())
      .finish_non_exhaustive()
  }
}

fn serialize_body(body: &Value, content_type: &str) -> Result<Vec<u8>, String> {
  if content_type.contains(JSON_CONTENT_TYPE) {
    return serde_json::to_vec(body).map_err(|e| format!("failed to serialize body: {}", e));
  }
  match body {
    Value::String(s) => Ok(s.clone().into_bytes()),
    other => Ok(other.to_string().into_bytes()),
  }
}

fn parse_body(bytes: &[u8], content_type: &str) -> Result<ResponseBody, String> {
  if bytes.is_empty() {
    return Ok(ResponseBody::Empty);
  }
  if content_type.contains(JSON_CONTENT_TYPE) {
    return serde_json::from_slice(bytes)
      .map(ResponseBody::Json)
      .map_err(|e| format!("invalid JSON: {}", e));
  }
  Ok(ResponseBody::Text(String::from_utf8_lossy(bytes).into_owned()))
}

fn extract_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
  headers
    .iter()
    .filter_map(|(name, value)| {
      value
        .to_str()
        .ok()
        .map(|v| (name.as_str().to_string(), v.to_string()))
    })
    .collect()
}

fn redact(headers: &BTreeMap<String, String>) -> BTreeMap<String, String> {
  let mut headers = headers.clone();
  if let Some(value) = headers.get_mut(AUTHORIZATION) {
    if !value.is_empty() {
      *value = "Bearer ***".to_string();
    }
  }
  headers
}

fn network_message(err: &reqwest::Error) -> String {
  if err.is_timeout() {
    format!("Request timed out: {}", err)
  } else if err.is_connect() {
    format!("Connection failed: {}", err)
  } else {
    err.to_string()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::logger::LogKind;
  use serde_json::json;
  use wiremock::matchers::{body_json, header, method, path, query_param};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  fn transport(base_url: &str) -> Transport {
    let config = ApiConfig {
      base_url: base_url.to_string(),
      timeout_secs: None,
    };
    Transport::new(&config, ApiLogger::new(false, 50)).unwrap()
  }

  #[test]
  fn test_build_url_joins_base_and_params() {
    let t = transport("http://localhost:3000/api/");
    assert_eq!(
      t.build_url("/rooms", &[]).unwrap(),
      "http://localhost:3000/api/rooms"
    );
    assert_eq!(
      t.build_url("rooms", &[]).unwrap(),
      "http://localhost:3000/api/rooms"
    );
    assert_eq!(
      t.build_url("/rooms/1/availability", &[("date".into(), "2025-10-07".into())])
        .unwrap(),
      "http://localhost:3000/api/rooms/1/availability?date=2025-10-07"
    );
    assert_eq!(
      t.build_url("https://other.example/x", &[]).unwrap(),
      "https://other.example/x"
    );
  }

  #[test]
  fn test_per_call_headers_win() {
    let t = transport("http://localhost");
    t.set_auth_token("abc");
    let mut overrides = BTreeMap::new();
    overrides.insert("Content-Type".to_string(), "text/plain".to_string());
    let merged = t.merged_headers(&overrides);
    assert_eq!(merged.get("content-type").unwrap(), "text/plain");
    assert_eq!(merged.get("authorization").unwrap(), "Bearer abc");
  }

  #[test]
  fn test_auth_token_set_and_clear() {
    let t = transport("http://localhost");
    assert_eq!(t.auth_token(), None);
    t.set_auth_token("tok");
    assert_eq!(t.auth_token().as_deref(), Some("tok"));
    t.clear_auth_token();
    assert_eq!(t.auth_token(), None);
  }

  #[tokio::test]
  async fn test_json_round_trip_with_auth() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/booking"))
      .and(header("authorization", "Bearer secret"))
      .and(body_json(json!({"ruangan": "squats"})))
      .respond_with(ResponseTemplate::new(201).set_body_json(json!({"status": "success"})))
      .expect(1)
      .mount(&server)
      .await;

    let t = transport(&server.uri());
    t.set_auth_token("secret");
    let response = t.post("/booking", json!({"ruangan": "squats"})).await.unwrap();
    assert_eq!(response.status, 201);
    assert_eq!(response.data, ResponseBody::Json(json!({"status": "success"})));
    assert_eq!(response.method, Method::Post);
  }

  #[tokio::test]
  async fn test_plain_text_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/ping"))
      .respond_with(ResponseTemplate::new(200).set_body_string("pong"))
      .mount(&server)
      .await;

    let response = transport(&server.uri()).get("/ping").await.unwrap();
    assert_eq!(response.data, ResponseBody::Text("pong".to_string()));
  }

  #[tokio::test]
  async fn test_query_params_are_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/rooms/squats/availability"))
      .and(query_param("date", "2025-10-07"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({"available": true})))
      .expect(1)
      .mount(&server)
      .await;

    let request = Request::new(Method::Get, "/rooms/squats/availability").with_param("date", "2025-10-07");
    let response = transport(&server.uri()).execute(request).await.unwrap();
    assert_eq!(response.data.as_json().unwrap()["available"], json!(true));
  }

  #[tokio::test]
  async fn test_non_2xx_is_http_error_and_logged() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/missing"))
      .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "Not here"})))
      .mount(&server)
      .await;

    let t = transport(&server.uri());
    let err = t.get("/missing").await.unwrap_err();
    assert_eq!(err.status(), Some(404));
    assert_eq!(err.server_message().as_deref(), Some("Not here"));
    assert!(!err.is_retryable());

    let kinds: Vec<LogKind> = t.logger().logs().iter().map(|l| l.kind).collect();
    assert_eq!(kinds, vec![LogKind::Request, LogKind::Response, LogKind::Error]);
    let response_log = &t.logger().logs()[1];
    assert_eq!(response_log.status, Some(404));
    assert!(response_log.duration.is_some());
  }

  #[tokio::test]
  async fn test_network_failure_has_no_status() {
    // Nothing listens on this port.
    let t = transport("http://127.0.0.1:9");
    let err = t.get("/schedule").await.unwrap_err();
    assert!(matches!(err, ApiError::Network { .. }));
    assert_eq!(err.status(), None);
    assert!(err.is_retryable());
  }

  #[tokio::test]
  async fn test_malformed_json_is_parse_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/broken"))
      .respond_with(
        ResponseTemplate::new(200).set_body_raw("{not json", "application/json"),
      )
      .mount(&server)
      .await;

    let err = transport(&server.uri()).get("/broken").await.unwrap_err();
    assert!(matches!(err, ApiError::Parse { .. }));
  }

  #[tokio::test]
  async fn test_logged_authorization_is_redacted() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .respond_with(ResponseTemplate::new(204))
      .mount(&server)
      .await;

    let t = transport(&server.uri());
    t.set_auth_token("very-secret");
    let response = t.get("/x").await.unwrap();
    assert_eq!(response.data, ResponseBody::Empty);

    let request_log = &t.logger().logs()[0];
    let headers = request_log.headers.as_ref().unwrap();
    assert_eq!(headers.get("authorization").unwrap(), "Bearer ***");
  }
}
