//! Per-resource wrappers over the transport.
//!
//! Each call maps typed arguments to exactly one request and unwraps the
//! response shape. Transport errors pass through untouched.

use serde_json::Value;
use std::sync::Arc;

use super::envelopes::{check_application_status, parse_data, parse_login, parse_schedule};
use super::error::ApiError;
use super::transport::{Method, Request, Transport};
use super::types::{BookingPayload, LoginCredentials, LoginResponse, Meeting, MeetingUpdate};

pub const LOGIN_FAILED_MESSAGE: &str = "Email atau password salah";
pub const BOOKING_FAILED_MESSAGE: &str = "Terjadi kesalahan saat memproses booking";

#[derive(Clone)]
pub struct AuthService {
  transport: Arc<Transport>,
}

impl AuthService {
  /// Log in and, on success, attach the returned token to later requests.
  pub async fn login(&self, credentials: &LoginCredentials) -> Result<LoginResponse, ApiError> {
    let body = serde_json::json!({
      "email": credentials.email,
      "password": credentials.password,
    });
    let response = self.transport.post("/login", body).await?;
    let login = parse_login(&response, LOGIN_FAILED_MESSAGE)?;

    if let Some(token) = login.token.as_deref().filter(|t| !t.is_empty()) {
      self.transport.set_auth_token(token);
    }
    Ok(login)
  }

  pub fn logout(&self) {
    self.transport.clear_auth_token();
  }

  pub fn set_token(&self, token: &str) {
    self.transport.set_auth_token(token);
  }
}

#[derive(Clone)]
pub struct MeetingService {
  transport: Arc<Transport>,
}

impl MeetingService {
  /// Today's schedule. Malformed payloads come back as an empty list.
  pub async fn get_schedule(&self) -> Result<Vec<Meeting>, ApiError> {
    let response = self.transport.get("/jadwalruangan").await?;
    Ok(parse_schedule(&response.data))
  }

  pub async fn create_booking(&self, booking: &BookingPayload) -> Result<Value, ApiError> {
    let body = serde_json::to_value(booking).map_err(|e| ApiError::Request {
      message: e.to_string(),
      method: Method::Post.to_string(),
      url: "/booking".to_string(),
    })?;
    let response = self.transport.post("/booking", body).await?;
    check_application_status(&response, BOOKING_FAILED_MESSAGE)
  }

  pub async fn get_meeting(&self, id: &str) -> Result<Meeting, ApiError> {
    let response = self.transport.get(&format!("/meetings/{}", id)).await?;
    parse_data(&response)
  }

  pub async fn update_meeting(&self, id: &str, update: &MeetingUpdate) -> Result<Meeting, ApiError> {
    let endpoint = format!("/meetings/{}", id);
    let body = serde_json::to_value(update).map_err(|e| ApiError::Request {
      message: e.to_string(),
      method: Method::Put.to_string(),
      url: endpoint.clone(),
    })?;
    let response = self.transport.put(&endpoint, body).await?;
    parse_data(&response)
  }

  pub async fn delete_meeting(&self, id: &str) -> Result<(), ApiError> {
    self.transport.delete(&format!("/meetings/{}", id)).await?;
    Ok(())
  }
}

/// Room endpoints return raw JSON, passed through unmodified.
#[derive(Clone)]
pub struct RoomService {
  transport: Arc<Transport>,
}

impl RoomService {
  pub async fn get_rooms(&self) -> Result<Value, ApiError> {
    Ok(self.transport.get("/rooms").await?.data.into_json())
  }

  pub async fn get_room(&self, id: &str) -> Result<Value, ApiError> {
    Ok(self.transport.get(&format!("/rooms/{}", id)).await?.data.into_json())
  }

  pub async fn get_room_availability(&self, room_id: &str, date: &str) -> Result<Value, ApiError> {
    let request = Request::new(Method::Get, format!("/rooms/{}/availability", room_id)).with_param("date", date);
    Ok(self.transport.execute(request).await?.data.into_json())
  }
}

#[derive(Clone)]
pub struct UserService {
  transport: Arc<Transport>,
}

impl UserService {
  pub async fn get_profile(&self) -> Result<Value, ApiError> {
    Ok(self.transport.get("/profile").await?.data.into_json())
  }

  pub async fn update_profile(&self, profile: Value) -> Result<Value, ApiError> {
    Ok(self.transport.put("/profile", profile).await?.data.into_json())
  }
}

/// All services over one shared transport.
#[derive(Clone)]
pub struct Api {
  pub auth: AuthService,
  pub meetings: MeetingService,
  pub rooms: RoomService,
  pub user: UserService,
  transport: Arc<Transport>,
}

impl Api {
  pub fn new(transport: Arc<Transport>) -> Self {
    Self {
      auth: AuthService {
        transport: Arc::clone(&transport),
      },
      meetings: MeetingService {
        transport: Arc::clone(&transport),
      },
      rooms: RoomService {
        transport: Arc::clone(&transport),
      },
      user: UserService {
        transport: Arc::clone(&transport),
      },
      transport,
    }
  }

  pub fn transport(&self) -> &Arc<Transport> {
    &self.transport
  }
}
