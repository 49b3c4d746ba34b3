//! Screen controllers.
//!
//! Each screen of the booking app is an async method on `App` that drives the
//! cached API and turns the outcome into something a front end can show: an
//! `Alert`, a `ScheduleView`, or per-field `FormErrors`.

use chrono::NaiveDate;
use serde_json::Value;
use tracing::{info, warn};

use crate::api::services::{BOOKING_FAILED_MESSAGE, LOGIN_FAILED_MESSAGE};
use crate::api::{ApiError, CachedApi, Meeting, User};
use crate::form::{BookingForm, FormErrors, LoginForm};
use crate::schedule::MeetingFilter;

pub const NETWORK_ERROR_MESSAGE: &str = "Terjadi kesalahan jaringan";
pub const SCHEDULE_ERROR_MESSAGE: &str = "Gagal memuat jadwal";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
  Success,
  Error,
  Warning,
}

/// A modal message: title, body and severity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
  pub title: String,
  pub message: String,
  pub kind: AlertKind,
}

impl Alert {
  pub fn new(kind: AlertKind, title: impl Into<String>, message: impl Into<String>) -> Self {
    Self {
      title: title.into(),
      message: message.into(),
      kind,
    }
  }

  pub fn success(title: impl Into<String>, message: impl Into<String>) -> Self {
    Self::new(AlertKind::Success, title, message)
  }

  pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
    Self::new(AlertKind::Error, title, message)
  }

  pub fn warning(title: impl Into<String>, message: impl Into<String>) -> Self {
    Self::new(AlertKind::Warning, title, message)
  }

  pub fn is_success(&self) -> bool {
    self.kind == AlertKind::Success
  }
}

/// What the schedule screen renders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleView {
  /// Meetings passing the filter.
  pub meetings: Vec<Meeting>,
  /// Meetings before filtering.
  pub total: usize,
  pub summary: String,
  pub active_filters: usize,
  /// Set when the fetch failed; `meetings` is then empty.
  pub error: Option<String>,
}

impl ScheduleView {
  fn build(all: &[Meeting], filter: &MeetingFilter, today: NaiveDate) -> Self {
    Self {
      meetings: filter.apply(all, today),
      total: all.len(),
      summary: filter.summary(),
      active_filters: filter.active_count(),
      error: None,
    }
  }

  fn failed(filter: &MeetingFilter, err: &ApiError) -> Self {
    Self {
      meetings: Vec::new(),
      total: 0,
      summary: filter.summary(),
      active_filters: filter.active_count(),
      error: Some(err.display_message(SCHEDULE_ERROR_MESSAGE)),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.meetings.is_empty()
  }
}

/// Network trouble gets the generic alert; anything the server said is shown
/// under the screen's own title.
fn failure_alert(err: &ApiError, title: &str, fallback: &str) -> Alert {
  match err {
    ApiError::Network { .. } | ApiError::Cancelled { .. } => Alert::error("Error", NETWORK_ERROR_MESSAGE),
    _ => Alert::error(title, err.display_message(fallback)),
  }
}

pub struct App {
  api: CachedApi,
}

impl App {
  pub fn new(api: CachedApi) -> Self {
    Self { api }
  }

  pub fn api(&self) -> &CachedApi {
    &self.api
  }

  pub fn current_user(&self) -> Option<User> {
    self.api.current_user()
  }

  /// Validate and submit the login form.
  ///
  /// `Err` means the form never left the client; any server outcome is an
  /// `Alert`.
  pub async fn login(&self, form: &LoginForm) -> Result<Alert, FormErrors> {
    let credentials = form.validate()?;
    let alert = match self.api.login(&credentials).await {
      Ok(_) => {
        // Warm the home screen while the success alert is up.
        self.api.prefetch_meetings().await;
        Alert::success(
          "Login Berhasil",
          "Selamat datang! Anda akan diarahkan ke halaman utama.",
        )
      }
      Err(e) => {
        warn!(error = %e, "login failed");
        failure_alert(&e, "Login Gagal", LOGIN_FAILED_MESSAGE)
      }
    };
    Ok(alert)
  }

  pub fn logout(&self) -> Alert {
    self.api.logout();
    Alert::success("Logout Berhasil", "Anda telah keluar dari sistem")
  }

  /// Load the schedule and apply `filter`. A failed fetch still produces a
  /// view: empty, with the error message set.
  pub async fn load_schedule(&self, filter: &MeetingFilter, today: NaiveDate) -> ScheduleView {
    match self.api.get_schedule().await {
      Ok(all) => ScheduleView::build(&all, filter, today),
      Err(e) => {
        warn!(error = %e, "schedule load failed");
        ScheduleView::failed(filter, &e)
      }
    }
  }

  /// Like `load_schedule`, but always goes to the network.
  pub async fn refresh_schedule(&self, filter: &MeetingFilter, today: NaiveDate) -> ScheduleView {
    match self.api.refresh_schedule().await {
      Ok(all) => ScheduleView::build(&all, filter, today),
      Err(e) => {
        warn!(error = %e, "schedule refresh failed");
        ScheduleView::failed(filter, &e)
      }
    }
  }

  /// Validate and submit a booking request.
  pub async fn submit_booking(&self, form: &BookingForm, today: NaiveDate) -> Result<Alert, FormErrors> {
    let payload = form.validate(today)?;
    let alert = match self.api.create_booking(&payload).await {
      Ok(_) => {
        info!(room = %payload.room, date = %payload.date, "booking accepted");
        Alert::success(
          "Booking Berhasil",
          "Permintaan booking ruangan telah berhasil dikirim. Tim kami akan menghubungi Anda untuk konfirmasi.",
        )
      }
      Err(e) => {
        warn!(error = %e, "booking failed");
        failure_alert(&e, "Booking Gagal", BOOKING_FAILED_MESSAGE)
      }
    };
    Ok(alert)
  }

  pub async fn rooms(&self) -> Result<Value, ApiError> {
    self.api.get_rooms().await
  }

  pub async fn room_availability(&self, room: &str, date: NaiveDate) -> Result<Value, ApiError> {
    self
      .api
      .get_room_availability(room, &date.format("%Y-%m-%d").to_string())
      .await
  }

  /// End the session's lifetime: print the request log summary and release
  /// the cache.
  pub fn shutdown(&self) {
    self.api.dispose();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::{ApiConfig, Config, QuerySettings};
  use crate::form::ValidationError;
  use chrono::NaiveTime;
  use serde_json::json;
  use wiremock::matchers::{method, path};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  fn app_for(base_url: String) -> App {
    let config = Config {
      api: ApiConfig {
        base_url,
        timeout_secs: Some(5),
      },
      query: QuerySettings {
        retry_base_ms: 1,
        retry_max_ms: 5,
        mutation_retry_delay_ms: 1,
        ..QuerySettings::default()
      },
      ..Config::default()
    };
    App::new(CachedApi::new(&config).unwrap())
  }

  fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 10, 7).unwrap()
  }

  fn booking_form() -> BookingForm {
    BookingForm {
      division: "engineering".to_string(),
      room: "squats".to_string(),
      participant_count: "5".to_string(),
      date: today(),
      start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
      end_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
      purpose: "Retro".to_string(),
      pic: "Dewi".to_string(),
      phone: String::new(),
    }
  }

  async fn mount_schedule(server: &MockServer) {
    Mock::given(method("GET"))
      .and(path("/jadwalruangan"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [
        {"waktu_mulai": "08:00", "waktu_selesai": "09:00", "nama_ruangan": "Squats Room"},
        {"waktu_mulai": "10:00", "waktu_selesai": "11:00", "nama_ruangan": "Lungles Room"}
      ]})))
      .mount(server)
      .await;
  }

  #[tokio::test]
  async fn test_login_success_alert() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/login"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "status": "success",
        "data": {"token": "tok", "user": {"email": "ayu@example.com"}}
      })))
      .mount(&server)
      .await;
    mount_schedule(&server).await;

    let app = app_for(server.uri());
    let alert = app
      .login(&LoginForm::new("ayu@example.com", "rahasia"))
      .await
      .unwrap();
    assert!(alert.is_success());
    assert_eq!(alert.title, "Login Berhasil");
    assert_eq!(app.current_user().map(|u| u.email).as_deref(), Some("ayu@example.com"));
  }

  #[tokio::test]
  async fn test_login_rejected_shows_server_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/login"))
      .respond_with(
        ResponseTemplate::new(200).set_body_json(json!({"status": "error", "message": "Akun dikunci"})),
      )
      .mount(&server)
      .await;

    let app = app_for(server.uri());
    let alert = app
      .login(&LoginForm::new("ayu@example.com", "rahasia"))
      .await
      .unwrap();
    assert_eq!(alert, Alert::error("Login Gagal", "Akun dikunci"));
  }

  #[tokio::test]
  async fn test_login_network_failure() {
    let app = app_for("http://127.0.0.1:1".to_string());
    let alert = app
      .login(&LoginForm::new("ayu@example.com", "rahasia"))
      .await
      .unwrap();
    assert_eq!(alert, Alert::error("Error", NETWORK_ERROR_MESSAGE));
  }

  #[tokio::test]
  async fn test_invalid_login_never_reaches_server() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/login"))
      .respond_with(ResponseTemplate::new(200))
      .expect(0)
      .mount(&server)
      .await;

    let app = app_for(server.uri());
    let errors = app.login(&LoginForm::new("", "")).await.unwrap_err();
    assert_eq!(errors.get("email"), Some(&ValidationError::EmailRequired));
    assert_eq!(errors.get("password"), Some(&ValidationError::PasswordRequired));
  }

  #[tokio::test]
  async fn test_schedule_view_applies_filter() {
    let server = MockServer::start().await;
    mount_schedule(&server).await;

    let app = app_for(server.uri());
    let filter = MeetingFilter::new("squats", None);
    let view = app.load_schedule(&filter, today()).await;
    assert_eq!(view.total, 2);
    assert_eq!(view.meetings.len(), 1);
    assert_eq!(view.meetings[0].room_name, "Squats Room");
    assert_eq!(view.summary, "Squats Room");
    assert_eq!(view.active_filters, 1);
    assert_eq!(view.error, None);
  }

  #[tokio::test]
  async fn test_schedule_failure_is_empty_with_message() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/jadwalruangan"))
      .respond_with(ResponseTemplate::new(500).set_body_json(json!({"message": "Server sibuk"})))
      .mount(&server)
      .await;

    let app = app_for(server.uri());
    let view = app.load_schedule(&MeetingFilter::default(), today()).await;
    assert!(view.is_empty());
    assert_eq!(view.error.as_deref(), Some("Server sibuk"));
    assert_eq!(view.summary, "Semua jadwal");
  }

  #[tokio::test]
  async fn test_booking_success_and_failure_alerts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/booking"))
      .respond_with(ResponseTemplate::new(201).set_body_json(json!({"status": "success"})))
      .up_to_n_times(1)
      .mount(&server)
      .await;
    Mock::given(method("POST"))
      .and(path("/booking"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "error"})))
      .mount(&server)
      .await;

    let app = app_for(server.uri());
    let ok = app.submit_booking(&booking_form(), today()).await.unwrap();
    assert_eq!(ok.title, "Booking Berhasil");
    assert!(ok.is_success());

    let rejected = app.submit_booking(&booking_form(), today()).await.unwrap();
    assert_eq!(rejected, Alert::error("Booking Gagal", BOOKING_FAILED_MESSAGE));
  }

  #[tokio::test]
  async fn test_booking_validation_errors() {
    let app = app_for("http://127.0.0.1:1".to_string());
    let mut form = booking_form();
    form.date = NaiveDate::from_ymd_opt(2025, 10, 6).unwrap();
    let errors = app.submit_booking(&form, today()).await.unwrap_err();
    assert_eq!(errors.get("tanggal"), Some(&ValidationError::DateInPast));
  }

  #[tokio::test]
  async fn test_logout_alert_clears_user() {
    let app = app_for("http://127.0.0.1:1".to_string());
    app.api().set_token("tok");
    let alert = app.logout();
    assert_eq!(alert, Alert::success("Logout Berhasil", "Anda telah keluar dari sistem"));
    assert!(app.current_user().is_none());
    assert_eq!(app.api().api().transport().auth_token(), None);
  }
}
