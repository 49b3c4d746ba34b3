//! Booking API routed through the query cache.

use color_eyre::Result;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::cache::{ClientOptions, QueryClient};
use crate::config::Config;

use super::error::ApiError;
use super::keys::{self, mutations};
use super::logger::ApiLogger;
use super::services::Api;
use super::transport::Transport;
use super::types::{BookingPayload, LoginCredentials, LoginResponse, Meeting, MeetingUpdate, User};

/// How long each kind of data stays fresh.
#[derive(Debug, Clone, Copy)]
pub struct StaleTimes {
  pub meetings: Duration,
  pub rooms: Duration,
  pub availability: Duration,
  pub room_detail: Duration,
  /// Everything else.
  pub default: Duration,
}

impl StaleTimes {
  pub fn with_default(default: Duration) -> Self {
    Self {
      meetings: Duration::from_secs(2 * 60),
      rooms: Duration::from_secs(10 * 60),
      availability: Duration::from_secs(60),
      room_detail: Duration::from_secs(10 * 60),
      default,
    }
  }
}

impl Default for StaleTimes {
  fn default() -> Self {
    Self::with_default(Duration::from_secs(5 * 60))
  }
}

/// API client with transparent caching.
///
/// Reads go through `QueryClient::ensure`; writes are mutations that
/// invalidate the keys they affect. One instance owns one transport, one
/// cache and one log buffer; `dispose` ends its lifetime.
#[derive(Clone)]
pub struct CachedApi {
  api: Api,
  cache: QueryClient,
  stale: StaleTimes,
}

impl CachedApi {
  pub fn new(config: &Config) -> Result<Self> {
    let logger = ApiLogger::new(config.logger.enabled, config.logger.capacity);
    let transport = Transport::new(&config.api, logger)?;
    let options = ClientOptions::from(&config.query);
    let stale = StaleTimes::with_default(options.stale_after);
    Ok(Self::from_parts(
      Api::new(Arc::new(transport)),
      QueryClient::new(options),
      stale,
    ))
  }

  pub fn from_parts(api: Api, cache: QueryClient, stale: StaleTimes) -> Self {
    Self { api, cache, stale }
  }

  pub fn api(&self) -> &Api {
    &self.api
  }

  pub fn cache(&self) -> &QueryClient {
    &self.cache
  }

  pub fn logger(&self) -> &ApiLogger {
    self.api.transport().logger()
  }

  // Auth

  /// Log in; the returned user is cached under `["auth", "user"]`.
  pub async fn login(&self, credentials: &LoginCredentials) -> Result<LoginResponse, ApiError> {
    let auth = self.api.auth.clone();
    let login = self
      .cache
      .mutate(mutations::LOGIN, &[], || {
        let auth = auth.clone();
        async move { auth.login(credentials).await }
      })
      .await?;

    if let Some(user) = &login.user {
      self.cache.set_query_data(keys::user(), user.clone());
    }
    info!(email = %credentials.email, "logged in");
    Ok(login)
  }

  /// Drop the token and everything cached under it.
  pub fn logout(&self) {
    self.api.auth.logout();
    self.cache.clear();
    info!(mutation = mutations::LOGOUT, "logged out");
  }

  pub fn set_token(&self, token: &str) {
    self.api.auth.set_token(token);
  }

  pub fn current_user(&self) -> Option<User> {
    self.cache.get_query_data(&keys::user())
  }

  // Meetings

  pub async fn get_schedule(&self) -> Result<Vec<Meeting>, ApiError> {
    let meetings = self.api.meetings.clone();
    self
      .cache
      .ensure(keys::schedule(), self.stale.meetings, move || {
        let meetings = meetings.clone();
        async move { meetings.get_schedule().await }
      })
      .await
  }

  /// Pull-to-refresh: fetch the schedule even if the cached copy is fresh.
  pub async fn refresh_schedule(&self) -> Result<Vec<Meeting>, ApiError> {
    let meetings = self.api.meetings.clone();
    self
      .cache
      .refetch(keys::schedule(), self.stale.meetings, move || {
        let meetings = meetings.clone();
        async move { meetings.get_schedule().await }
      })
      .await
  }

  pub async fn get_meeting(&self, id: &str) -> Result<Meeting, ApiError> {
    let meetings = self.api.meetings.clone();
    let id = id.to_string();
    self
      .cache
      .ensure(keys::meeting_detail(&id), self.stale.default, move || {
        let meetings = meetings.clone();
        let id = id.clone();
        async move { meetings.get_meeting(&id).await }
      })
      .await
  }

  /// Submit a booking. On success the schedule and the booked room's
  /// availability for that day are invalidated.
  pub async fn create_booking(&self, booking: &BookingPayload) -> Result<Value, ApiError> {
    let meetings = self.api.meetings.clone();
    let invalidates = [
      keys::meetings(),
      keys::room_availability(&booking.room, &booking.date),
    ];
    let result = self
      .cache
      .mutate(mutations::CREATE_BOOKING, &invalidates, || {
        let meetings = meetings.clone();
        async move { meetings.create_booking(booking).await }
      })
      .await?;
    info!(room = %booking.room, date = %booking.date, "booking submitted");
    Ok(result)
  }

  pub async fn update_meeting(&self, id: &str, update: &MeetingUpdate) -> Result<Meeting, ApiError> {
    let meetings = self.api.meetings.clone();
    let meeting = self
      .cache
      .mutate(mutations::UPDATE_MEETING, &[keys::meetings()], || {
        let meetings = meetings.clone();
        async move { meetings.update_meeting(id, update).await }
      })
      .await?;
    self.cache.set_query_data(keys::meeting_detail(id), meeting.clone());
    Ok(meeting)
  }

  pub async fn delete_meeting(&self, id: &str) -> Result<(), ApiError> {
    let meetings = self.api.meetings.clone();
    self
      .cache
      .mutate(mutations::DELETE_MEETING, &[], || {
        let meetings = meetings.clone();
        async move { meetings.delete_meeting(id).await }
      })
      .await?;
    self.cache.remove_queries(&keys::meeting_detail(id));
    self.cache.invalidate(&keys::meetings());
    Ok(())
  }

  // Rooms

  pub async fn get_rooms(&self) -> Result<Value, ApiError> {
    let rooms = self.api.rooms.clone();
    self
      .cache
      .ensure(keys::room_list(), self.stale.rooms, move || {
        let rooms = rooms.clone();
        async move { rooms.get_rooms().await }
      })
      .await
  }

  pub async fn get_room(&self, id: &str) -> Result<Value, ApiError> {
    let rooms = self.api.rooms.clone();
    let id = id.to_string();
    self
      .cache
      .ensure(keys::room_detail(&id), self.stale.room_detail, move || {
        let rooms = rooms.clone();
        let id = id.clone();
        async move { rooms.get_room(&id).await }
      })
      .await
  }

  pub async fn get_room_availability(&self, room_id: &str, date: &str) -> Result<Value, ApiError> {
    let rooms = self.api.rooms.clone();
    let (room_id, date) = (room_id.to_string(), date.to_string());
    self
      .cache
      .ensure(
        keys::room_availability(&room_id, &date),
        self.stale.availability,
        move || {
          let rooms = rooms.clone();
          let (room_id, date) = (room_id.clone(), date.clone());
          async move { rooms.get_room_availability(&room_id, &date).await }
        },
      )
      .await
  }

  // Profile

  pub async fn get_profile(&self) -> Result<Value, ApiError> {
    let user = self.api.user.clone();
    self
      .cache
      .ensure(keys::profile(), self.stale.default, move || {
        let user = user.clone();
        async move { user.get_profile().await }
      })
      .await
  }

  pub async fn update_profile(&self, profile: Value) -> Result<Value, ApiError> {
    let user = self.api.user.clone();
    let updated = self
      .cache
      .mutate(mutations::UPDATE_PROFILE, &[], || {
        let user = user.clone();
        let profile = profile.clone();
        async move { user.update_profile(profile).await }
      })
      .await?;
    self.cache.set_query_data(keys::profile(), updated.clone());
    Ok(updated)
  }

  // Prefetch

  /// Warm the schedule cache; failures are only logged.
  pub async fn prefetch_meetings(&self) {
    if let Err(e) = self.get_schedule().await {
      debug!(error = %e, "schedule prefetch failed");
    }
  }

  pub async fn prefetch_rooms(&self) {
    if let Err(e) = self.get_rooms().await {
      debug!(error = %e, "rooms prefetch failed");
    }
  }

  /// Abort in-flight fetches and release the cache.
  pub fn dispose(&self) {
    self.logger().print_summary();
    self.cache.dispose();
  }
}
