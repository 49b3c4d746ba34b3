//! Query keys for the booking API.
//!
//! Broader keys are prefixes of narrower ones, so `meetings()` invalidates
//! every meeting list and detail at once.

use crate::cache::QueryKey;

pub fn auth() -> QueryKey {
  QueryKey::from_segments(["auth"])
}

pub fn user() -> QueryKey {
  auth().with("user")
}

pub fn meetings() -> QueryKey {
  QueryKey::from_segments(["meetings"])
}

/// Today's schedule, unfiltered. Filtering happens client-side.
pub fn schedule() -> QueryKey {
  meetings().with("list")
}

pub fn meeting_detail(id: &str) -> QueryKey {
  meetings().with("detail").with(id)
}

pub fn rooms() -> QueryKey {
  QueryKey::from_segments(["rooms"])
}

pub fn room_list() -> QueryKey {
  rooms().with("list")
}

pub fn room_availability(room_id: &str, date: &str) -> QueryKey {
  rooms().with("availability").with(room_id).with(date)
}

pub fn room_detail(id: &str) -> QueryKey {
  rooms().with("detail").with(id)
}

pub fn profile() -> QueryKey {
  QueryKey::from_segments(["profile"])
}

/// Labels for mutations, used in logs.
pub mod mutations {
  pub const LOGIN: &str = "login";
  pub const LOGOUT: &str = "logout";
  pub const CREATE_BOOKING: &str = "createBooking";
  pub const UPDATE_MEETING: &str = "updateMeeting";
  pub const DELETE_MEETING: &str = "deleteMeeting";
  pub const UPDATE_PROFILE: &str = "updateProfile";
}
