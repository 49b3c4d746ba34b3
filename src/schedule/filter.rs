//! Client-side schedule filtering.

use chrono::NaiveDate;

use super::rooms::{room_display_name, room_value_for_name, ALL_ROOMS};
use crate::api::Meeting;
use crate::format::format_date;

pub const NO_FILTER_SUMMARY: &str = "Semua jadwal";

/// Room and date selection for the schedule screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeetingFilter {
  /// Room value (`squats`, `lungles`) or `all`.
  pub room: String,
  pub date: Option<NaiveDate>,
}

impl Default for MeetingFilter {
  fn default() -> Self {
    Self {
      room: ALL_ROOMS.to_string(),
      date: None,
    }
  }
}

impl MeetingFilter {
  pub fn new(room: impl Into<String>, date: Option<NaiveDate>) -> Self {
    Self {
      room: room.into(),
      date,
    }
  }

  pub fn set_room(&mut self, room: impl Into<String>) {
    self.room = room.into();
  }

  pub fn set_date(&mut self, date: Option<NaiveDate>) {
    self.date = date;
  }

  pub fn reset(&mut self) {
    *self = Self::default();
  }

  pub fn reset_room(&mut self) {
    self.room = ALL_ROOMS.to_string();
  }

  pub fn reset_date(&mut self) {
    self.date = None;
  }

  fn filters_room(&self) -> bool {
    self.room != ALL_ROOMS
  }

  pub fn active_count(&self) -> usize {
    usize::from(self.filters_room()) + usize::from(self.date.is_some())
  }

  /// "Squats Room • 7 Oktober 2025", or "Semua jadwal" when nothing is set.
  pub fn summary(&self) -> String {
    let mut parts = Vec::new();
    if self.filters_room() {
      parts.push(room_display_name(&self.room).to_string());
    }
    if let Some(date) = self.date {
      parts.push(format_date(date));
    }
    if parts.is_empty() {
      NO_FILTER_SUMMARY.to_string()
    } else {
      parts.join(" • ")
    }
  }

  pub fn matches(&self, meeting: &Meeting, today: NaiveDate) -> bool {
    if self.filters_room() && room_value_for_name(&meeting.room_name) != self.room {
      return false;
    }
    match self.date {
      None => true,
      Some(target) => {
        let target = target.format("%Y-%m-%d").to_string();
        match meeting.day() {
          Some(day) => day == target,
          // Records without a date are treated as today's.
          None => target == today.format("%Y-%m-%d").to_string(),
        }
      }
    }
  }

  /// Meetings passing the filter, in their original order.
  pub fn apply(&self, meetings: &[Meeting], today: NaiveDate) -> Vec<Meeting> {
    meetings
      .iter()
      .filter(|m| self.matches(m, today))
      .cloned()
      .collect()
  }
}
