//! Booking form: raw inputs in, validated `BookingPayload` out.

use chrono::{NaiveDate, NaiveTime};

use super::validation::{phone, positive_number, required, FormErrors, ValidationError};
use crate::api::BookingPayload;
use crate::schedule::rooms::{is_bookable_room, is_division};

/// Booking inputs as entered. `participant_count` stays text until
/// validation so bad input can be reported instead of silently zeroed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingForm {
  pub division: String,
  pub room: String,
  pub participant_count: String,
  pub date: NaiveDate,
  pub start_time: NaiveTime,
  pub end_time: NaiveTime,
  pub purpose: String,
  pub pic: String,
  pub phone: String,
}

impl BookingForm {
  /// Empty form for `today`, one hour starting at `now`.
  pub fn new(today: NaiveDate, now: NaiveTime) -> Self {
    let end = now
      .overflowing_add_signed(chrono::Duration::hours(1))
      .0;
    Self {
      division: String::new(),
      room: String::new(),
      participant_count: String::new(),
      date: today,
      start_time: now,
      end_time: end,
      purpose: String::new(),
      pic: String::new(),
      phone: String::new(),
    }
  }

  /// Check every field; `today` is the earliest bookable day.
  pub fn validate(&self, today: NaiveDate) -> Result<BookingPayload, FormErrors> {
    let mut errors = FormErrors::default();

    if errors.check("divisi", required(&self.division)).is_some() && !is_division(&self.division) {
      errors.insert("divisi", ValidationError::UnknownOption);
    }
    if errors.check("ruangan", required(&self.room)).is_some() && !is_bookable_room(&self.room) {
      errors.insert("ruangan", ValidationError::UnknownOption);
    }
    let count = errors
      .check("jumlah_peserta", positive_number(&self.participant_count))
      .and_then(|n| {
        if n.fract() == 0.0 && n <= f64::from(u32::MAX) {
          Some(n as u32)
        } else {
          errors.insert("jumlah_peserta", ValidationError::NotPositive);
          None
        }
      });
    if self.date < today {
      errors.insert("tanggal", ValidationError::DateInPast);
    }
    if self.start_time >= self.end_time {
      errors.insert("waktu_selesai", ValidationError::EndNotAfterStart);
    }
    if !self.phone.trim().is_empty() {
      errors.check("no_telp", phone(&self.phone));
    }
    errors.into_result()?;

    Ok(BookingPayload {
      date: self.date.format("%Y-%m-%d").to_string(),
      start_time: self.start_time.format("%H:%M").to_string(),
      end_time: self.end_time.format("%H:%M").to_string(),
      room: self.room.trim().to_string(),
      purpose: self.purpose.trim().to_string(),
      participant_count: count.unwrap_or_default(),
      division: self.division.trim().to_string(),
      pic: self.pic.trim().to_string(),
      phone: self.phone.trim().to_string(),
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
  }

  fn time(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
  }

  fn filled() -> BookingForm {
    BookingForm {
      division: "engineering".to_string(),
      room: "squats".to_string(),
      participant_count: "8".to_string(),
      date: date(2025, 10, 7),
      start_time: time(9, 0),
      end_time: time(10, 30),
      purpose: "Sprint planning".to_string(),
      pic: "Dewi".to_string(),
      phone: "0812-3456-789".to_string(),
    }
  }

  #[test]
  fn test_valid_form_builds_payload() {
    let payload = filled().validate(date(2025, 10, 7)).unwrap();
    assert_eq!(payload.date, "2025-10-07");
    assert_eq!(payload.start_time, "09:00");
    assert_eq!(payload.end_time, "10:30");
    assert_eq!(payload.participant_count, 8);
    assert_eq!(payload.room, "squats");
  }

  #[test]
  fn test_required_fields() {
    let form = BookingForm::new(date(2025, 10, 7), time(9, 0));
    let errors = form.validate(date(2025, 10, 7)).unwrap_err();
    assert_eq!(errors.get("divisi"), Some(&ValidationError::Required));
    assert_eq!(errors.get("ruangan"), Some(&ValidationError::Required));
    assert_eq!(errors.get("jumlah_peserta"), Some(&ValidationError::Required));
    assert_eq!(errors.get("tanggal"), None);
    assert_eq!(errors.get("waktu_selesai"), None);
  }

  #[test]
  fn test_past_date_rejected() {
    let errors = filled().validate(date(2025, 10, 8)).unwrap_err();
    assert_eq!(errors.get("tanggal"), Some(&ValidationError::DateInPast));
    assert_eq!(errors.len(), 1);
  }

  #[test]
  fn test_end_must_follow_start() {
    let mut form = filled();
    form.end_time = form.start_time;
    let errors = form.validate(date(2025, 10, 7)).unwrap_err();
    assert_eq!(
      errors.get("waktu_selesai").map(|e| e.to_string()).as_deref(),
      Some("Waktu selesai harus lebih besar dari waktu mulai")
    );
  }

  #[test]
  fn test_participants_must_be_whole_and_positive() {
    let mut form = filled();
    form.participant_count = "2.5".to_string();
    let errors = form.validate(date(2025, 10, 7)).unwrap_err();
    assert_eq!(errors.get("jumlah_peserta"), Some(&ValidationError::NotPositive));

    form.participant_count = "0".to_string();
    assert!(form.validate(date(2025, 10, 7)).is_err());
  }

  #[test]
  fn test_unknown_room_and_division() {
    let mut form = filled();
    form.room = "aula".to_string();
    form.division = "legal".to_string();
    let errors = form.validate(date(2025, 10, 7)).unwrap_err();
    assert_eq!(errors.get("ruangan"), Some(&ValidationError::UnknownOption));
    assert_eq!(errors.get("divisi"), Some(&ValidationError::UnknownOption));
  }

  #[test]
  fn test_phone_checked_only_when_given() {
    let mut form = filled();
    form.phone = String::new();
    assert!(form.validate(date(2025, 10, 7)).is_ok());
    form.phone = "call me".to_string();
    let errors = form.validate(date(2025, 10, 7)).unwrap_err();
    assert_eq!(errors.get("no_telp"), Some(&ValidationError::PhoneInvalid));
  }
}
