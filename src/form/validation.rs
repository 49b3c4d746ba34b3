//! Field validators.
//!
//! Messages are the ones shown next to form fields, in Indonesian.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

static EMAIL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\S+@\S+\.\S+").expect("Invalid email regex"));
static PHONE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9+\-\s()]+$").expect("Invalid phone regex"));

pub const MIN_PASSWORD_LEN: usize = 6;

/// A client-side check that failed before any request was made.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
  #[error("Field ini wajib diisi")]
  Required,
  #[error("Email wajib diisi")]
  EmailRequired,
  #[error("Format email tidak valid")]
  EmailInvalid,
  #[error("Password wajib diisi")]
  PasswordRequired,
  #[error("Password minimal 6 karakter")]
  PasswordTooShort,
  #[error("Nomor telepon wajib diisi")]
  PhoneRequired,
  #[error("Format nomor telepon tidak valid")]
  PhoneInvalid,
  #[error("Minimal {0} karakter")]
  TooShort(usize),
  #[error("Harus berupa angka positif")]
  NotPositive,
  #[error("Pilihan tidak valid")]
  UnknownOption,
  #[error("Tanggal tidak boleh di masa lalu")]
  DateInPast,
  #[error("Waktu selesai harus lebih besar dari waktu mulai")]
  EndNotAfterStart,
}

fn is_blank(value: &str) -> bool {
  value.trim().is_empty()
}

pub fn required(value: &str) -> Result<(), ValidationError> {
  if is_blank(value) {
    return Err(ValidationError::Required);
  }
  Ok(())
}

pub fn email(value: &str) -> Result<(), ValidationError> {
  if is_blank(value) {
    return Err(ValidationError::EmailRequired);
  }
  if !EMAIL.is_match(value) {
    return Err(ValidationError::EmailInvalid);
  }
  Ok(())
}

pub fn password(value: &str) -> Result<(), ValidationError> {
  if is_blank(value) {
    return Err(ValidationError::PasswordRequired);
  }
  if value.chars().count() < MIN_PASSWORD_LEN {
    return Err(ValidationError::PasswordTooShort);
  }
  Ok(())
}

pub fn phone(value: &str) -> Result<(), ValidationError> {
  if is_blank(value) {
    return Err(ValidationError::PhoneRequired);
  }
  if !PHONE.is_match(value) {
    return Err(ValidationError::PhoneInvalid);
  }
  Ok(())
}

pub fn min_length(value: &str, min: usize) -> Result<(), ValidationError> {
  if is_blank(value) {
    return Err(ValidationError::Required);
  }
  if value.chars().count() < min {
    return Err(ValidationError::TooShort(min));
  }
  Ok(())
}

/// Parse a strictly positive number.
pub fn positive_number(value: &str) -> Result<f64, ValidationError> {
  if is_blank(value) {
    return Err(ValidationError::Required);
  }
  match value.trim().parse::<f64>() {
    Ok(n) if n.is_finite() && n > 0.0 => Ok(n),
    _ => Err(ValidationError::NotPositive),
  }
}

/// Per-field validation failures, keyed by wire field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, thiserror::Error)]
#[error("{} field(s) failed validation", .errors.len())]
pub struct FormErrors {
  errors: BTreeMap<&'static str, ValidationError>,
}

impl FormErrors {
  /// Record `result` for `field`; the first error per field is kept.
  pub fn check<T>(&mut self, field: &'static str, result: Result<T, ValidationError>) -> Option<T> {
    match result {
      Ok(value) => Some(value),
      Err(err) => {
        self.errors.entry(field).or_insert(err);
        None
      }
    }
  }

  pub fn insert(&mut self, field: &'static str, err: ValidationError) {
    self.errors.insert(field, err);
  }

  pub fn get(&self, field: &str) -> Option<&ValidationError> {
    self.errors.get(field)
  }

  /// Clear the error for one field, as when the user edits it.
  pub fn clear_field(&mut self, field: &str) {
    self.errors.remove(field);
  }

  pub fn is_empty(&self) -> bool {
    self.errors.is_empty()
  }

  pub fn len(&self) -> usize {
    self.errors.len()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&'static str, &ValidationError)> + '_ {
    self.errors.iter().map(|(field, err)| (*field, err))
  }

  pub fn into_result(self) -> Result<(), FormErrors> {
    if self.is_empty() {
      Ok(())
    } else {
      Err(self)
    }
  }
}
