//! Date-filter presets.

use chrono::{Datelike, Duration, NaiveDate};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatePreset {
  Today,
  Tomorrow,
  /// Sunday starting the current week.
  ThisWeek,
  /// The coming Sunday.
  NextWeek,
}

impl DatePreset {
  pub const ALL: [DatePreset; 4] = [
    DatePreset::Today,
    DatePreset::Tomorrow,
    DatePreset::ThisWeek,
    DatePreset::NextWeek,
  ];

  pub fn label(self) -> &'static str {
    match self {
      DatePreset::Today => "Hari Ini",
      DatePreset::Tomorrow => "Besok",
      DatePreset::ThisWeek => "Minggu Ini",
      DatePreset::NextWeek => "Minggu Depan",
    }
  }

  pub fn value(self) -> &'static str {
    match self {
      DatePreset::Today => "today",
      DatePreset::Tomorrow => "tomorrow",
      DatePreset::ThisWeek => "this_week",
      DatePreset::NextWeek => "next_week",
    }
  }

  /// Resolve the preset relative to `today`.
  pub fn resolve(self, today: NaiveDate) -> NaiveDate {
    let from_sunday = i64::from(today.weekday().num_days_from_sunday());
    match self {
      DatePreset::Today => today,
      DatePreset::Tomorrow => today + Duration::days(1),
      DatePreset::ThisWeek => today - Duration::days(from_sunday),
      DatePreset::NextWeek => today + Duration::days(7 - from_sunday),
    }
  }
}

impl FromStr for DatePreset {
  type Err = String;

  /// Accepts both `this_week` and `this-week`.
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
    DatePreset::ALL
      .into_iter()
      .find(|p| p.value() == normalized)
      .ok_or_else(|| format!("unknown date preset '{}'", s))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
  }

  #[test]
  fn test_resolve_midweek() {
    // Tuesday
    let today = date(2025, 10, 7);
    assert_eq!(DatePreset::Today.resolve(today), today);
    assert_eq!(DatePreset::Tomorrow.resolve(today), date(2025, 10, 8));
    assert_eq!(DatePreset::ThisWeek.resolve(today), date(2025, 10, 5));
    assert_eq!(DatePreset::NextWeek.resolve(today), date(2025, 10, 12));
  }

  #[test]
  fn test_resolve_on_sunday() {
    let sunday = date(2025, 10, 5);
    assert_eq!(DatePreset::ThisWeek.resolve(sunday), sunday);
    assert_eq!(DatePreset::NextWeek.resolve(sunday), date(2025, 10, 12));
  }

  #[test]
  fn test_parse() {
    assert_eq!("today".parse::<DatePreset>(), Ok(DatePreset::Today));
    assert_eq!("this-week".parse::<DatePreset>(), Ok(DatePreset::ThisWeek));
    assert_eq!("NEXT_WEEK".parse::<DatePreset>(), Ok(DatePreset::NextWeek));
    assert!("yesterday".parse::<DatePreset>().is_err());
  }
}
