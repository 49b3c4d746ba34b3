//! Display formatting for dates, times and contact details.
//!
//! Labels are Indonesian, matching what the booking service shows its users.

use chrono::{DateTime, Datelike, Local, NaiveDate, NaiveDateTime, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;

const MONTHS: [&str; 12] = [
  "Januari",
  "Februari",
  "Maret",
  "April",
  "Mei",
  "Juni",
  "Juli",
  "Agustus",
  "September",
  "Oktober",
  "November",
  "Desember",
];

static HH_MM: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{2}:\d{2}$").expect("Invalid time regex"));
static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w\S*").expect("Invalid word regex"));

/// Today in local time.
pub fn today() -> NaiveDate {
  Local::now().date_naive()
}

/// "7 Oktober 2025"
pub fn format_date(date: NaiveDate) -> String {
  format!("{} {} {}", date.day(), MONTHS[date.month0() as usize], date.year())
}

/// "7 Oktober 2025, 14:30"
pub fn format_date_time(at: NaiveDateTime) -> String {
  format!("{}, {}", format_date(at.date()), at.format("%H:%M"))
}

/// Calendar day of a "YYYY-MM-DD" or ISO-8601 timestamp string.
pub fn parse_day(value: &str) -> Option<NaiveDate> {
  let day = value.split('T').next().unwrap_or(value).trim();
  NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

/// Display a time as "HH:MM".
///
/// Strings already in that shape are returned untouched. Timestamps are
/// shown in local time; anything unparseable is returned as given.
pub fn format_time(time: &str) -> String {
  if HH_MM.is_match(time) {
    return time.to_string();
  }
  if let Ok(at) = DateTime::parse_from_rfc3339(time) {
    return at.with_timezone(&Local).format("%H:%M").to_string();
  }
  if let Ok(at) = NaiveDateTime::parse_from_str(time, "%Y-%m-%dT%H:%M:%S") {
    return at.format("%H:%M").to_string();
  }
  if let Ok(t) = NaiveTime::parse_from_str(time, "%H:%M:%S") {
    return t.format("%H:%M").to_string();
  }
  time.to_string()
}

/// Minutes since midnight of an "H:MM"-ish string; 0 when it has no colon.
fn minutes_of(time: &str) -> i64 {
  let Some((hours, minutes)) = time.split_once(':') else {
    return 0;
  };
  leading_int(hours) * 60 + leading_int(minutes)
}

fn leading_int(s: &str) -> i64 {
  let s = s.trim_start();
  let digits: String = s.chars().take_while(|c| c.is_ascii_digit()).collect();
  digits.parse().unwrap_or(0)
}

/// Length of a meeting: "15 menit", "1 jam", "1 jam 30 menit".
/// A span of zero or less is "0 menit".
pub fn format_duration(start: &str, end: &str) -> String {
  let diff = minutes_of(end) - minutes_of(start);
  if diff <= 0 {
    return "0 menit".to_string();
  }
  if diff < 60 {
    return format!("{} menit", diff);
  }
  let (hours, mins) = (diff / 60, diff % 60);
  if mins > 0 {
    format!("{} jam {} menit", hours, mins)
  } else {
    format!("{} jam", hours)
  }
}

/// Normalize an Indonesian phone number: "62..." gets a "+", local numbers
/// keep or gain a leading "0". Non-digits are dropped.
pub fn format_phone(phone: &str) -> String {
  let cleaned: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
  if cleaned.starts_with("62") {
    format!("+{}", cleaned)
  } else if cleaned.starts_with('0') {
    cleaned
  } else {
    format!("0{}", cleaned)
  }
}

/// "HH:MM" slots from `start_hour` up to (not including) `end_hour`.
pub fn generate_time_slots(start_hour: u32, end_hour: u32, interval_minutes: u32) -> Vec<String> {
  if interval_minutes == 0 {
    return Vec::new();
  }
  let mut slots = Vec::new();
  for hour in start_hour..end_hour {
    let mut minute = 0;
    while minute < 60 {
      slots.push(format!("{:02}:{:02}", hour, minute));
      minute += interval_minutes;
    }
  }
  slots
}

pub fn is_today(date: NaiveDate, today: NaiveDate) -> bool {
  date == today
}

pub fn is_past(at: NaiveDateTime, now: NaiveDateTime) -> bool {
  at < now
}

/// Capitalize the first letter of each word and lowercase the rest.
pub fn capitalize(s: &str) -> String {
  WORD
    .replace_all(s, |caps: &regex::Captures| {
      let word = &caps[0];
      let mut chars = word.chars();
      match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
      }
    })
    .into_owned()
}

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}
