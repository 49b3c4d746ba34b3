use serde::{Deserialize, Serialize};

/// One scheduled meeting as returned by the schedule endpoint.
///
/// Times are wall-clock "HH:MM" strings. Older records carry no date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meeting {
  #[serde(rename = "waktu_mulai")]
  pub start_time: String,
  #[serde(rename = "waktu_selesai")]
  pub end_time: String,
  #[serde(rename = "nama_ruangan")]
  pub room_name: String,
  #[serde(rename = "tanggal", default, skip_serializing_if = "Option::is_none")]
  pub date: Option<String>,
}

impl Meeting {
  /// Calendar day of the meeting ("YYYY-MM-DD"), if the record has one.
  pub fn day(&self) -> Option<&str> {
    self
      .date
      .as_deref()
      .map(|d| d.split('T').next().unwrap_or(d))
      .filter(|d| !d.is_empty())
  }
}

/// Partial update for an existing meeting; omitted fields stay unchanged.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MeetingUpdate {
  #[serde(rename = "waktu_mulai", skip_serializing_if = "Option::is_none")]
  pub start_time: Option<String>,
  #[serde(rename = "waktu_selesai", skip_serializing_if = "Option::is_none")]
  pub end_time: Option<String>,
  #[serde(rename = "nama_ruangan", skip_serializing_if = "Option::is_none")]
  pub room_name: Option<String>,
  #[serde(rename = "tanggal", skip_serializing_if = "Option::is_none")]
  pub date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub id: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(default)]
  pub email: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub role: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginCredentials {
  pub email: String,
  pub password: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
  #[serde(default)]
  pub token: Option<String>,
  #[serde(default)]
  pub user: Option<User>,
}

/// Wire body of `POST /booking`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookingPayload {
  /// "YYYY-MM-DD"
  #[serde(rename = "tanggal")]
  pub date: String,
  #[serde(rename = "waktu_mulai")]
  pub start_time: String,
  #[serde(rename = "waktu_selesai")]
  pub end_time: String,
  #[serde(rename = "ruangan")]
  pub room: String,
  #[serde(rename = "keperluan")]
  pub purpose: String,
  #[serde(rename = "jumlah_peserta")]
  pub participant_count: u32,
  #[serde(rename = "divisi")]
  pub division: String,
  pub pic: String,
  #[serde(rename = "no_telp")]
  pub phone: String,
}
