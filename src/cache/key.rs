//! Structural cache keys.

use serde_json::Value;
use std::fmt;
use std::hash::{Hash, Hasher};

/// An ordered tuple of JSON values identifying one cached resource,
/// e.g. `["rooms", "availability", "squats", "2025-10-07"]`.
///
/// Two keys are equal iff their serialized forms match exactly. A key is
/// also used as an invalidation pattern, matching every key it prefixes.
#[derive(Clone)]
pub struct QueryKey {
  parts: Vec<Value>,
  serialized: String,
}

impl QueryKey {
  pub fn new(parts: Vec<Value>) -> Self {
    let serialized = Value::Array(parts.clone()).to_string();
    Self { parts, serialized }
  }

  /// Key made only of string segments.
  pub fn from_segments<I, S>(segments: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self::new(
      segments
        .into_iter()
        .map(|s| Value::String(s.into()))
        .collect(),
    )
  }

  /// Append one more part.
  pub fn with(mut self, part: impl Into<Value>) -> Self {
    self.parts.push(part.into());
    self.serialized = Value::Array(self.parts.clone()).to_string();
    self
  }

  pub fn parts(&self) -> &[Value] {
    &self.parts
  }

  pub fn serialized(&self) -> &str {
    &self.serialized
  }

  pub fn len(&self) -> usize {
    self.parts.len()
  }

  pub fn is_empty(&self) -> bool {
    self.parts.is_empty()
  }

  /// Whether `pattern` is a prefix of this key. The empty pattern matches all.
  pub fn starts_with(&self, pattern: &QueryKey) -> bool {
    pattern.parts.len() <= self.parts.len()
      && self
        .parts
        .iter()
        .zip(&pattern.parts)
        .all(|(a, b)| a.to_string() == b.to_string())
  }
}

impl PartialEq for QueryKey {
  fn eq(&self, other: &Self) -> bool {
    self.serialized == other.serialized
  }
}

impl Eq for QueryKey {}

impl Hash for QueryKey {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.serialized.hash(state);
  }
}

impl fmt::Debug for QueryKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.serialized)
  }
}

/// Human-readable form, e.g. `rooms/availability/squats/2025-10-07`.
impl fmt::Display for QueryKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let segments: Vec<String> = self
      .parts
      .iter()
      .map(|p| match p {
        Value::String(s) => s.clone(),
        other => other.to_string(),
      })
      .collect();
    f.write_str(&segments.join("/"))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_equality_is_structural() {
    let a = QueryKey::from_segments(["meetings", "detail"]).with("42");
    let b = QueryKey::new(vec![json!("meetings"), json!("detail"), json!("42")]);
    assert_eq!(a, b);

    // A number and a string with the same digits are different keys.
    let c = QueryKey::from_segments(["meetings", "detail"]).with(42);
    assert_ne!(a, c);
  }

  #[test]
  fn test_object_parts_compare_by_serialization() {
    let a = QueryKey::from_segments(["meetings", "list"]).with(json!({"room": "squats", "date": null}));
    let b = QueryKey::from_segments(["meetings", "list"]).with(json!({"room": "squats", "date": null}));
    assert_eq!(a, b);
  }

  #[test]
  fn test_prefix_matching() {
    let key = QueryKey::from_segments(["rooms", "availability", "squats", "2025-10-07"]);
    assert!(key.starts_with(&QueryKey::from_segments(["rooms"])));
    assert!(key.starts_with(&QueryKey::from_segments(["rooms", "availability"])));
    assert!(key.starts_with(&key.clone()));
    assert!(key.starts_with(&QueryKey::new(Vec::new())));
    assert!(!key.starts_with(&QueryKey::from_segments(["meetings"])));
    assert!(!QueryKey::from_segments(["rooms"]).starts_with(&key));
  }

  #[test]
  fn test_display() {
    let key = QueryKey::from_segments(["rooms", "detail"]).with(7);
    assert_eq!(key.to_string(), "rooms/detail/7");
    assert_eq!(format!("{:?}", key), r#"["rooms","detail",7]"#);
  }
}
