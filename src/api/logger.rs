//! Bounded in-memory log of API traffic.
//!
//! Every request, response and error is appended to a fixed-capacity ring
//! buffer regardless of the enabled flag; the flag only controls whether a
//! human-readable trace is emitted through `tracing`. Nothing here can fail
//! the caller: a poisoned lock is recovered and the record still lands.

use chrono::{DateTime, Local};
use serde_json::Value;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Default number of records kept before the oldest is evicted.
pub const DEFAULT_CAPACITY: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
  Request,
  Response,
  Error,
}

/// A single recorded event.
#[derive(Debug, Clone)]
pub struct ApiLog {
  pub kind: LogKind,
  pub method: String,
  pub url: String,
  pub timestamp: DateTime<Local>,
  pub duration: Option<Duration>,
  pub status: Option<u16>,
  pub headers: Option<BTreeMap<String, String>>,
  pub data: Option<Value>,
  pub error: Option<String>,
}

/// Counts per record kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogSummary {
  pub requests: usize,
  pub responses: usize,
  pub errors: usize,
  pub total: usize,
}

struct LoggerInner {
  enabled: AtomicBool,
  capacity: usize,
  logs: Mutex<VecDeque<ApiLog>>,
}

/// Cheaply cloneable handle to one log buffer.
#[derive(Clone)]
pub struct ApiLogger {
  inner: Arc<LoggerInner>,
}

impl Default for ApiLogger {
  fn default() -> Self {
    Self::new(cfg!(debug_assertions), DEFAULT_CAPACITY)
  }
}

impl ApiLogger {
  pub fn new(enabled: bool, capacity: usize) -> Self {
    let capacity = capacity.max(1);
    if enabled {
      debug!(capacity, "API logger initialized");
    }
    Self {
      inner: Arc::new(LoggerInner {
        enabled: AtomicBool::new(enabled),
        capacity,
        logs: Mutex::new(VecDeque::with_capacity(capacity)),
      }),
    }
  }

  pub fn enable(&self) {
    self.inner.enabled.store(true, Ordering::Relaxed);
    info!("API debug logger enabled");
  }

  pub fn disable(&self) {
    self.inner.enabled.store(false, Ordering::Relaxed);
    info!("API debug logger disabled");
  }

  pub fn is_enabled(&self) -> bool {
    self.inner.enabled.load(Ordering::Relaxed)
  }

  pub fn capacity(&self) -> usize {
    self.inner.capacity
  }

  pub fn log_request(
    &self,
    method: &str,
    url: &str,
    data: Option<&Value>,
    headers: Option<&BTreeMap<String, String>>,
  ) {
    let method = method.to_uppercase();
    if self.is_enabled() {
      debug!(%method, %url, data = ?data, headers = ?headers, "API request");
    }
    self.push(ApiLog {
      kind: LogKind::Request,
      method,
      url: url.to_string(),
      timestamp: Local::now(),
      duration: None,
      status: None,
      headers: headers.cloned(),
      data: data.cloned(),
      error: None,
    });
  }

  pub fn log_response(
    &self,
    method: &str,
    url: &str,
    status: u16,
    data: Option<&Value>,
    duration: Duration,
    headers: Option<&BTreeMap<String, String>>,
  ) {
    let method = method.to_uppercase();
    if self.is_enabled() {
      let elapsed_ms = duration.as_millis() as u64;
      if (200..300).contains(&status) {
        debug!(%method, %url, status, elapsed_ms, data = ?data, "API response");
      } else {
        warn!(%method, %url, status, elapsed_ms, data = ?data, "API response");
      }
    }
    self.push(ApiLog {
      kind: LogKind::Response,
      method,
      url: url.to_string(),
      timestamp: Local::now(),
      duration: Some(duration),
      status: Some(status),
      headers: headers.cloned(),
      data: data.cloned(),
      error: None,
    });
  }

  pub fn log_error(&self, method: &str, url: &str, err: &dyn std::fmt::Display, duration: Option<Duration>) {
    let method = method.to_uppercase();
    let message = err.to_string();
    if self.is_enabled() {
      let elapsed_ms = duration.map(|d| d.as_millis() as u64);
      error!(%method, %url, error = %message, elapsed_ms = ?elapsed_ms, "API error");
    }
    self.push(ApiLog {
      kind: LogKind::Error,
      method,
      url: url.to_string(),
      timestamp: Local::now(),
      duration,
      status: None,
      headers: None,
      data: None,
      error: Some(message),
    });
  }

  /// Snapshot of the buffer, oldest record first.
  pub fn logs(&self) -> Vec<ApiLog> {
    self.lock().iter().cloned().collect()
  }

  pub fn clear_logs(&self) {
    self.lock().clear();
    if self.is_enabled() {
      debug!("API logs cleared");
    }
  }

  pub fn summary(&self) -> LogSummary {
    let logs = self.lock();
    let mut summary = LogSummary {
      total: logs.len(),
      ..LogSummary::default()
    };
    for log in logs.iter() {
      match log.kind {
        LogKind::Request => summary.requests += 1,
        LogKind::Response => summary.responses += 1,
        LogKind::Error => summary.errors += 1,
      }
    }
    summary
  }

  pub fn print_summary(&self) {
    if !self.is_enabled() {
      return;
    }
    let s = self.summary();
    info!(
      requests = s.requests,
      responses = s.responses,
      errors = s.errors,
      total = s.total,
      "API logs summary"
    );
  }

  fn push(&self, log: ApiLog) {
    let mut logs = self.lock();
    while logs.len() >= self.inner.capacity {
      logs.pop_front();
    }
    logs.push_back(log);
  }

  fn lock(&self) -> MutexGuard<'_, VecDeque<ApiLog>> {
    // A panic while holding the lock must not take logging down with it.
    self
      .inner
      .logs
      .lock()
      .unwrap_or_else(|poisoned| poisoned.into_inner())
  }
}

impl std::fmt::Debug for ApiLogger {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ApiLogger")
      .field("enabled", &self.is_enabled())
      .field("capacity", &self.inner.capacity)
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_records_even_when_disabled() {
    let logger = ApiLogger::new(false, 10);
    logger.log_request("get", "http://x/a", None, None);
    let logs = logger.logs();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].kind, LogKind::Request);
    assert_eq!(logs[0].method, "GET");
  }

  #[test]
  fn test_ring_buffer_evicts_oldest() {
    let logger = ApiLogger::new(false, 3);
    for i in 0..5 {
      logger.log_request("GET", &format!("http://x/{}", i), None, None);
    }
    let urls: Vec<String> = logger.logs().into_iter().map(|l| l.url).collect();
    assert_eq!(urls, vec!["http://x/2", "http://x/3", "http://x/4"]);
  }

  #[test]
  fn test_snapshot_does_not_alias_buffer() {
    let logger = ApiLogger::new(false, 10);
    logger.log_request("GET", "http://x/a", Some(&json!({"a": 1})), None);
    let mut snapshot = logger.logs();
    snapshot.clear();
    assert_eq!(logger.logs().len(), 1);
  }

  #[test]
  fn test_summary_and_clear() {
    let logger = ApiLogger::new(true, 10);
    logger.log_request("GET", "http://x/a", None, None);
    logger.log_response("GET", "http://x/a", 200, None, Duration::from_millis(12), None);
    logger.log_request("GET", "http://x/b", None, None);
    logger.log_error("GET", "http://x/b", &"boom", Some(Duration::from_millis(3)));

    let summary = logger.summary();
    assert_eq!(
      summary,
      LogSummary {
        requests: 2,
        responses: 1,
        errors: 1,
        total: 4
      }
    );
    let errors: Vec<ApiLog> = logger
      .logs()
      .into_iter()
      .filter(|l| l.kind == LogKind::Error)
      .collect();
    assert_eq!(errors[0].error.as_deref(), Some("boom"));

    logger.clear_logs();
    assert!(logger.logs().is_empty());
  }

  #[test]
  fn test_enable_toggle() {
    let logger = ApiLogger::new(false, 10);
    assert!(!logger.is_enabled());
    logger.enable();
    assert!(logger.is_enabled());
    logger.disable();
    assert!(!logger.is_enabled());
  }
}
