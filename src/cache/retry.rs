//! Retry policy for fetchers and mutations.

use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::api::ApiError;
use crate::config::QuerySettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
  /// `min(base * 2^failures, cap)`
  Exponential,
  /// Always `base`.
  Fixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
  /// Retries after the first attempt; total attempts are `max_retries + 1`.
  pub max_retries: u32,
  pub base_delay: Duration,
  pub max_delay: Duration,
  pub backoff: Backoff,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self {
      max_retries: 3,
      base_delay: Duration::from_millis(1000),
      max_delay: Duration::from_millis(30_000),
      backoff: Backoff::Exponential,
    }
  }
}

impl RetryPolicy {
  /// Mutations are not safe to hammer: one retry after a fixed delay.
  pub fn mutation() -> Self {
    Self {
      max_retries: 1,
      base_delay: Duration::from_millis(1000),
      max_delay: Duration::from_millis(1000),
      backoff: Backoff::Fixed,
    }
  }

  pub fn never() -> Self {
    Self {
      max_retries: 0,
      ..Self::default()
    }
  }

  pub fn queries_from(settings: &QuerySettings) -> Self {
    Self {
      max_retries: settings.retry,
      base_delay: Duration::from_millis(settings.retry_base_ms),
      max_delay: Duration::from_millis(settings.retry_max_ms),
      backoff: Backoff::Exponential,
    }
  }

  pub fn mutations_from(settings: &QuerySettings) -> Self {
    let delay = Duration::from_millis(settings.mutation_retry_delay_ms);
    Self {
      max_retries: settings.mutation_retry,
      base_delay: delay,
      max_delay: delay,
      backoff: Backoff::Fixed,
    }
  }

  /// Whether to try again after `failures` failed attempts ending in `err`.
  pub fn should_retry(&self, failures: u32, err: &ApiError) -> bool {
    failures <= self.max_retries && err.is_retryable()
  }

  /// Delay before the next attempt, given the zero-based index of the
  /// failed attempt.
  pub fn delay(&self, attempt: u32) -> Duration {
    match self.backoff {
      Backoff::Fixed => self.base_delay,
      Backoff::Exponential => {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self
          .base_delay
          .checked_mul(factor)
          .unwrap_or(self.max_delay)
          .min(self.max_delay)
      }
    }
  }

  /// Run `op` until it succeeds, fails with a final error, or the retry
  /// budget is spent. The last error is returned as is.
  pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, ApiError>
  where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
  {
    let mut attempt = 0u32;
    loop {
      match op().await {
        Ok(value) => return Ok(value),
        Err(err) => {
          let failures = attempt + 1;
          if !self.should_retry(failures, &err) {
            if err.is_retryable() && self.max_retries > 0 {
              warn!(%label, attempts = failures, error = %err, "giving up after retries");
            }
            return Err(err);
          }
          let delay = self.delay(attempt);
          debug!(%label, attempt = failures, delay_ms = delay.as_millis() as u64, error = %err, "retrying");
          tokio::time::sleep(delay).await;
          attempt += 1;
        }
      }
    }
  }
}
