//! Screen-facing view of one cached query.
//!
//! A `Query<T>` watches a single key of a `QueryClient`: it starts fetches
//! through the shared cache (so several screens asking for the same key still
//! cause one request) and picks up changes other code makes to that key.
//!
//! # Example
//!
//! ```ignore
//! let meetings = api.api().meetings.clone();
//! let mut query = Query::new(api.cache().clone(), keys::schedule(), move || {
//!     let meetings = meetings.clone();
//!     async move { meetings.get_schedule().await }
//! })
//! .with_stale_time(Duration::from_secs(120));
//!
//! query.fetch();
//!
//! // In the event loop tick
//! if query.poll() {
//!     // State changed, redraw
//! }
//!
//! match query.state() {
//!     QueryState::Loading => render_spinner(),
//!     QueryState::Success(data) => render_data(data),
//!     QueryState::Error(e) => render_error(e),
//!     QueryState::Idle => {}
//! }
//! ```

use futures::future::{BoxFuture, FutureExt};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::api::ApiError;
use crate::cache::{CacheEventKind, QueryClient, QueryKey, Subscription};

/// The state of a query
#[derive(Debug, Clone)]
pub enum QueryState<T> {
  /// Query has not been started
  Idle,
  /// Query is currently fetching data
  Loading,
  /// Query completed successfully
  Success(T),
  /// Query failed with an error
  Error(ApiError),
}

impl<T> QueryState<T> {
  pub fn is_loading(&self) -> bool {
    matches!(self, QueryState::Loading)
  }

  pub fn is_success(&self) -> bool {
    matches!(self, QueryState::Success(_))
  }

  pub fn is_error(&self) -> bool {
    matches!(self, QueryState::Error(_))
  }

  pub fn data(&self) -> Option<&T> {
    match self {
      QueryState::Success(data) => Some(data),
      _ => None,
    }
  }

  pub fn error(&self) -> Option<&ApiError> {
    match self {
      QueryState::Error(e) => Some(e),
      _ => None,
    }
  }
}

type FetcherFn<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<T, ApiError>> + Send + Sync>;

/// Observer over one key of a `QueryClient`.
pub struct Query<T> {
  state: QueryState<T>,
  client: QueryClient,
  key: QueryKey,
  fetcher: FetcherFn<T>,
  receiver: Option<mpsc::UnboundedReceiver<Result<T, ApiError>>>,
  subscription: Subscription,
  fetched_at: Option<Instant>,
  stale_time: Duration,
  invalidated: bool,
}

impl<T: Clone + Send + Sync + 'static> Query<T> {
  /// Create a query for `key`. The fetcher runs each time the cache decides
  /// the key needs fetching.
  pub fn new<F, Fut>(client: QueryClient, key: QueryKey, fetcher: F) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
  {
    let subscription = client.subscribe(key.clone());
    let stale_time = client.options().stale_after;
    Self {
      state: QueryState::Idle,
      client,
      key,
      fetcher: Arc::new(move || fetcher().boxed()),
      receiver: None,
      subscription,
      fetched_at: None,
      stale_time,
      invalidated: false,
    }
  }

  /// Set the stale time for this query.
  pub fn with_stale_time(mut self, duration: Duration) -> Self {
    self.stale_time = duration;
    self
  }

  pub fn key(&self) -> &QueryKey {
    &self.key
  }

  pub fn state(&self) -> &QueryState<T> {
    &self.state
  }

  pub fn data(&self) -> Option<&T> {
    self.state.data()
  }

  pub fn is_loading(&self) -> bool {
    self.state.is_loading()
  }

  pub fn is_success(&self) -> bool {
    self.state.is_success()
  }

  pub fn is_error(&self) -> bool {
    self.state.is_error()
  }

  pub fn error(&self) -> Option<&ApiError> {
    self.state.error()
  }

  /// Check if the data is stale: older than stale_time or invalidated.
  pub fn is_stale(&self) -> bool {
    match &self.state {
      QueryState::Success(_) => {
        self.invalidated
          || self
            .fetched_at
            .map(|t| t.elapsed() > self.stale_time)
            .unwrap_or(true)
      }
      _ => false,
    }
  }

  /// Start fetching data if not already loading.
  ///
  /// Fresh cached data resolves without a network call.
  pub fn fetch(&mut self) {
    if self.state.is_loading() {
      return;
    }
    self.start_fetch(false);
  }

  /// Force a network fetch, even if already loading or data is fresh.
  pub fn refetch(&mut self) {
    // Stop listening to the pending result; the cache orders the responses.
    self.receiver = None;
    self.start_fetch(true);
  }

  /// Apply a pending fetch result and any cache events for this key.
  ///
  /// Returns `true` if the state changed.
  pub fn poll(&mut self) -> bool {
    let mut changed = self.poll_result();

    while let Some(event) = self.subscription.try_recv() {
      match event.kind {
        CacheEventKind::Updated => {
          if self.state.is_loading() {
            continue;
          }
          if let Some(data) = self.client.get_query_data::<T>(&self.key) {
            self.state = QueryState::Success(data);
            self.fetched_at = Some(Instant::now());
            self.invalidated = false;
            changed = true;
          }
        }
        CacheEventKind::Errored(err) => {
          if !self.state.is_loading() {
            self.state = QueryState::Error(err);
            changed = true;
          }
        }
        CacheEventKind::Invalidated => {
          if !self.invalidated {
            self.invalidated = true;
            changed = true;
          }
        }
        CacheEventKind::Removed => {
          if !self.state.is_loading() && !matches!(self.state, QueryState::Idle) {
            self.state = QueryState::Idle;
            self.fetched_at = None;
            changed = true;
          }
        }
      }
    }
    changed
  }

  fn poll_result(&mut self) -> bool {
    let receiver = match &mut self.receiver {
      Some(rx) => rx,
      None => return false,
    };

    match receiver.try_recv() {
      Ok(Ok(data)) => {
        self.state = QueryState::Success(data);
        self.fetched_at = Some(Instant::now());
        self.invalidated = false;
        self.receiver = None;
        true
      }
      Ok(Err(error)) => {
        self.state = QueryState::Error(error);
        self.receiver = None;
        true
      }
      Err(mpsc::error::TryRecvError::Empty) => false,
      Err(mpsc::error::TryRecvError::Disconnected) => {
        self.state = QueryState::Error(ApiError::cancelled("query task ended without a result"));
        self.receiver = None;
        true
      }
    }
  }

  fn start_fetch(&mut self, force: bool) {
    let (tx, rx) = mpsc::unbounded_channel();
    self.receiver = Some(rx);
    self.state = QueryState::Loading;

    let client = self.client.clone();
    let key = self.key.clone();
    let stale_time = self.stale_time;
    let fetcher = Arc::clone(&self.fetcher);
    tokio::spawn(async move {
      let run = move || fetcher();
      let result = if force {
        client.refetch(key, stale_time, run).await
      } else {
        client.ensure(key, stale_time, run).await
      };
      // Ignore send errors - the query may have moved on
      let _ = tx.send(result);
    });
  }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Query<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Query")
      .field("key", &self.key)
      .field("state", &self.state)
      .field("fetched_at", &self.fetched_at)
      .field("stale_time", &self.stale_time)
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicU32, Ordering};

  fn key() -> QueryKey {
    QueryKey::from_segments(["meetings", "list"])
  }

  #[tokio::test]
  async fn test_query_success() {
    let mut query = Query::new(QueryClient::default(), key(), || async { Ok(vec![1, 2, 3]) });

    assert!(matches!(query.state(), QueryState::Idle));

    query.fetch();
    assert!(query.is_loading());

    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(query.poll());
    assert!(query.is_success());
    assert_eq!(query.data(), Some(&vec![1, 2, 3]));
  }

  #[tokio::test]
  async fn test_query_error() {
    let mut query: Query<i32> = Query::new(QueryClient::default(), key(), || async {
      Err(ApiError::Application {
        message: "Sesi berakhir".to_string(),
        body: serde_json::Value::Null,
        method: "GET".to_string(),
        url: "http://localhost/jadwalruangan".to_string(),
      })
    });

    query.fetch();
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(query.poll());
    assert!(query.is_error());
    assert_eq!(query.error().map(|e| e.to_string()).as_deref(), Some("Sesi berakhir"));
  }

  #[tokio::test]
  async fn test_query_stale() {
    let mut query = Query::new(QueryClient::default(), key(), || async { Ok(42) }).with_stale_time(Duration::ZERO);

    query.fetch();
    tokio::time::sleep(Duration::from_millis(10)).await;
    query.poll();

    assert!(query.is_stale());
  }

  #[tokio::test]
  async fn test_fetch_while_loading_is_noop() {
    let mut query = Query::new(QueryClient::default(), key(), || async {
      tokio::time::sleep(Duration::from_millis(100)).await;
      Ok(42)
    });

    query.fetch();
    assert!(query.is_loading());

    query.fetch();
    assert!(query.is_loading());
  }

  #[tokio::test]
  async fn test_refetch_keeps_latest() {
    let counter = Arc::new(AtomicU32::new(0));
    let counter_clone = counter.clone();

    let mut query = Query::new(QueryClient::default(), key(), move || {
      let counter = counter_clone.clone();
      async move {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok(n)
      }
    });

    query.fetch();
    tokio::time::sleep(Duration::from_millis(10)).await;

    query.refetch();
    tokio::time::sleep(Duration::from_millis(100)).await;

    query.poll();
    assert_eq!(query.data(), Some(&1));
  }

  #[tokio::test]
  async fn test_two_queries_share_one_fetch() {
    let client = QueryClient::default();
    let calls = Arc::new(AtomicU32::new(0));
    let make = |calls: Arc<AtomicU32>| {
      move || {
        let calls = calls.clone();
        async move {
          calls.fetch_add(1, Ordering::SeqCst);
          tokio::time::sleep(Duration::from_millis(20)).await;
          Ok("jadwal".to_string())
        }
      }
    };

    let mut first = Query::new(client.clone(), key(), make(calls.clone()));
    let mut second = Query::new(client.clone(), key(), make(calls.clone()));
    first.fetch();
    second.fetch();
    tokio::time::sleep(Duration::from_millis(60)).await;

    first.poll();
    second.poll();
    assert_eq!(first.data().map(String::as_str), Some("jadwal"));
    assert_eq!(second.data().map(String::as_str), Some("jadwal"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_picks_up_external_changes() {
    let client = QueryClient::default();
    let mut query = Query::new(client.clone(), key(), || async { Ok(1u32) });

    query.fetch();
    tokio::time::sleep(Duration::from_millis(10)).await;
    query.poll();
    assert_eq!(query.data(), Some(&1));

    client.set_query_data(key(), 2u32);
    assert!(query.poll());
    assert_eq!(query.data(), Some(&2));

    client.invalidate(&key());
    assert!(query.poll());
    assert!(query.is_stale());

    client.clear();
    assert!(query.poll());
    assert!(matches!(query.state(), QueryState::Idle));
  }
}
