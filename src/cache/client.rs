//! In-memory query cache with request coalescing.
//!
//! Each key has one `CacheEntry` moving through `Idle -> Fetching ->
//! Success | Error`. A read served from fresh data never touches the
//! network; concurrent reads of the same key share one spawned fetch; a
//! mutation invalidates matching keys once it succeeds.
//!
//! Every fetch draws a sequence number when it is issued. Data is only
//! replaced by a fetch issued after the one that produced it, so a slow early
//! response never overwrites a faster later one. Entries also carry an epoch:
//! fetches that started before `remove_queries`/`clear` never write into the
//! entry that replaced the removed one.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, info, trace};

use super::key::QueryKey;
use super::retry::RetryPolicy;
use super::subscription::{CacheEvent, CacheEventKind, Subscription};
use crate::api::ApiError;
use crate::config::QuerySettings;

type AnyData = Arc<dyn Any + Send + Sync>;
type SharedFetch = Shared<BoxFuture<'static, Result<AnyData, ApiError>>>;
type Outbox = Vec<(mpsc::UnboundedSender<CacheEvent>, CacheEvent)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchState {
  Idle,
  Fetching,
  Success,
  Error,
}

/// Tuning for one `QueryClient`.
#[derive(Debug, Clone, Copy)]
pub struct ClientOptions {
  /// Used when a read does not name its own stale window.
  pub stale_after: Duration,
  /// How long an entry may sit without subscribers before eviction.
  pub gc_time: Duration,
  pub retry: RetryPolicy,
  pub mutation_retry: RetryPolicy,
}

impl Default for ClientOptions {
  fn default() -> Self {
    Self {
      stale_after: Duration::from_secs(5 * 60),
      gc_time: Duration::from_secs(10 * 60),
      retry: RetryPolicy::default(),
      mutation_retry: RetryPolicy::mutation(),
    }
  }
}

impl From<&QuerySettings> for ClientOptions {
  fn from(settings: &QuerySettings) -> Self {
    Self {
      stale_after: Duration::from_secs(settings.stale_time_secs),
      gc_time: Duration::from_secs(settings.gc_time_secs),
      retry: RetryPolicy::queries_from(settings),
      mutation_retry: RetryPolicy::mutations_from(settings),
    }
  }
}

/// Point-in-time view of one entry.
#[derive(Debug, Clone)]
pub struct QueryStatus {
  pub state: FetchState,
  pub has_data: bool,
  pub fetched_at: Option<Instant>,
  pub is_stale: bool,
  pub invalidated: bool,
  pub subscribers: usize,
  pub last_error: Option<ApiError>,
}

struct InFlight {
  seq: u64,
  fetch: SharedFetch,
}

struct CacheEntry {
  key: QueryKey,
  data: Option<AnyData>,
  fetched_at: Option<Instant>,
  stale_after: Duration,
  state: FetchState,
  last_error: Option<ApiError>,
  invalidated: bool,
  /// Fetches issued at or before this sequence number land already stale.
  invalidated_after: u64,
  subscribers: HashMap<u64, mpsc::UnboundedSender<CacheEvent>>,
  unused_since: Option<Instant>,
  inflight: Option<InFlight>,
  /// Every fetch task still running for this entry, superseded ones included.
  running: Vec<(u64, AbortHandle)>,
  issued_seq: u64,
  committed_seq: u64,
  epoch: u64,
}

impl CacheEntry {
  fn new(key: QueryKey, stale_after: Duration, epoch: u64) -> Self {
    Self {
      key,
      data: None,
      fetched_at: None,
      stale_after,
      state: FetchState::Idle,
      last_error: None,
      invalidated: false,
      invalidated_after: 0,
      subscribers: HashMap::new(),
      unused_since: Some(Instant::now()),
      inflight: None,
      running: Vec::new(),
      issued_seq: 0,
      committed_seq: 0,
      epoch,
    }
  }

  fn is_fresh(&self, now: Instant) -> bool {
    match (&self.data, self.fetched_at) {
      (Some(_), Some(at)) => !self.invalidated && now.saturating_duration_since(at) < self.stale_after,
      _ => false,
    }
  }

  fn touch(&mut self, now: Instant) {
    if self.subscribers.is_empty() {
      self.unused_since = Some(now);
    }
  }

  fn broadcast(&self, kind: CacheEventKind, outbox: &mut Outbox) {
    for tx in self.subscribers.values() {
      outbox.push((
        tx.clone(),
        CacheEvent {
          key: self.key.clone(),
          kind: kind.clone(),
        },
      ));
    }
  }
}

#[derive(Default)]
struct CacheState {
  entries: HashMap<QueryKey, CacheEntry>,
  next_epoch: u64,
  next_subscriber: u64,
}

impl CacheState {
  fn entry(&mut self, key: &QueryKey, stale_after: Duration) -> &mut CacheEntry {
    let next_epoch = &mut self.next_epoch;
    self.entries.entry(key.clone()).or_insert_with(|| {
      *next_epoch += 1;
      debug!(key = %key, "cache entry created");
      CacheEntry::new(key.clone(), stale_after, *next_epoch)
    })
  }
}

pub(crate) struct ClientInner {
  state: Mutex<CacheState>,
  options: ClientOptions,
  seq: AtomicU64,
  disposed: AtomicBool,
}

impl ClientInner {
  fn lock(&self) -> MutexGuard<'_, CacheState> {
    self
      .state
      .lock()
      .unwrap_or_else(|poisoned| poisoned.into_inner())
  }

  fn next_seq(&self) -> u64 {
    self.seq.fetch_add(1, Ordering::SeqCst) + 1
  }

  /// Drop one subscriber; the entry starts its retention window when the
  /// last one leaves.
  pub(super) fn release(&self, key: &QueryKey, id: u64) {
    let mut state = self.lock();
    if let Some(entry) = state.entries.get_mut(key) {
      entry.subscribers.remove(&id);
      if entry.subscribers.is_empty() {
        entry.unused_since = Some(Instant::now());
      }
    }
  }

  /// Record the outcome of fetch `seq` started against entry `epoch`.
  fn commit(&self, key: &QueryKey, epoch: u64, seq: u64, result: &Result<AnyData, ApiError>) {
    let mut outbox = Outbox::new();
    {
      let mut state = self.lock();
      let Some(entry) = state.entries.get_mut(key) else {
        trace!(key = %key, seq, "entry gone, dropping fetch result");
        return;
      };
      entry.running.retain(|(running, _)| *running != seq);
      if entry.epoch != epoch {
        trace!(key = %key, seq, "entry replaced, dropping fetch result");
        return;
      }
      if entry.inflight.as_ref().is_some_and(|f| f.seq == seq) {
        entry.inflight = None;
      }

      let now = Instant::now();
      match result {
        Ok(data) if seq > entry.committed_seq => {
          entry.data = Some(Arc::clone(data));
          entry.fetched_at = Some(now);
          entry.committed_seq = seq;
          entry.invalidated = seq <= entry.invalidated_after;
          if seq >= entry.issued_seq || entry.inflight.is_none() {
            entry.state = FetchState::Success;
            entry.last_error = None;
          }
          debug!(key = %key, seq, "cache entry updated");
          entry.broadcast(CacheEventKind::Updated, &mut outbox);
        }
        Ok(_) => {
          debug!(key = %key, seq, committed = entry.committed_seq, "discarding out-of-order response");
        }
        Err(err) if seq == entry.issued_seq => {
          entry.state = FetchState::Error;
          entry.last_error = Some(err.clone());
          debug!(key = %key, seq, error = %err, "fetch failed");
          entry.broadcast(CacheEventKind::Errored(err.clone()), &mut outbox);
        }
        Err(err) => {
          trace!(key = %key, seq, error = %err, "superseded fetch failed");
        }
      }
      if entry.inflight.is_none() && entry.state == FetchState::Fetching {
        entry.state = if entry.data.is_some() {
          FetchState::Success
        } else {
          FetchState::Idle
        };
      }
      entry.touch(now);
    }
    deliver(outbox);
  }
}

fn deliver(outbox: Outbox) {
  for (tx, event) in outbox {
    // A closed receiver means the handle is being dropped.
    let _ = tx.send(event);
  }
}

fn downcast<T: Clone + 'static>(key: &QueryKey, data: &AnyData) -> Result<T, ApiError> {
  data
    .downcast_ref::<T>()
    .cloned()
    .ok_or_else(|| ApiError::CacheType { key: key.to_string() })
}

/// Shared handle to one cache. Clones refer to the same entries.
#[derive(Clone)]
pub struct QueryClient {
  inner: Arc<ClientInner>,
}

impl Default for QueryClient {
  fn default() -> Self {
    Self::new(ClientOptions::default())
  }
}

impl QueryClient {
  pub fn new(options: ClientOptions) -> Self {
    Self {
      inner: Arc::new(ClientInner {
        state: Mutex::new(CacheState::default()),
        options,
        seq: AtomicU64::new(0),
        disposed: AtomicBool::new(false),
      }),
    }
  }

  pub fn options(&self) -> &ClientOptions {
    &self.inner.options
  }

  fn check_alive(&self) -> Result<(), ApiError> {
    if self.inner.disposed.load(Ordering::SeqCst) {
      Err(ApiError::cancelled("query client disposed"))
    } else {
      Ok(())
    }
  }

  /// Read `key`, fetching only when the cached data is missing or stale.
  ///
  /// Callers arriving while a fetch is in flight wait on that fetch instead of
  /// starting another. Failed fetches are retried per the client's policy.
  pub async fn ensure<T, F, Fut>(&self, key: QueryKey, stale_after: Duration, fetcher: F) -> Result<T, ApiError>
  where
    T: Clone + Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
  {
    self.check_alive()?;
    self.gc();

    let fetch = {
      let mut state = self.inner.lock();
      let now = Instant::now();
      let entry = state.entry(&key, stale_after);
      entry.stale_after = stale_after;
      entry.touch(now);

      if entry.is_fresh(now) {
        trace!(key = %key, "cache hit");
        if let Some(data) = &entry.data {
          return downcast(&key, data);
        }
      }
      // A fetch issued before the last invalidation would answer with
      // pre-mutation data, so only newer ones are joined.
      let joinable = entry
        .inflight
        .as_ref()
        .filter(|f| f.seq > entry.invalidated_after)
        .map(|f| f.fetch.clone());
      match joinable {
        Some(fetch) => {
          trace!(key = %key, "joining in-flight fetch");
          fetch
        }
        None => self.start_fetch(entry, fetcher),
      }
    };

    let data = fetch.await?;
    downcast(&key, &data)
  }

  /// Fetch `key` now, even if fresh data or an older fetch exists.
  pub async fn refetch<T, F, Fut>(&self, key: QueryKey, stale_after: Duration, fetcher: F) -> Result<T, ApiError>
  where
    T: Clone + Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
  {
    self.check_alive()?;
    let fetch = {
      let mut state = self.inner.lock();
      let entry = state.entry(&key, stale_after);
      entry.stale_after = stale_after;
      entry.touch(Instant::now());
      self.start_fetch(entry, fetcher)
    };
    let data = fetch.await?;
    downcast(&key, &data)
  }

  /// Run a mutation, then mark every key under `invalidates` stale.
  ///
  /// On failure the cache is left untouched.
  pub async fn mutate<T, F, Fut>(&self, label: &str, invalidates: &[QueryKey], fetcher: F) -> Result<T, ApiError>
  where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
  {
    self.check_alive()?;
    let value = self.inner.options.mutation_retry.run(label, fetcher).await?;
    for pattern in invalidates {
      self.invalidate(pattern);
    }
    Ok(value)
  }

  /// Mark every entry under `pattern` stale. Returns how many matched.
  pub fn invalidate(&self, pattern: &QueryKey) -> usize {
    let mut outbox = Outbox::new();
    let watermark = self.inner.seq.load(Ordering::SeqCst);
    let count = {
      let mut state = self.inner.lock();
      let mut count = 0;
      for entry in state.entries.values_mut().filter(|e| e.key.starts_with(pattern)) {
        entry.invalidated = true;
        entry.invalidated_after = watermark;
        entry.broadcast(CacheEventKind::Invalidated, &mut outbox);
        count += 1;
      }
      count
    };
    debug!(pattern = %pattern, count, "invalidated queries");
    deliver(outbox);
    count
  }

  /// Watch `key` for changes. The entry is created if needed.
  pub fn subscribe(&self, key: QueryKey) -> Subscription {
    let (tx, rx) = mpsc::unbounded_channel();
    let stale_after = self.inner.options.stale_after;
    let id = {
      let mut state = self.inner.lock();
      state.next_subscriber += 1;
      let id = state.next_subscriber;
      let entry = state.entry(&key, stale_after);
      entry.subscribers.insert(id, tx);
      entry.unused_since = None;
      id
    };
    Subscription {
      id,
      key,
      rx,
      client: Arc::downgrade(&self.inner),
    }
  }

  pub fn get_query_data<T: Clone + 'static>(&self, key: &QueryKey) -> Option<T> {
    let state = self.inner.lock();
    state
      .entries
      .get(key)
      .and_then(|e| e.data.as_ref())
      .and_then(|d| d.downcast_ref::<T>())
      .cloned()
  }

  /// Store `value` under `key` as freshly fetched data.
  ///
  /// Fetches already in flight for the key will not overwrite it.
  pub fn set_query_data<T: Send + Sync + 'static>(&self, key: QueryKey, value: T) {
    let mut outbox = Outbox::new();
    let seq = self.inner.next_seq();
    let stale_after = self.inner.options.stale_after;
    {
      let mut state = self.inner.lock();
      let now = Instant::now();
      let entry = state.entry(&key, stale_after);
      entry.data = Some(Arc::new(value));
      entry.fetched_at = Some(now);
      entry.committed_seq = seq;
      entry.invalidated = false;
      entry.last_error = None;
      if entry.inflight.is_none() {
        entry.state = FetchState::Success;
      }
      entry.touch(now);
      entry.broadcast(CacheEventKind::Updated, &mut outbox);
    }
    debug!(key = %key, "query data set");
    deliver(outbox);
  }

  /// Remove every entry under `pattern`. Returns how many were removed.
  ///
  /// Subscribers stay attached to an empty replacement entry.
  pub fn remove_queries(&self, pattern: &QueryKey) -> usize {
    let mut outbox = Outbox::new();
    let stale_after = self.inner.options.stale_after;
    let count = {
      let mut state = self.inner.lock();
      let keys: Vec<QueryKey> = state
        .entries
        .keys()
        .filter(|k| k.starts_with(pattern))
        .cloned()
        .collect();
      for key in &keys {
        let Some(old) = state.entries.remove(key) else {
          continue;
        };
        old.broadcast(CacheEventKind::Removed, &mut outbox);
        if !old.subscribers.is_empty() {
          state.next_epoch += 1;
          let mut fresh = CacheEntry::new(key.clone(), stale_after, state.next_epoch);
          fresh.subscribers = old.subscribers;
          fresh.running = old.running;
          fresh.unused_since = None;
          state.entries.insert(key.clone(), fresh);
        }
      }
      keys.len()
    };
    debug!(pattern = %pattern, count, "removed queries");
    deliver(outbox);
    count
  }

  /// Drop all cached data.
  pub fn clear(&self) {
    let count = self.remove_queries(&QueryKey::new(Vec::new()));
    info!(count, "query cache cleared");
  }

  pub fn status(&self, key: &QueryKey) -> Option<QueryStatus> {
    let state = self.inner.lock();
    let now = Instant::now();
    state.entries.get(key).map(|e| QueryStatus {
      state: e.state,
      has_data: e.data.is_some(),
      fetched_at: e.fetched_at,
      is_stale: !e.is_fresh(now),
      invalidated: e.invalidated,
      subscribers: e.subscribers.len(),
      last_error: e.last_error.clone(),
    })
  }

  /// Evict entries unused for longer than the retention window.
  pub fn gc(&self) -> usize {
    let gc_time = self.inner.options.gc_time;
    let now = Instant::now();
    let mut state = self.inner.lock();
    let before = state.entries.len();
    state.entries.retain(|key, e| {
      let expired = e.subscribers.is_empty()
        && e.running.is_empty()
        && e
          .unused_since
          .is_some_and(|since| now.saturating_duration_since(since) >= gc_time);
      if expired {
        debug!(key = %key, "evicting unused cache entry");
      }
      !expired
    });
    before - state.entries.len()
  }

  pub fn len(&self) -> usize {
    self.inner.lock().entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Abort in-flight fetches, drop every entry and refuse further work.
  /// Subscriptions see their stream end.
  pub fn dispose(&self) {
    if self.inner.disposed.swap(true, Ordering::SeqCst) {
      return;
    }
    let entries = std::mem::take(&mut self.inner.lock().entries);
    for entry in entries.values() {
      for (_, abort) in &entry.running {
        abort.abort();
      }
    }
    info!(count = entries.len(), "query client disposed");
  }

  pub fn is_disposed(&self) -> bool {
    self.inner.disposed.load(Ordering::SeqCst)
  }

  /// Issue a new fetch for `entry` and record it as the one in flight.
  fn start_fetch<T, F, Fut>(&self, entry: &mut CacheEntry, fetcher: F) -> SharedFetch
  where
    T: Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
  {
    let seq = self.inner.next_seq();
    let epoch = entry.epoch;
    let key = entry.key.clone();
    let policy = self.inner.options.retry;
    let client = Arc::downgrade(&self.inner);
    debug!(key = %key, seq, "fetching");

    let task = tokio::spawn(async move {
      let label = key.to_string();
      let result = policy
        .run(&label, || fetcher())
        .await
        .map(|value| Arc::new(value) as AnyData);
      if let Some(client) = client.upgrade() {
        client.commit(&key, epoch, seq, &result);
      }
      result
    });
    let abort = task.abort_handle();
    let fetch = async move {
      match task.await {
        Ok(result) => result,
        Err(e) => Err(ApiError::cancelled(e.to_string())),
      }
    }
    .boxed()
    .shared();

    entry.state = FetchState::Fetching;
    entry.issued_seq = seq;
    entry.running.push((seq, abort));
    entry.inflight = Some(InFlight {
      seq,
      fetch: fetch.clone(),
    });
    fetch
  }
}

impl std::fmt::Debug for QueryClient {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("QueryClient")
      .field("entries", &self.len())
      .field("options", &self.inner.options)
      .finish_non_exhaustive()
  }
}
