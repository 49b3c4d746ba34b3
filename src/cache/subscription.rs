//! Change notifications for cache entries.

use std::sync::Weak;
use tokio::sync::mpsc;

use super::client::ClientInner;
use super::key::QueryKey;
use crate::api::ApiError;

#[derive(Debug, Clone)]
pub enum CacheEventKind {
  /// New data was committed.
  Updated,
  /// A fetch failed after exhausting its retries.
  Errored(ApiError),
  /// The entry was marked stale; the next read refetches.
  Invalidated,
  /// The entry was removed or the cache cleared.
  Removed,
}

#[derive(Debug, Clone)]
pub struct CacheEvent {
  pub key: QueryKey,
  pub kind: CacheEventKind,
}

/// Handle returned by `QueryClient::subscribe`.
///
/// Holding it counts as a subscriber and keeps the entry from being
/// garbage-collected. Dropping it stops delivery.
pub struct Subscription {
  pub(super) id: u64,
  pub(super) key: QueryKey,
  pub(super) rx: mpsc::UnboundedReceiver<CacheEvent>,
  pub(super) client: Weak<ClientInner>,
}

impl Subscription {
  pub fn key(&self) -> &QueryKey {
    &self.key
  }

  /// Wait for the next event. Returns `None` once the client is disposed.
  pub async fn recv(&mut self) -> Option<CacheEvent> {
    self.rx.recv().await
  }

  /// Next queued event, without waiting.
  pub fn try_recv(&mut self) -> Option<CacheEvent> {
    self.rx.try_recv().ok()
  }
}

impl Drop for Subscription {
  fn drop(&mut self) {
    if let Some(client) = self.client.upgrade() {
      client.release(&self.key, self.id);
    }
  }
}

impl std::fmt::Debug for Subscription {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Subscription")
      .field("id", &self.id)
      .field("key", &self.key)
      .finish_non_exhaustive()
  }
}
