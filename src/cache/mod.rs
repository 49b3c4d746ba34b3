//! In-memory query cache.
//!
//! This module is independent of the booking API:
//! - Keys are structural JSON tuples, matched by prefix for invalidation
//! - Reads are coalesced per key and served from cache while fresh
//! - Failed fetches are retried with capped exponential backoff
//! - Unused entries are evicted after a retention window

mod client;
mod key;
mod retry;
mod subscription;

pub use client::{ClientOptions, FetchState, QueryClient, QueryStatus};
pub use key::QueryKey;
pub use retry::{Backoff, RetryPolicy};
pub use subscription::{CacheEvent, CacheEventKind, Subscription};
