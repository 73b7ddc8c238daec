//! Single-slot TTL cache
//!
//! Holds exactly one value and refreshes it synchronously when it is older
//! than the TTL. This is not a general caching layer: no keys, no eviction
//! policy, no negative caching, and no invalidation when the upstream data
//! changes. Staleness is bounded by the TTL alone.

use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// A cached value and when it was fetched
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub value: T,
    pub fetched_at: Instant,
}

impl<T> CacheEntry<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            fetched_at: Instant::now(),
        }
    }

    /// True while `now - fetched_at < ttl`
    pub fn is_fresh(&self, ttl: Duration) -> bool {
        self.fetched_at.elapsed() < ttl
    }
}

/// One lazily refreshed cache slot
#[derive(Debug)]
pub struct CachedValue<T> {
    ttl: Duration,
    slot: Mutex<Option<CacheEntry<T>>>,
}

impl<T: Clone> CachedValue<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: Mutex::new(None),
        }
    }

    /// Return the cached value if fresh, otherwise run `refresh` and store its result.
    ///
    /// The slot stays locked while `refresh` runs, so concurrent callers wait
    /// for one refresh instead of starting their own. A failed refresh leaves
    /// the previous entry in place and returns the error.
    pub async fn get_or_refresh<E, F, Fut>(&self, refresh: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut slot = self.slot.lock().await;

        if let Some(entry) = slot.as_ref() {
            if entry.is_fresh(self.ttl) {
                tracing::debug!(age = ?entry.fetched_at.elapsed(), "cache hit");
                return Ok(entry.value.clone());
            }
        }

        let value = refresh().await?;
        *slot = Some(CacheEntry::new(value.clone()));
        Ok(value)
    }

    /// Drop the cached value
    pub async fn invalidate(&self) {
        *self.slot.lock().await = None;
    }
}
