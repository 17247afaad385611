//! TTL cache with lazy validity checks
//!
//! Every entry carries its own TTL. Validity is evaluated at lookup time
//! (`now - stored_at < ttl`); stale entries are skipped but left in place
//! until they are overwritten or the cache is cleared. There is no sweeper.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use super::stats::{CacheStats, MetricsCollector};
use crate::time::{Clock, SystemClock};

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    stored_at: Instant,
    ttl: Duration,
}

impl<V> Entry<V> {
    fn is_valid(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) < self.ttl
    }
}

/// Thread-safe cache keyed by `K` with per-entry TTL.
///
/// # Example
/// ```
/// use std::time::Duration;
///
/// use tripdesk_common::cache::TtlCache;
///
/// let cache: TtlCache<String, u32> = TtlCache::new();
/// cache.insert("trips".to_string(), 3, Duration::from_secs(300));
/// assert_eq!(cache.get(&"trips".to_string()), Some(3));
/// ```
pub struct TtlCache<K, V, C = SystemClock>
where
    K: Eq + Hash + Clone,
    V: Clone,
    C: Clock,
{
    entries: RwLock<HashMap<K, Entry<V>>>,
    metrics: MetricsCollector,
    clock: C,
}

impl<K, V> TtlCache<K, V, SystemClock>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl<K, V> Default for TtlCache<K, V, SystemClock>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, C> TtlCache<K, V, C>
where
    K: Eq + Hash + Clone,
    V: Clone,
    C: Clock,
{
    /// Create a cache driven by a custom clock (useful for testing)
    pub fn with_clock(clock: C) -> Self {
        Self { entries: RwLock::new(HashMap::new()), metrics: MetricsCollector::new(), clock }
    }

    /// Store `value`, replacing any previous entry for `key`.
    pub fn insert(&self, key: K, value: V, ttl: Duration) {
        let entry = Entry { value, stored_at: self.clock.now(), ttl };
        self.entries.write().insert(key, entry);
        self.metrics.record_insert();
    }

    /// Return the value for `key` if present and still within its TTL.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        let entries = self.entries.read();
        match entries.get(key) {
            Some(entry) if entry.is_valid(now) => {
                self.metrics.record_hit();
                Some(entry.value.clone())
            }
            Some(_) => {
                self.metrics.record_stale();
                self.metrics.record_miss();
                None
            }
            None => {
                self.metrics.record_miss();
                None
            }
        }
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Number of stored entries, stale ones included.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.metrics.snapshot(self.len())
    }
}
