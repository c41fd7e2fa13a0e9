//! In-memory TTL cache.
//!
//! Entries are stamped with their insertion instant and checked for freshness
//! lazily: a lookup that finds a stale entry evicts it and reports a miss.
//! There is no background timer; [`TtlCache::sweep`] is an opportunistic purge
//! that callers run after writes, and correctness never depends on it.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

pub mod clock;

pub use clock::{Clock, ManualClock, SystemClock};

/// Default freshness window: five minutes.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
}

/// A key → value map whose entries expire `ttl` after insertion.
///
/// The cache owns its entries outright; values are handed out as clones, so
/// store an [`Arc`] when values are large.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use std::time::Duration;
/// use ideas_relay::cache::{ManualClock, TtlCache};
///
/// let clock = Arc::new(ManualClock::new());
/// let mut cache = TtlCache::new(Duration::from_secs(300), clock.clone());
///
/// cache.put("ideas_1_10_-published_at", 42);
/// assert_eq!(cache.get(&"ideas_1_10_-published_at"), Some(42));
///
/// clock.advance(Duration::from_secs(300));
/// assert_eq!(cache.get(&"ideas_1_10_-published_at"), None);
/// assert_eq!(cache.size(), 0);
/// ```
pub struct TtlCache<K, V> {
    entries: HashMap<K, CacheEntry<V>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
            clock,
        }
    }

    /// Returns the stored value if it is younger than the TTL.
    ///
    /// An entry whose age has reached the TTL is removed and `None` returned.
    pub fn get(&mut self, key: &K) -> Option<V> {
        let now = self.clock.now();
        let entry = self.entries.get(key)?;

        if now.saturating_duration_since(entry.inserted_at) < self.ttl {
            return Some(entry.value.clone());
        }

        trace!("evicting stale entry on lookup");
        self.entries.remove(key);
        None
    }

    /// Stores `value` under `key`, replacing any previous entry and restarting
    /// its freshness window.
    pub fn put(&mut self, key: K, value: V) {
        let inserted_at = self.clock.now();
        self.entries.insert(key, CacheEntry { value, inserted_at });
    }

    /// Removes every entry whose age exceeds the TTL and returns how many were
    /// removed.
    pub fn sweep(&mut self) -> usize {
        let now = self.clock.now();
        let ttl = self.ttl;
        let before = self.entries.len();

        self.entries
            .retain(|_, entry| now.saturating_duration_since(entry.inserted_at) <= ttl);

        let removed = before - self.entries.len();
        if removed > 0 {
            debug!(removed, remaining = self.entries.len(), "swept stale cache entries");
        }
        removed
    }

    /// Number of entries currently held, including stale ones not yet evicted.
    pub fn size(&self) -> usize {
        self.entries.len()
    }

    /// Drops every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Insertion instant of the entry under `key`, without checking freshness.
    pub fn inserted_at(&self, key: &K) -> Option<Instant> {
        self.entries.get(key).map(|entry| entry.inserted_at)
    }
}
