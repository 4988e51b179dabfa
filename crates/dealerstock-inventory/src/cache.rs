//! TTL-bounded caches over an injectable clock.
//!
//! [`TtlSlot`] holds the aggregated list: one entry, replaced wholesale, kept
//! past expiry so it can be served stale. [`TtlMap`] holds detail records
//! with an independent expiry per key; expired entries are evicted when
//! looked up, never by a background sweep.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Time source for cache expiry.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let by = chrono::Duration::from_std(by).unwrap_or(chrono::Duration::MAX);
        let mut now = self.now.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        *now = now.checked_add_signed(by).unwrap_or(*now);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<T> {
    pub data: T,
    pub timestamp: DateTime<Utc>,
}

fn is_fresh(timestamp: DateTime<Utc>, now: DateTime<Utc>, ttl: Duration) -> bool {
    // A clock that went backwards yields a negative age, which counts as fresh.
    (now - timestamp).to_std().map_or(true, |age| age < ttl)
}

/// Single-slot cache.
#[derive(Debug)]
pub struct TtlSlot<T> {
    entry: Option<CacheEntry<T>>,
    ttl: Duration,
}

impl<T> TtlSlot<T> {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self { entry: None, ttl }
    }

    /// The current entry and whether it is still within its TTL. Expired
    /// entries are returned too; callers decide whether stale data is
    /// acceptable.
    #[must_use]
    pub fn get(&self, now: DateTime<Utc>) -> Option<(&CacheEntry<T>, bool)> {
        self.entry
            .as_ref()
            .map(|entry| (entry, is_fresh(entry.timestamp, now, self.ttl)))
    }

    /// Replaces the slot and resets its timestamp.
    pub fn set(&mut self, data: T, now: DateTime<Utc>) -> &CacheEntry<T> {
        self.entry.insert(CacheEntry {
            data,
            timestamp: now,
        })
    }
}

/// Keyed cache with lazy per-entry expiry.
#[derive(Debug)]
pub struct TtlMap<K, V> {
    entries: HashMap<K, CacheEntry<V>>,
    ttl: Duration,
}

impl<K: Eq + Hash, V> TtlMap<K, V> {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
        }
    }

    /// Returns the live value for `key`, evicting it first if it expired.
    pub fn get(&mut self, key: &K, now: DateTime<Utc>) -> Option<&V> {
        let expired = self
            .entries
            .get(key)
            .is_some_and(|entry| !is_fresh(entry.timestamp, now, self.ttl));
        if expired {
            self.entries.remove(key);
            return None;
        }
        self.entries.get(key).map(|entry| &entry.data)
    }

    pub fn insert(&mut self, key: K, value: V, now: DateTime<Utc>) {
        self.entries.insert(
            key,
            CacheEntry {
                data: value,
                timestamp: now,
            },
        );
    }

    /// Number of stored entries, expired ones included until looked up.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
