//! Bounded, name-keyed counter caches.
//!
//! Each tracked key owns a [`UsageCounters`] set. The refresh loop is the
//! only writer; exporters read concurrently, so implementations do their
//! own locking. Eviction is entirely the cache's business.

use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};

use lru::LruCache;
use serde::Serialize;

/// A named numeric field within a counter set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageField {
    UsedBytes,
    NumObjects,
}

impl UsageField {
    pub const ALL: [UsageField; 2] = [UsageField::UsedBytes, UsageField::NumObjects];

    pub fn name(self) -> &'static str {
        match self {
            UsageField::UsedBytes => "used_bytes",
            UsageField::NumObjects => "num_objects",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            UsageField::UsedBytes => "Used bytes",
            UsageField::NumObjects => "Number of objects",
        }
    }
}

/// Current gauges for one tracked key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UsageCounters {
    pub used_bytes: u64,
    pub num_objects: u64,
}

impl UsageCounters {
    pub fn new(used_bytes: u64, num_objects: u64) -> Self {
        Self {
            used_bytes,
            num_objects,
        }
    }

    pub fn get(&self, field: UsageField) -> u64 {
        match field {
            UsageField::UsedBytes => self.used_bytes,
            UsageField::NumObjects => self.num_objects,
        }
    }

    pub fn set(&mut self, field: UsageField, value: u64) {
        match field {
            UsageField::UsedBytes => self.used_bytes = value,
            UsageField::NumObjects => self.num_objects = value,
        }
    }
}

/// A bounded cache of counter sets keyed by name.
pub trait CounterCache: Send + Sync {
    /// Overwrite one field of `key`'s counter set, creating the set if absent.
    fn set(&self, key: &str, field: UsageField, value: u64);

    /// Overwrite every field of `key`'s counter set in one step, creating the
    /// set if absent. Readers never see a half-written set.
    fn set_counters(&self, key: &str, counters: UsageCounters);

    /// Current counters for `key`, without touching recency.
    fn get(&self, key: &str) -> Option<UsageCounters>;

    /// All tracked keys and their counters, most recently used first.
    fn entries(&self) -> Vec<(String, UsageCounters)>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// [`CounterCache`] backed by an LRU map behind a mutex.
pub struct LruCounterCache {
    inner: Mutex<LruCache<String, UsageCounters>>,
}

impl LruCounterCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.lock().cap().get()
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<String, UsageCounters>> {
        // Counter values stay consistent even if a holder panicked.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CounterCache for LruCounterCache {
    fn set(&self, key: &str, field: UsageField, value: u64) {
        let mut cache = self.lock();
        match cache.get_mut(key) {
            Some(counters) => counters.set(field, value),
            None => {
                let mut counters = UsageCounters::default();
                counters.set(field, value);
                cache.put(key.to_string(), counters);
            }
        }
    }

    fn set_counters(&self, key: &str, counters: UsageCounters) {
        let mut cache = self.lock();
        match cache.get_mut(key) {
            Some(current) => *current = counters,
            None => {
                cache.put(key.to_string(), counters);
            }
        }
    }

    fn get(&self, key: &str) -> Option<UsageCounters> {
        self.lock().peek(key).copied()
    }

    fn entries(&self) -> Vec<(String, UsageCounters)> {
        self.lock()
            .iter()
            .map(|(key, counters)| (key.clone(), *counters))
            .collect()
    }

    fn len(&self) -> usize {
        self.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(capacity: usize) -> LruCounterCache {
        LruCounterCache::new(NonZeroUsize::new(capacity).unwrap())
    }

    #[test]
    fn set_creates_entry_lazily() {
        let cache = cache(4);
        assert!(cache.get("bkt1").is_none());

        cache.set("bkt1", UsageField::UsedBytes, 2000);
        assert_eq!(cache.get("bkt1"), Some(UsageCounters::new(2000, 0)));

        cache.set("bkt1", UsageField::NumObjects, 10);
        assert_eq!(cache.get("bkt1"), Some(UsageCounters::new(2000, 10)));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn set_overwrites_without_accumulating() {
        let cache = cache(4);
        cache.set("user:alice", UsageField::UsedBytes, 1000);
        cache.set("user:alice", UsageField::UsedBytes, 1500);
        assert_eq!(cache.get("user:alice").unwrap().used_bytes, 1500);
    }

    #[test]
    fn evicts_least_recently_used_at_capacity() {
        let cache = cache(2);
        cache.set("a", UsageField::UsedBytes, 1);
        cache.set("b", UsageField::UsedBytes, 2);
        // Touch "a" so "b" becomes the eviction candidate.
        cache.set("a", UsageField::NumObjects, 1);
        cache.set("c", UsageField::UsedBytes, 3);

        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").is_some());
        assert!(cache.get("b").is_none());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn get_does_not_refresh_recency() {
        let cache = cache(2);
        cache.set("a", UsageField::UsedBytes, 1);
        cache.set("b", UsageField::UsedBytes, 2);
        let _ = cache.get("a");
        cache.set("c", UsageField::UsedBytes, 3);

        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_some());
    }

    #[test]
    fn entries_lists_everything() {
        let cache = cache(8);
        cache.set("a", UsageField::UsedBytes, 1);
        cache.set("b", UsageField::NumObjects, 2);

        let mut entries = cache.entries();
        entries.sort_by(|x, y| x.0.cmp(&y.0));
        assert_eq!(
            entries,
            vec![
                ("a".to_string(), UsageCounters::new(1, 0)),
                ("b".to_string(), UsageCounters::new(0, 2)),
            ]
        );
        assert_eq!(cache.capacity(), 8);
    }

    #[test]
    fn set_counters_replaces_the_whole_set() {
        let cache = cache(2);
        cache.set_counters("bkt1", UsageCounters::new(2000, 10));
        assert_eq!(cache.get("bkt1"), Some(UsageCounters::new(2000, 10)));

        cache.set_counters("bkt1", UsageCounters::new(2500, 0));
        assert_eq!(cache.get("bkt1"), Some(UsageCounters::new(2500, 0)));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn set_counters_touches_recency() {
        let cache = cache(2);
        cache.set_counters("a", UsageCounters::new(1, 1));
        cache.set_counters("b", UsageCounters::new(2, 2));
        cache.set_counters("a", UsageCounters::new(3, 3));
        cache.set_counters("c", UsageCounters::new(4, 4));

        assert_eq!(cache.get("a"), Some(UsageCounters::new(3, 3)));
        assert!(cache.get("b").is_none());
    }

    #[test]
    fn field_names() {
        assert_eq!(UsageField::UsedBytes.name(), "used_bytes");
        assert_eq!(UsageField::NumObjects.name(), "num_objects");
        assert_eq!(UsageField::UsedBytes.description(), "Used bytes");
        assert_eq!(UsageField::NumObjects.description(), "Number of objects");
    }
}
