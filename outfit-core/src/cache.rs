//! In-memory, time-expiring cache with an entry cap.
//!
//! Reads and writes are independent: two concurrent misses for the same key both
//! compute a value and the last `insert` wins.

use parking_lot::Mutex;
use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

pub const DEFAULT_MAX_ENTRIES: usize = 500;

#[derive(Debug)]
struct Entry<V> {
    value: V,
    /// `None` when the TTL runs past what `Instant` can represent.
    expires_at: Option<Instant>,
}

impl<V> Entry<V> {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

#[derive(Debug)]
pub struct TtlCache<V> {
    ttl: Duration,
    max_entries: usize,
    entries: Mutex<HashMap<String, Entry<V>>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            max_entries: DEFAULT_MAX_ENTRIES,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Caps the number of stored entries; at least one is always kept.
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries.max(1);
        self
    }

    /// The live value for `key`; an expired entry is removed and reported as a miss.
    pub fn get(&self, key: &str) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    /// Stores `value`, making room first when the cache is full.
    ///
    /// Room is made by dropping expired entries, then the entry closest to expiry.
    pub fn insert(&self, key: impl Into<String>, value: V) {
        self.insert_at(key.into(), value, Instant::now());
    }

    /// Drops every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Instant::now())
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn purge_expired_at(&self, now: Instant) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, e| e.is_live(now));
        before - entries.len()
    }

    fn get_at(&self, key: &str, now: Instant) -> Option<V> {
        let mut entries = self.entries.lock();
        let entry = entries.get(key)?;
        if entry.is_live(now) {
            return Some(entry.value.clone());
        }
        entries.remove(key);
        None
    }

    fn insert_at(&self, key: String, value: V, now: Instant) {
        let expires_at = now.checked_add(self.ttl);
        let mut entries = self.entries.lock();

        if !entries.contains_key(&key) && entries.len() >= self.max_entries {
            entries.retain(|_, e| e.is_live(now));
        }
        while !entries.contains_key(&key) && entries.len() >= self.max_entries {
            let Some(soonest) = entries
                .iter()
                .min_by_key(|(_, e)| (e.expires_at.is_none(), e.expires_at))
                .map(|(k, _)| k.clone())
            else {
                break;
            };
            entries.remove(&soonest);
        }

        entries.insert(key, Entry { value, expires_at });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_within_ttl() {
        let cache = TtlCache::new(Duration::from_secs(600));
        cache.insert("rec_Pune_18.5_73.8", "payload".to_string());

        assert_eq!(cache.get("rec_Pune_18.5_73.8").as_deref(), Some("payload"));
        assert_eq!(cache.get("rec_Delhi_28.6_77.2"), None);
    }

    #[test]
    fn expired_entry_is_a_miss_and_evicted() {
        let cache = TtlCache::new(Duration::from_secs(10));
        let start = Instant::now();
        cache.insert_at("k".to_string(), 1, start);

        assert_eq!(cache.get_at("k", start + Duration::from_secs(9)), Some(1));
        assert_eq!(cache.get_at("k", start + Duration::from_secs(10)), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn last_writer_wins() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.insert("k", 1);
        cache.insert("k", 2);

        assert_eq!(cache.get("k"), Some(2));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn full_cache_drops_expired_entries_first() {
        let cache = TtlCache::new(Duration::from_secs(60)).with_max_entries(3);
        let start = Instant::now();
        cache.insert_at("stale_a".to_string(), 1, start);
        cache.insert_at("stale_b".to_string(), 2, start);
        cache.insert_at("fresh".to_string(), 3, start + Duration::from_secs(50));

        let later = start + Duration::from_secs(70);
        cache.insert_at("new".to_string(), 4, later);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get_at("fresh", later), Some(3));
        assert_eq!(cache.get_at("new", later), Some(4));
    }

    #[test]
    fn full_cache_evicts_entry_closest_to_expiry() {
        let cache = TtlCache::new(Duration::from_secs(60)).with_max_entries(2);
        let start = Instant::now();
        cache.insert_at("first".to_string(), 1, start);
        cache.insert_at("second".to_string(), 2, start + Duration::from_secs(1));
        cache.insert_at("third".to_string(), 3, start + Duration::from_secs(2));

        let now = start + Duration::from_secs(3);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get_at("first", now), None);
        assert_eq!(cache.get_at("second", now), Some(2));
        assert_eq!(cache.get_at("third", now), Some(3));
    }

    #[test]
    fn distinct_queries_stay_within_cap() {
        let cache = TtlCache::new(Duration::from_secs(300));
        for i in 0..10_000 {
            cache.insert(format!("ac_q{i}"), i);
        }

        assert_eq!(cache.len(), DEFAULT_MAX_ENTRIES);
        assert_eq!(cache.get("ac_q9999"), Some(9999));
    }

    #[test]
    fn overwriting_a_key_in_a_full_cache_evicts_nothing() {
        let cache = TtlCache::new(Duration::from_secs(60)).with_max_entries(2);
        cache.insert("a", 1);
        cache.insert("b", 2);
        cache.insert("a", 3);

        assert_eq!(cache.get("a"), Some(3));
        assert_eq!(cache.get("b"), Some(2));
    }

    #[test]
    fn huge_ttl_never_expires() {
        let cache = TtlCache::new(Duration::from_secs(u64::MAX));
        cache.insert("k", 1);

        assert_eq!(cache.get("k"), Some(1));
        assert_eq!(cache.purge_expired(), 0);
    }

    #[test]
    fn purge_removes_only_expired() {
        let cache = TtlCache::new(Duration::from_secs(60));
        let start = Instant::now();
        cache.insert_at("old".to_string(), 1, start);
        cache.insert_at("fresh".to_string(), 2, start + Duration::from_secs(30));

        assert_eq!(cache.purge_expired_at(start + Duration::from_secs(61)), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get_at("fresh", start + Duration::from_secs(61)), Some(2));
    }
}
