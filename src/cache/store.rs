//! Cache Store Module
//!
//! Main cache engine combining HashMap storage with an eviction order and
//! time-based expiration. The store itself is single-threaded; [`Cache`]
//! wraps it in a lock for concurrent use.
//!
//! [`Cache`]: crate::cache::Cache

use std::collections::HashMap;
use std::time::Duration;

use tracing::debug;

use crate::cache::{
    CacheItem, CacheKey, CacheOptions, CacheStats, EvictionOrder, EvictionPolicy, Payload,
};

// == Cache Store ==
/// Bounded key to item table with eviction and expiry.
#[derive(Debug)]
pub struct CacheStore {
    /// Key-item storage
    items: HashMap<CacheKey, CacheItem>,
    /// Eviction candidates, back = next to go
    order: EvictionOrder,
    /// Performance statistics
    stats: CacheStats,
    /// Current configuration
    options: CacheOptions,
    /// Sum of stored payload sizes
    stored_bytes: usize,
}

impl CacheStore {
    // == Constructor ==
    /// Creates an empty store. Options are taken as given; validation is the
    /// caller's job.
    pub fn new(options: CacheOptions) -> Self {
        Self {
            items: HashMap::with_capacity(options.max_size),
            order: EvictionOrder::new(),
            stats: CacheStats::new(),
            options,
            stored_bytes: 0,
        }
    }

    // == Get ==
    /// Retrieves the content stored for `key`.
    ///
    /// Absent or expired keys, and any lookup on a disabled store, count as
    /// misses. Expired items are removed on the spot. Under LRU a hit makes
    /// the key the most recently used.
    pub fn get(&mut self, key: &CacheKey) -> Option<String> {
        self.lookup(key).map(|payload| payload.decode())
    }

    // == Lookup ==
    /// Same bookkeeping as [`get`](Self::get) but returns the stored payload
    /// undecoded, so callers can decompress without holding a lock.
    pub fn lookup(&mut self, key: &CacheKey) -> Option<Payload> {
        if !self.options.enabled {
            self.stats.record_miss();
            return None;
        }

        let expired = match self.items.get(key) {
            Some(item) => item.is_expired(self.options.expiration),
            None => {
                self.stats.record_miss();
                return None;
            }
        };

        if expired {
            self.remove_entry(key);
            self.stats.record_expirations(1);
            self.stats.record_miss();
            debug!(key = %key, "Expired item removed on read");
            return None;
        }

        let item = self.items.get_mut(key)?;
        if self.options.eviction_policy == EvictionPolicy::Lru {
            item.mark_used();
            self.order.touch(key);
        }
        self.stats.record_hit();
        Some(item.payload.clone())
    }

    // == Set ==
    /// Encodes `content` with the configured compression and stores it.
    pub fn set(&mut self, key: CacheKey, content: String) {
        if !self.options.enabled {
            return;
        }
        let payload = Payload::encode(content, &self.options.compression);
        self.insert(key, payload);
    }

    // == Insert ==
    /// Stores an already encoded payload.
    ///
    /// An existing key is updated in place. A new key on a full store first
    /// evicts the next candidate.
    pub fn insert(&mut self, key: CacheKey, payload: Payload) {
        if !self.options.enabled {
            return;
        }

        let added = payload.stored_len();
        if let Some(item) = self.items.get_mut(&key) {
            self.stored_bytes = self.stored_bytes.saturating_sub(item.stored_len()) + added;
            item.refresh(payload);
            if self.options.eviction_policy == EvictionPolicy::Lru {
                self.order.touch(&key);
            }
            return;
        }

        if self.options.max_size > 0 && self.items.len() >= self.options.max_size {
            self.evict_one();
        }

        self.stored_bytes += added;
        self.order.touch(&key);
        self.items.insert(key, CacheItem::new(payload));
        debug_assert_eq!(self.items.len(), self.order.len());
    }

    // == Evict ==
    /// Removes the next eviction candidate.
    fn evict_one(&mut self) -> Option<CacheKey> {
        let key = self.order.pop_back()?;
        if let Some(item) = self.items.remove(&key) {
            self.stored_bytes = self.stored_bytes.saturating_sub(item.stored_len());
        }
        self.stats.record_eviction();
        debug!(key = %key, policy = %self.options.eviction_policy, "Evicted item");
        Some(key)
    }

    fn remove_entry(&mut self, key: &CacheKey) -> Option<CacheItem> {
        let item = self.items.remove(key)?;
        self.order.remove(key);
        self.stored_bytes = self.stored_bytes.saturating_sub(item.stored_len());
        Some(item)
    }

    // == Delete ==
    /// Removes an item. Returns false if the key was not present.
    pub fn delete(&mut self, key: &CacheKey) -> bool {
        self.remove_entry(key).is_some()
    }

    // == Clear ==
    /// Drops every item and resets the hit/miss counters.
    pub fn clear(&mut self) {
        self.items.clear();
        self.order.clear();
        self.stored_bytes = 0;
        self.stats.reset_lookups();
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.items.len());
        stats
    }

    // == Remove Expired ==
    /// Removes every item older than the expiration, regardless of recent use.
    ///
    /// Returns the number of items removed.
    pub fn remove_expired(&mut self) -> usize {
        let expiration = self.options.expiration;
        if expiration.is_zero() {
            return 0;
        }

        let expired_keys: Vec<CacheKey> = self
            .items
            .iter()
            .filter(|(_, item)| item.is_expired(expiration))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired_keys {
            self.remove_entry(key);
        }

        self.stats.record_expirations(expired_keys.len());
        expired_keys.len()
    }

    // == Options ==
    /// Current configuration.
    pub fn options(&self) -> &CacheOptions {
        &self.options
    }

    /// Replaces the options.
    ///
    /// A size bound below the current occupancy evicts the excess before
    /// returning. Returns the number of evicted items.
    pub fn update_options(&mut self, options: CacheOptions) -> usize {
        self.options = options;
        self.shrink_to_bound()
    }

    /// Sets only the size bound and expiration; everything else is kept.
    /// Returns the number of evicted items.
    pub fn retune(&mut self, max_size: usize, expiration: Duration) -> usize {
        self.options.max_size = max_size;
        self.options.expiration = expiration;
        self.shrink_to_bound()
    }

    fn shrink_to_bound(&mut self) -> usize {
        let mut evicted = 0;
        if self.options.max_size > 0 {
            while self.items.len() > self.options.max_size && self.evict_one().is_some() {
                evicted += 1;
            }
        }
        if evicted > 0 {
            debug!(
                evicted,
                max_size = self.options.max_size,
                "Shrunk store to new size bound"
            );
        }
        evicted
    }

    // == Introspection ==
    /// Approximate bytes held by stored payloads.
    pub fn memory_usage(&self) -> usize {
        self.stored_bytes
    }

    /// Copies every item, most recently used (or inserted) first.
    pub fn snapshot(&self) -> Vec<(CacheKey, CacheItem)> {
        self.order
            .iter()
            .filter_map(|key| self.items.get(key).map(|item| (key.clone(), item.clone())))
            .collect()
    }

    /// Returns the current number of items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CompressionOptions;
    use std::thread::sleep;

    fn options(max_size: usize, policy: EvictionPolicy) -> CacheOptions {
        let mut options = CacheOptions {
            max_size,
            eviction_policy: policy,
            ..CacheOptions::default()
        };
        options.monitoring.enabled = false;
        options
    }

    fn key(id: &str) -> CacheKey {
        CacheKey::new(id, false, 0, 0)
    }

    #[test]
    fn test_store_new() {
        let store = CacheStore::new(options(10, EvictionPolicy::Lru));
        assert_eq!(store.len(), 0);
        assert!(store.is_empty());
        assert_eq!(store.memory_usage(), 0);
    }

    #[test]
    fn test_store_set_and_get() {
        let mut store = CacheStore::new(options(10, EvictionPolicy::Lru));

        store.set(key("a"), "<svg/>".to_string());

        assert_eq!(store.get(&key("a")), Some("<svg/>".to_string()));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_get_missing_counts_miss() {
        let mut store = CacheStore::new(options(10, EvictionPolicy::Lru));

        assert_eq!(store.get(&key("nope")), None);
        let stats = store.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 0);
    }

    #[test]
    fn test_store_disabled() {
        let mut opts = options(10, EvictionPolicy::Lru);
        opts.enabled = false;
        let mut store = CacheStore::new(opts);

        store.set(key("a"), "v".to_string());

        assert!(store.is_empty());
        assert_eq!(store.get(&key("a")), None);
        assert_eq!(store.stats().misses, 1);
    }

    #[test]
    fn test_store_overwrite() {
        let mut store = CacheStore::new(options(10, EvictionPolicy::Lru));

        store.set(key("a"), "one".to_string());
        store.set(key("a"), "two".to_string());

        assert_eq!(store.get(&key("a")), Some("two".to_string()));
        assert_eq!(store.len(), 1);
        assert_eq!(store.memory_usage(), 3);
    }

    #[test]
    fn test_store_delete() {
        let mut store = CacheStore::new(options(10, EvictionPolicy::Lru));

        store.set(key("a"), "v".to_string());

        assert!(store.delete(&key("a")));
        assert!(!store.delete(&key("a")));
        assert!(store.is_empty());
        assert_eq!(store.get(&key("a")), None);
    }

    #[test]
    fn test_store_clear_resets_lookups() {
        let mut store = CacheStore::new(options(10, EvictionPolicy::Lru));

        store.set(key("a"), "v".to_string());
        store.get(&key("a"));
        store.get(&key("b"));
        store.clear();

        let stats = store.stats();
        assert!(store.is_empty());
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
        assert_eq!(store.memory_usage(), 0);
    }

    #[test]
    fn test_store_lru_scenario() {
        let mut store = CacheStore::new(options(2, EvictionPolicy::Lru));

        store.set(key("A"), "a".to_string());
        store.set(key("B"), "b".to_string());
        store.get(&key("A"));
        store.set(key("C"), "c".to_string());

        assert_eq!(store.get(&key("B")), None);
        assert!(store.get(&key("A")).is_some());
        assert!(store.get(&key("C")).is_some());
        assert_eq!(store.stats().evictions, 1);
    }

    #[test]
    fn test_store_fifo_ignores_access() {
        let mut store = CacheStore::new(options(3, EvictionPolicy::Fifo));

        store.set(key("1"), "v1".to_string());
        store.set(key("2"), "v2".to_string());
        store.set(key("3"), "v3".to_string());
        store.get(&key("1"));
        store.set(key("4"), "v4".to_string());

        assert_eq!(store.get(&key("1")), None);
        assert!(store.get(&key("2")).is_some());
        assert!(store.get(&key("4")).is_some());
    }

    #[test]
    fn test_store_fifo_update_keeps_position() {
        let mut store = CacheStore::new(options(2, EvictionPolicy::Fifo));

        store.set(key("1"), "v1".to_string());
        store.set(key("2"), "v2".to_string());
        store.set(key("1"), "v1b".to_string());
        store.set(key("3"), "v3".to_string());

        assert_eq!(store.get(&key("1")), None);
        assert!(store.get(&key("2")).is_some());
    }

    #[test]
    fn test_store_lru_update_moves_to_front() {
        let mut store = CacheStore::new(options(2, EvictionPolicy::Lru));

        store.set(key("1"), "v1".to_string());
        store.set(key("2"), "v2".to_string());
        store.set(key("1"), "v1b".to_string());
        store.set(key("3"), "v3".to_string());

        assert_eq!(store.get(&key("1")), Some("v1b".to_string()));
        assert_eq!(store.get(&key("2")), None);
    }

    #[test]
    fn test_store_unbounded() {
        let mut store = CacheStore::new(options(0, EvictionPolicy::Lru));

        for i in 0..500 {
            store.set(key(&i.to_string()), "v".to_string());
        }

        assert_eq!(store.len(), 500);
        assert_eq!(store.stats().evictions, 0);
    }

    #[test]
    fn test_store_expiration_on_get() {
        let mut opts = options(10, EvictionPolicy::Lru);
        opts.expiration = Duration::from_millis(50);
        let mut store = CacheStore::new(opts);

        store.set(key("a"), "v".to_string());
        assert!(store.get(&key("a")).is_some());

        sleep(Duration::from_millis(80));

        assert_eq!(store.get(&key("a")), None);
        assert!(store.is_empty());
        let stats = store.stats();
        assert_eq!(stats.expirations, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_store_remove_expired_ignores_recent_use() {
        let mut opts = options(10, EvictionPolicy::Lru);
        opts.expiration = Duration::from_millis(50);
        let mut store = CacheStore::new(opts);

        store.set(key("old"), "v".to_string());
        sleep(Duration::from_millis(80));
        store.set(key("fresh"), "v".to_string());

        assert_eq!(store.remove_expired(), 1);
        assert_eq!(store.len(), 1);
        assert!(store.get(&key("fresh")).is_some());
    }

    #[test]
    fn test_store_remove_expired_zero_expiration() {
        let mut opts = options(10, EvictionPolicy::Lru);
        opts.expiration = Duration::ZERO;
        let mut store = CacheStore::new(opts);

        store.set(key("a"), "v".to_string());
        sleep(Duration::from_millis(5));

        assert_eq!(store.remove_expired(), 0);
        assert!(store.get(&key("a")).is_some());
    }

    #[test]
    fn test_store_update_options_shrinks() {
        let mut store = CacheStore::new(options(10, EvictionPolicy::Lru));

        for i in 0..10 {
            store.set(key(&i.to_string()), "v".to_string());
        }
        store.get(&key("0"));

        let evicted = store.update_options(options(3, EvictionPolicy::Lru));

        assert_eq!(evicted, 7);
        assert_eq!(store.len(), 3);
        // 0 was touched last, then 9 and 8 were the newest inserts
        assert!(store.get(&key("0")).is_some());
        assert!(store.get(&key("9")).is_some());
        assert!(store.get(&key("8")).is_some());
    }

    #[test]
    fn test_store_retune_keeps_other_options() {
        let mut opts = options(6, EvictionPolicy::Fifo);
        opts.compression.level = 4;
        let mut store = CacheStore::new(opts);
        for i in 0..6 {
            store.set(key(&i.to_string()), "v".to_string());
        }
        store.get(&key("0"));

        let evicted = store.retune(4, Duration::from_secs(30));

        assert_eq!(evicted, 2);
        assert_eq!(store.options().max_size, 4);
        assert_eq!(store.options().expiration, Duration::from_secs(30));
        assert_eq!(store.options().eviction_policy, EvictionPolicy::Fifo);
        assert_eq!(store.options().compression.level, 4);
        // FIFO: the read of 0 did not protect it
        assert!(store.get(&key("0")).is_none());
        assert!(store.get(&key("2")).is_some());
    }

    #[test]
    fn test_store_compressed_roundtrip() {
        let mut opts = options(10, EvictionPolicy::Lru);
        opts.compression = CompressionOptions {
            enabled: true,
            level: 9,
            min_size_bytes: 128,
            ratio_threshold: 0.8,
        };
        let mut store = CacheStore::new(opts);
        let svg = format!("<svg>{}</svg>", "<rect width=\"4\" height=\"4\"/>".repeat(60));

        store.set(key("big"), svg.clone());

        let snapshot = store.snapshot();
        assert!(snapshot[0].1.is_compressed());
        assert!(store.memory_usage() < svg.len());
        assert_eq!(store.get(&key("big")), Some(svg));
    }

    #[test]
    fn test_store_corrupt_payload_kept() {
        let mut store = CacheStore::new(options(10, EvictionPolicy::Lru));
        let raw = vec![0x1f, 0x8b, b'b', b'a', b'd'];

        store.insert(key("bad"), Payload::Compressed(raw.clone()));

        assert_eq!(
            store.get(&key("bad")),
            Some(String::from_utf8_lossy(&raw).into_owned())
        );
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_snapshot_order() {
        let mut store = CacheStore::new(options(10, EvictionPolicy::Lru));

        store.set(key("a"), "1".to_string());
        store.set(key("b"), "2".to_string());
        store.get(&key("a"));

        let ids: Vec<String> = store.snapshot().into_iter().map(|(k, _)| k.id).collect();
        assert_eq!(ids, vec!["a".to_string(), "b".to_string()]);
    }
}
