//! Shared Cache Handle
//!
//! Thread-safe front for [`CacheStore`]. Every clone refers to the same
//! store. One reader/writer lock guards the store; lookups take it
//! exclusively because LRU bookkeeping mutates the eviction order.

use std::sync::{Arc, Weak};
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::cache::{CacheItem, CacheKey, CacheOptions, CacheStats, CacheStore, Payload};
use crate::error::Result;
use crate::tasks::{Monitor, MonitorSlot};

/// Shards in the key-derivation memo.
pub const DERIVATION_SHARDS: usize = 16;

// == Cache ==
/// Cloneable handle to one cache instance.
#[derive(Clone, Debug)]
pub struct Cache {
    /// Thread-safe cache store
    store: Arc<RwLock<CacheStore>>,
    /// Memoized hash to (style, theme) derivations
    derivations: Arc<DashMap<String, (usize, usize)>>,
    /// The cache's monitor, if any handle to it is still alive
    monitor: Arc<MonitorSlot>,
}

impl Cache {
    // == Constructor ==
    /// Creates a cache after validating `options`.
    ///
    /// The monitor is not started here; see [`spawn_monitor`](Self::spawn_monitor).
    pub fn new(options: CacheOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            store: Arc::new(RwLock::new(CacheStore::new(options))),
            derivations: Arc::new(DashMap::with_shard_amount(DERIVATION_SHARDS)),
            monitor: Arc::new(MonitorSlot::new(Weak::new())),
        })
    }

    // == Get ==
    /// Returns the cached content, or None on a miss.
    ///
    /// Decompression happens after the lock is released.
    pub async fn get(&self, key: &CacheKey) -> Option<String> {
        let payload = self.store.write().await.lookup(key)?;
        Some(payload.decode())
    }

    // == Set ==
    /// Stores `content` under `key`.
    ///
    /// Optimization and compression run without holding the lock; only the
    /// final insert is exclusive.
    pub async fn set(&self, key: CacheKey, content: String) {
        let compression = {
            let store = self.store.read().await;
            if !store.options().enabled {
                return;
            }
            store.options().compression.clone()
        };

        let payload = Payload::encode(content, &compression);
        self.store.write().await.insert(key, payload);
    }

    // == Delete ==
    /// Removes `key`. Returns false if it was not cached.
    pub async fn delete(&self, key: &CacheKey) -> bool {
        self.store.write().await.delete(key)
    }

    /// Deletes by textual key (`id_excludeBackground_theme_part`).
    ///
    /// Malformed input is logged and rejected without touching the store.
    pub async fn delete_encoded(&self, encoded: &str) -> bool {
        let key: CacheKey = match encoded.parse() {
            Ok(key) => key,
            Err(e) => {
                warn!("Rejected delete for '{}': {}", encoded, e);
                return false;
            }
        };

        let removed = self.delete(&key).await;
        if !removed {
            debug!(key = %key, "Delete requested for absent key");
        }
        removed
    }

    /// Drops every item and resets the hit/miss counters.
    pub async fn clear(&self) {
        self.store.write().await.clear();
    }

    /// Number of cached items.
    pub async fn size(&self) -> usize {
        self.store.read().await.len()
    }

    /// Copy of the current counters.
    pub async fn stats(&self) -> CacheStats {
        self.store.read().await.stats()
    }

    /// Removes every expired item; returns how many went.
    pub async fn remove_expired(&self) -> usize {
        self.store.write().await.remove_expired()
    }

    /// Bytes held by stored payloads.
    pub async fn memory_usage(&self) -> usize {
        self.store.read().await.memory_usage()
    }

    /// Copies every item, most recent first.
    pub async fn snapshot(&self) -> Vec<(CacheKey, CacheItem)> {
        self.store.read().await.snapshot()
    }

    // == Options ==
    /// Current options, cloned.
    pub async fn options(&self) -> CacheOptions {
        self.store.read().await.options().clone()
    }

    /// Replaces the options after validating them.
    ///
    /// Lowering `max_size` below the current occupancy evicts the excess
    /// before this returns. Invalid options leave the cache untouched.
    pub async fn update_options(&self, options: CacheOptions) -> Result<()> {
        options.validate()?;
        self.store.write().await.update_options(options);
        Ok(())
    }

    /// Sets only the size bound and expiration, leaving every other option
    /// as it is at the time of the write. Returns the number of evictions.
    pub async fn retune(&self, max_size: usize, expiration: Duration) -> usize {
        self.store.write().await.retune(max_size, expiration)
    }

    // == Key Derivation ==
    /// Maps a hash string to a (style, theme) index pair, memoized per cache.
    ///
    /// The ASCII digits of `hash` are folded into a number which is reduced
    /// modulo `style_count`, then modulo the theme count of the chosen style.
    /// Zero counts yield index 0. The derivation runs without any shard lock
    /// held; if two callers race on one hash the first insert wins.
    pub fn derive_indices<F>(
        &self,
        hash: &str,
        style_count: usize,
        theme_count_for: F,
    ) -> (usize, usize)
    where
        F: FnOnce(usize) -> usize,
    {
        if let Some(indices) = self.derivations.get(hash) {
            return *indices;
        }

        let indices = derive(hash, style_count, theme_count_for);
        *self
            .derivations
            .entry(hash.to_string())
            .or_insert(indices)
    }

    /// Number of memoized derivations.
    pub fn derivation_count(&self) -> usize {
        self.derivations.len()
    }

    // == Monitor ==
    /// Returns this cache's monitor, creating it if no handle is alive.
    ///
    /// All handles share one controller, so at most one control loop runs
    /// per cache.
    pub fn monitor(&self) -> Monitor {
        Monitor::attach(self, &self.monitor)
    }

    /// Returns this cache's monitor, started if monitoring is enabled.
    ///
    /// Calling it again while the loop runs hands back the same monitor
    /// without spawning a second loop. Must be called within a Tokio runtime.
    pub async fn spawn_monitor(&self) -> Monitor {
        let monitor = self.monitor();
        monitor.start().await;
        monitor
    }
}

fn derive<F>(hash: &str, style_count: usize, theme_count_for: F) -> (usize, usize)
where
    F: FnOnce(usize) -> usize,
{
    if style_count == 0 {
        return (0, 0);
    }
    let n = digits_to_number(hash);
    let style = (n % style_count as u64) as usize;
    let theme_count = theme_count_for(style);
    if theme_count == 0 {
        return (style, 0);
    }
    (style, (n % theme_count as u64) as usize)
}

fn digits_to_number(hash: &str) -> u64 {
    hash.bytes()
        .filter(u8::is_ascii_digit)
        .fold(0u64, |n, d| n.wrapping_mul(10).wrapping_add(u64::from(d - b'0')))
}
