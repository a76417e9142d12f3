//! Cache Module
//!
//! Provides a bounded in-memory cache with LRU/FIFO eviction, time-based
//! expiry and gzip compression of large payloads.

pub mod codec;
mod entry;
mod key;
mod options;
mod order;
mod shared;
mod stats;
mod store;


// Re-export public types
pub use entry::{CacheItem, Payload};
pub use key::CacheKey;
pub use options::{
    CacheOptions, CompressionOptions, EvictionPolicy, MonitorOptions, MAX_COMPRESSION_LEVEL,
    MAX_MONITOR_INTERVAL,
};
pub use order::EvictionOrder;
pub use shared::{Cache, DERIVATION_SHARDS};
pub use stats::CacheStats;
pub use store::CacheStore;
