//! Avatar Cache - A self-tuning in-memory cache for generated avatars
//!
//! Provides bounded storage with LRU/FIFO eviction, expiry, gzip compression
//! of large payloads and a background monitor that retunes size and expiry
//! from observed hit rates.

pub mod cache;
pub mod config;
pub mod error;
pub mod tasks;

pub use cache::{Cache, CacheKey, CacheOptions, CacheStats, EvictionPolicy};
pub use config::Config;
pub use error::{CacheError, Result};
pub use tasks::{spawn_expiry_sweeper, Monitor};
