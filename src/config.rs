//! Configuration Module
//!
//! Handles loading the cache and workload configuration from environment
//! variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::{CacheOptions, EvictionPolicy};
use crate::error::Result;

/// Runtime configuration parameters.
///
/// All values can be configured via environment variables with sensible
/// defaults. Monitor tuning factors are not exposed here and keep their
/// defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Whether the cache stores anything at all
    pub cache_enabled: bool,
    /// Maximum number of items, 0 for unbounded
    pub max_size: usize,
    /// Item lifetime in seconds, 0 for no expiry
    pub expiration_secs: u64,
    /// Which item is evicted when the cache is full
    pub eviction_policy: EvictionPolicy,
    /// Whether large payloads are gzip-compressed
    pub compression_enabled: bool,
    /// Gzip level, negative for the library default
    pub compression_level: i32,
    /// Payloads shorter than this are stored as-is
    pub compression_min_size: usize,
    /// Whether the self-tuning monitor runs
    pub monitor_enabled: bool,
    /// Seconds between monitor samples
    pub monitor_sample_secs: u64,
    /// Seconds between monitor adjustments
    pub monitor_adjust_secs: u64,
    /// Expiry sweeper interval in seconds
    pub sweep_interval_secs: u64,
    /// Number of distinct avatar keys the demo workload draws from
    pub workload_keys: usize,
    /// Milliseconds between demo workload requests
    pub workload_tick_ms: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_ENABLED` - Enable the cache (default: true)
    /// - `CACHE_MAX_SIZE` - Maximum items (default: 100)
    /// - `CACHE_EXPIRATION_SECS` - Item lifetime (default: 3600)
    /// - `CACHE_EVICTION_POLICY` - `lru` or `fifo` (default: lru)
    /// - `CACHE_COMPRESSION_ENABLED` - Enable gzip (default: true)
    /// - `CACHE_COMPRESSION_LEVEL` - Gzip level 0-9 (default: 9)
    /// - `CACHE_COMPRESSION_MIN_SIZE` - Compression threshold in bytes (default: 1024)
    /// - `MONITOR_ENABLED` - Run the monitor (default: true)
    /// - `MONITOR_SAMPLE_SECS` - Sample interval (default: 60)
    /// - `MONITOR_ADJUST_SECS` - Adjust interval (default: 600)
    /// - `SWEEP_INTERVAL_SECS` - Expiry sweep interval (default: 30)
    /// - `WORKLOAD_KEYS` - Demo workload key space (default: 150)
    /// - `WORKLOAD_TICK_MS` - Demo workload request interval (default: 100)
    ///
    /// Unparsable numbers and booleans fall back to their defaults. An
    /// unknown eviction policy is an error.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds a Config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let eviction_policy = match lookup("CACHE_EVICTION_POLICY") {
            Some(raw) => EvictionPolicy::from_str(&raw)?,
            None => defaults.eviction_policy,
        };

        Ok(Self {
            cache_enabled: parse_var(&lookup, "CACHE_ENABLED").unwrap_or(defaults.cache_enabled),
            max_size: parse_var(&lookup, "CACHE_MAX_SIZE").unwrap_or(defaults.max_size),
            expiration_secs: parse_var(&lookup, "CACHE_EXPIRATION_SECS")
                .unwrap_or(defaults.expiration_secs),
            eviction_policy,
            compression_enabled: parse_var(&lookup, "CACHE_COMPRESSION_ENABLED")
                .unwrap_or(defaults.compression_enabled),
            compression_level: parse_var(&lookup, "CACHE_COMPRESSION_LEVEL")
                .unwrap_or(defaults.compression_level),
            compression_min_size: parse_var(&lookup, "CACHE_COMPRESSION_MIN_SIZE")
                .unwrap_or(defaults.compression_min_size),
            monitor_enabled: parse_var(&lookup, "MONITOR_ENABLED")
                .unwrap_or(defaults.monitor_enabled),
            monitor_sample_secs: parse_var(&lookup, "MONITOR_SAMPLE_SECS")
                .unwrap_or(defaults.monitor_sample_secs),
            monitor_adjust_secs: parse_var(&lookup, "MONITOR_ADJUST_SECS")
                .unwrap_or(defaults.monitor_adjust_secs),
            sweep_interval_secs: parse_var(&lookup, "SWEEP_INTERVAL_SECS")
                .unwrap_or(defaults.sweep_interval_secs),
            workload_keys: parse_var(&lookup, "WORKLOAD_KEYS").unwrap_or(defaults.workload_keys),
            workload_tick_ms: parse_var(&lookup, "WORKLOAD_TICK_MS")
                .unwrap_or(defaults.workload_tick_ms),
        })
    }

    /// Builds cache options from this config, validated.
    pub fn cache_options(&self) -> Result<CacheOptions> {
        let mut options = CacheOptions {
            enabled: self.cache_enabled,
            max_size: self.max_size,
            expiration: Duration::from_secs(self.expiration_secs),
            eviction_policy: self.eviction_policy,
            ..CacheOptions::default()
        };
        options.compression.enabled = self.compression_enabled;
        options.compression.level = self.compression_level;
        options.compression.min_size_bytes = self.compression_min_size;
        options.monitoring.enabled = self.monitor_enabled;
        options.monitoring.sample_interval = Duration::from_secs(self.monitor_sample_secs);
        options.monitoring.adjust_interval = Duration::from_secs(self.monitor_adjust_secs);

        options.validate()?;
        Ok(options)
    }

    /// Interval between expiry sweeps.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Delay between demo workload requests.
    pub fn workload_tick(&self) -> Duration {
        Duration::from_millis(self.workload_tick_ms)
    }
}

/// Reads and parses one variable; absent or unparsable values give None.
fn parse_var<T, F>(lookup: &F, name: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(name).and_then(|v| v.trim().parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        let options = CacheOptions::default();
        Self {
            cache_enabled: options.enabled,
            max_size: options.max_size,
            expiration_secs: options.expiration.as_secs(),
            eviction_policy: options.eviction_policy,
            compression_enabled: options.compression.enabled,
            compression_level: options.compression.level,
            compression_min_size: options.compression.min_size_bytes,
            monitor_enabled: options.monitoring.enabled,
            monitor_sample_secs: options.monitoring.sample_interval.as_secs(),
            monitor_adjust_secs: options.monitoring.adjust_interval.as_secs(),
            sweep_interval_secs: 30,
            workload_keys: 150,
            workload_tick_ms: 100,
        }
    }
}
