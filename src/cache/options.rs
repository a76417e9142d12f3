//! Cache Options Module
//!
//! Mutable configuration for the store, the codec and the monitor.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CacheError, Result};

/// Highest compression level accepted by the gzip encoder.
pub const MAX_COMPRESSION_LEVEL: i32 = 9;

/// Longest accepted monitor sample or adjust interval (one year).
pub const MAX_MONITOR_INTERVAL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

// == Eviction Policy ==
/// Which item leaves the store when it is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvictionPolicy {
    /// Least recently used: hits move a key to the front
    #[default]
    Lru,
    /// First in, first out: hits never reorder
    Fifo,
}

impl fmt::Display for EvictionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvictionPolicy::Lru => write!(f, "lru"),
            EvictionPolicy::Fifo => write!(f, "fifo"),
        }
    }
}

impl FromStr for EvictionPolicy {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lru" => Ok(EvictionPolicy::Lru),
            "fifo" => Ok(EvictionPolicy::Fifo),
            other => Err(CacheError::InvalidConfig(format!(
                "unknown eviction policy '{}', expected 'lru' or 'fifo'",
                other
            ))),
        }
    }
}

// == Compression Options ==
/// Controls when payloads are gzip-compressed before storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionOptions {
    pub enabled: bool,
    /// gzip level 0-9, negative selects the encoder default
    pub level: i32,
    /// Payloads shorter than this are stored as-is
    pub min_size_bytes: usize,
    /// Compressed/original ratio must be strictly below this to be kept
    pub ratio_threshold: f64,
}

impl Default for CompressionOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            level: 9,
            min_size_bytes: 1024,
            ratio_threshold: 0.8,
        }
    }
}

// == Monitor Options ==
/// Tuning parameters for the background monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorOptions {
    pub enabled: bool,
    /// How often a statistics sample is recorded
    pub sample_interval: Duration,
    /// How often capacity and expiration are retuned
    pub adjust_interval: Duration,
    /// Lower bound for the tuned size
    pub min_size: usize,
    /// Upper bound for the tuned size
    pub max_size: usize,
    pub target_hit_rate: f64,
    pub growth_factor: f64,
    pub shrink_factor: f64,
    pub expiration_factor: f64,
}

impl Default for MonitorOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            sample_interval: Duration::from_secs(60),
            adjust_interval: Duration::from_secs(600),
            min_size: 50,
            max_size: 1000,
            target_hit_rate: 0.8,
            growth_factor: 1.2,
            shrink_factor: 0.8,
            expiration_factor: 1.5,
        }
    }
}

// == Cache Options ==
/// Complete cache configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheOptions {
    pub enabled: bool,
    /// Maximum number of items, 0 = unbounded
    pub max_size: usize,
    /// Item lifetime measured from its last write, ZERO = never expires
    pub expiration: Duration,
    pub eviction_policy: EvictionPolicy,
    pub compression: CompressionOptions,
    pub monitoring: MonitorOptions,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            max_size: 100,
            expiration: Duration::from_secs(3600),
            eviction_policy: EvictionPolicy::Lru,
            compression: CompressionOptions::default(),
            monitoring: MonitorOptions::default(),
        }
    }
}

impl CacheOptions {
    // == Validate ==
    /// Rejects values that the codec or the monitor cannot work with.
    ///
    /// A `max_size` below the current occupancy is not an error: the store
    /// evicts down to it instead.
    pub fn validate(&self) -> Result<()> {
        let c = &self.compression;
        if c.level > MAX_COMPRESSION_LEVEL {
            return Err(invalid(format!(
                "compression level {} exceeds {}",
                c.level, MAX_COMPRESSION_LEVEL
            )));
        }
        if !c.ratio_threshold.is_finite() || c.ratio_threshold <= 0.0 {
            return Err(invalid(format!(
                "compression ratio threshold must be positive, got {}",
                c.ratio_threshold
            )));
        }

        let m = &self.monitoring;
        if !m.enabled {
            return Ok(());
        }
        if m.sample_interval.is_zero() || m.adjust_interval.is_zero() {
            return Err(invalid("monitor intervals must be non-zero".to_string()));
        }
        if m.sample_interval > MAX_MONITOR_INTERVAL || m.adjust_interval > MAX_MONITOR_INTERVAL {
            return Err(invalid(format!(
                "monitor intervals must not exceed {}s",
                MAX_MONITOR_INTERVAL.as_secs()
            )));
        }
        if m.min_size > m.max_size {
            return Err(invalid(format!(
                "monitor min_size {} exceeds max_size {}",
                m.min_size, m.max_size
            )));
        }
        if !(0.0..=1.0).contains(&m.target_hit_rate) {
            return Err(invalid(format!(
                "target hit rate must be within [0, 1], got {}",
                m.target_hit_rate
            )));
        }
        if !m.growth_factor.is_finite() || m.growth_factor < 1.0 {
            return Err(invalid(format!(
                "growth factor must be >= 1, got {}",
                m.growth_factor
            )));
        }
        if !m.shrink_factor.is_finite() || m.shrink_factor <= 0.0 || m.shrink_factor > 1.0 {
            return Err(invalid(format!(
                "shrink factor must be within (0, 1], got {}",
                m.shrink_factor
            )));
        }
        if !m.expiration_factor.is_finite() || m.expiration_factor < 1.0 {
            return Err(invalid(format!(
                "expiration factor must be >= 1, got {}",
                m.expiration_factor
            )));
        }
        Ok(())
    }
}

fn invalid(msg: String) -> CacheError {
    CacheError::InvalidConfig(msg)
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = CacheOptions::default();
        assert!(opts.enabled);
        assert_eq!(opts.max_size, 100);
        assert_eq!(opts.expiration, Duration::from_secs(3600));
        assert_eq!(opts.eviction_policy, EvictionPolicy::Lru);
        assert_eq!(opts.compression.level, 9);
        assert_eq!(opts.compression.min_size_bytes, 1024);
        assert_eq!(opts.monitoring.min_size, 50);
        assert_eq!(opts.monitoring.max_size, 1000);
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!("lru".parse::<EvictionPolicy>().unwrap(), EvictionPolicy::Lru);
        assert_eq!(" FIFO ".parse::<EvictionPolicy>().unwrap(), EvictionPolicy::Fifo);
        assert!(matches!(
            "random".parse::<EvictionPolicy>(),
            Err(CacheError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_policy_serde() {
        let json = serde_json::to_string(&EvictionPolicy::Fifo).unwrap();
        assert_eq!(json, "\"fifo\"");
        assert!(serde_json::from_str::<EvictionPolicy>("\"mru\"").is_err());
    }

    #[test]
    fn test_options_deserialize_partial() {
        let opts: CacheOptions =
            serde_json::from_str(r#"{"max_size": 5, "eviction_policy": "fifo"}"#).unwrap();
        assert_eq!(opts.max_size, 5);
        assert_eq!(opts.eviction_policy, EvictionPolicy::Fifo);
        assert_eq!(opts.compression, CompressionOptions::default());
    }

    #[test]
    fn test_validate_rejects_bad_monitor_values() {
        let mut opts = CacheOptions::default();
        opts.monitoring.min_size = 2000;
        assert!(opts.validate().is_err());

        let mut opts = CacheOptions::default();
        opts.monitoring.sample_interval = Duration::ZERO;
        assert!(opts.validate().is_err());

        let mut opts = CacheOptions::default();
        opts.monitoring.shrink_factor = 1.5;
        assert!(opts.validate().is_err());

        let mut opts = CacheOptions::default();
        opts.monitoring.growth_factor = f64::NAN;
        assert!(opts.validate().is_err());
    }

    #[test]
    fn test_validate_caps_monitor_intervals() {
        let mut opts = CacheOptions::default();
        opts.monitoring.sample_interval = Duration::from_secs(u64::MAX);
        assert!(matches!(opts.validate(), Err(CacheError::InvalidConfig(_))));

        let mut opts = CacheOptions::default();
        opts.monitoring.adjust_interval = MAX_MONITOR_INTERVAL + Duration::from_secs(1);
        assert!(opts.validate().is_err());

        opts.monitoring.adjust_interval = MAX_MONITOR_INTERVAL;
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn test_validate_skips_disabled_monitor() {
        let mut opts = CacheOptions::default();
        opts.monitoring.enabled = false;
        opts.monitoring.sample_interval = Duration::ZERO;
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_compression() {
        let mut opts = CacheOptions::default();
        opts.compression.level = 12;
        assert!(opts.validate().is_err());

        let mut opts = CacheOptions::default();
        opts.compression.ratio_threshold = 0.0;
        assert!(opts.validate().is_err());
    }
}
