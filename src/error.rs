//! Error types for the avatar cache
//!
//! Provides unified error handling using thiserror. Lookups never fail: a
//! missing or expired key is a plain miss, so these variants only cover
//! malformed input and configuration.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the avatar cache.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CacheError {
    /// Textual cache key could not be parsed
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Options would leave the cache in an unusable state
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Stored payload is not a valid compressed stream
    #[error("Decompression failed: {0}")]
    Decompression(String),
}

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        CacheError::Decompression(err.to_string())
    }
}

// == Result Type Alias ==
/// Convenience Result type for the avatar cache.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CacheError::InvalidKey("abc".to_string());
        assert_eq!(err.to_string(), "Invalid key: abc");

        let err = CacheError::InvalidConfig("max_size".to_string());
        assert_eq!(err.to_string(), "Invalid configuration: max_size");
    }

    #[test]
    fn test_io_error_maps_to_decompression() {
        let io = std::io::Error::new(std::io::ErrorKind::InvalidData, "corrupt deflate stream");
        let err: CacheError = io.into();
        assert!(matches!(err, CacheError::Decompression(msg) if msg.contains("corrupt")));
    }
}
