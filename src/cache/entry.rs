//! Cache Item Module
//!
//! Defines the stored payload and the timestamps used for expiry.

use std::time::{Duration, Instant};

use tracing::warn;

use crate::cache::codec;
use crate::cache::options::CompressionOptions;

// == Payload ==
/// Stored representation of an item's content.
///
/// Exactly one form is authoritative for storage accounting.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Content kept as-is
    Plain(String),
    /// Gzip-compressed (and optimized) content
    Compressed(Vec<u8>),
}

impl Payload {
    // == Encode ==
    /// Optimizes and compresses `content` when that pays off.
    ///
    /// The optimized form is only kept when it ends up compressed; otherwise
    /// the original content is stored untouched.
    pub fn encode(content: String, options: &CompressionOptions) -> Self {
        if !options.enabled {
            return Payload::Plain(content);
        }

        let optimized = codec::optimize(&content);
        match codec::compress(&optimized, options) {
            (bytes, true) => Payload::Compressed(bytes),
            (_, false) => Payload::Plain(content),
        }
    }

    // == Decode ==
    /// Returns the content, decompressing if needed.
    ///
    /// A corrupt stream is logged and the raw bytes are returned lossily
    /// instead of failing the read.
    pub fn decode(&self) -> String {
        match self {
            Payload::Plain(content) => content.clone(),
            Payload::Compressed(bytes) => match codec::decompress(bytes, true) {
                Ok(content) => content,
                Err(e) => {
                    warn!("Returning raw stored bytes after decode failure: {}", e);
                    String::from_utf8_lossy(bytes).into_owned()
                }
            },
        }
    }

    /// Whether the stored form is gzip.
    pub fn is_compressed(&self) -> bool {
        matches!(self, Payload::Compressed(_))
    }

    /// Bytes this payload occupies in the store.
    pub fn stored_len(&self) -> usize {
        match self {
            Payload::Plain(content) => content.len(),
            Payload::Compressed(bytes) => bytes.len(),
        }
    }
}

// == Cache Item ==
/// A single stored item with its timestamps.
#[derive(Debug, Clone)]
pub struct CacheItem {
    pub payload: Payload,
    /// Time of the last write; expiry is measured from here
    pub created_at: Instant,
    /// Time of the last write or LRU hit
    pub last_used_at: Instant,
}

impl CacheItem {
    // == Constructor ==
    /// Wraps a payload, stamping both timestamps with now.
    pub fn new(payload: Payload) -> Self {
        let now = Instant::now();
        Self {
            payload,
            created_at: now,
            last_used_at: now,
        }
    }

    /// Replaces the payload and restarts both clocks.
    pub fn refresh(&mut self, payload: Payload) {
        let now = Instant::now();
        self.payload = payload;
        self.created_at = now;
        self.last_used_at = now;
    }

    /// Records a read. Does not move the expiry clock.
    pub fn mark_used(&mut self) {
        self.last_used_at = Instant::now();
    }

    // == Is Expired ==
    /// Checks whether more than `expiration` has passed since the last write.
    ///
    /// A zero expiration never expires.
    pub fn is_expired(&self, expiration: Duration) -> bool {
        !expiration.is_zero() && self.created_at.elapsed() > expiration
    }

    /// Whether the stored form is gzip.
    pub fn is_compressed(&self) -> bool {
        self.payload.is_compressed()
    }

    /// Bytes this item accounts for in memory usage.
    pub fn stored_len(&self) -> usize {
        self.payload.stored_len()
    }
}
