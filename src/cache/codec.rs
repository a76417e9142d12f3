//! Compression Codec Module
//!
//! Stateless helpers that shrink a payload before storage and restore it on
//! read. Nothing here touches shared state, so callers run it outside the
//! store lock.

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::cache::options::{CompressionOptions, MAX_COMPRESSION_LEVEL};
use crate::error::{CacheError, Result};

/// Payloads shorter than this are not worth optimizing.
pub const OPTIMIZE_MIN_LEN: usize = 100;

const COMMENT_OPEN: &str = "<!--";
const COMMENT_CLOSE: &str = "-->";
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

// == Optimize ==
/// Strips comments and collapses redundant whitespace in markup.
///
/// Whitespace inside a quoted attribute value is kept verbatim. Runs of
/// whitespace inside a tag become a single space; between tags, a run that
/// directly follows `>` is dropped and any other run becomes a single space.
pub fn optimize(text: &str) -> String {
    if text.len() < OPTIMIZE_MIN_LEN {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    let mut in_tag = false;
    let mut quote: Option<char> = None;
    let mut pending_space = false;
    let mut after_close = false;

    while let Some(c) = rest.chars().next() {
        if quote.is_none() && rest.starts_with(COMMENT_OPEN) {
            rest = match rest[COMMENT_OPEN.len()..].find(COMMENT_CLOSE) {
                Some(end) => &rest[COMMENT_OPEN.len() + end + COMMENT_CLOSE.len()..],
                None => "",
            };
            continue;
        }
        rest = &rest[c.len_utf8()..];

        if let Some(q) = quote {
            out.push(c);
            if c == q {
                quote = None;
            }
            continue;
        }

        if c.is_ascii_whitespace() {
            pending_space = in_tag || !after_close;
            continue;
        }

        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        after_close = false;

        match c {
            '<' => in_tag = true,
            '>' => {
                in_tag = false;
                after_close = true;
            }
            '"' | '\'' if in_tag => quote = Some(c),
            _ => {}
        }
        out.push(c);
    }

    out
}

// == Compress ==
/// Gzip-compresses `text` when it is large enough and the result is worth it.
///
/// Returns the compressed bytes and `true`, or the original bytes and
/// `false` when compression is disabled, the input is below the size
/// threshold, the ratio is not strictly below the configured threshold, or
/// the encoder fails.
pub fn compress(text: &str, options: &CompressionOptions) -> (Vec<u8>, bool) {
    if !options.enabled || text.len() < options.min_size_bytes || text.is_empty() {
        return (text.as_bytes().to_vec(), false);
    }

    let compressed = match gzip(text.as_bytes(), level(options.level)) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::debug!("Compression failed, storing uncompressed: {}", e);
            return (text.as_bytes().to_vec(), false);
        }
    };

    let ratio = compressed.len() as f64 / text.len() as f64;
    if ratio < options.ratio_threshold {
        (compressed, true)
    } else {
        (text.as_bytes().to_vec(), false)
    }
}

fn gzip(bytes: &[u8], level: Compression) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(bytes.len() / 2), level);
    encoder.write_all(bytes)?;
    encoder.finish()
}

fn level(level: i32) -> Compression {
    if level < 0 {
        Compression::default()
    } else {
        Compression::new(level.min(MAX_COMPRESSION_LEVEL) as u32)
    }
}

// == Decompress ==
/// Restores text produced by [`compress`].
///
/// Bytes that were never compressed, or that do not start with the gzip
/// magic, are returned as text unchanged.
pub fn decompress(bytes: &[u8], was_compressed: bool) -> Result<String> {
    if !was_compressed || !is_gzip(bytes) {
        return Ok(String::from_utf8_lossy(bytes).into_owned());
    }

    let mut decoder = GzDecoder::new(bytes);
    let mut raw = Vec::with_capacity(bytes.len() * 4);
    decoder.read_to_end(&mut raw)?;
    String::from_utf8(raw).map_err(|e| CacheError::Decompression(e.to_string()))
}

fn is_gzip(bytes: &[u8]) -> bool {
    bytes.len() > GZIP_MAGIC.len() && bytes.starts_with(&GZIP_MAGIC)
}
