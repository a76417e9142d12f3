//! Cache Key Module
//!
//! Composite key identifying one rendered avatar variant.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CacheError, Result};

/// Separator used by the textual key encoding.
const KEY_SEPARATOR: char = '_';

// == Cache Key ==
/// Identifies a cached avatar by id, background flag, theme and part.
///
/// Two keys are equal iff every field is equal. The textual form is
/// `id_excludeBackground_themeIndex_partIndex`, e.g. `alice_false_2_0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    /// Avatar identifier supplied by the caller
    pub id: String,
    /// Whether the background layer was left out
    pub exclude_background: bool,
    /// Selected theme
    pub theme_index: i32,
    /// Selected style part
    pub part_index: i32,
}

impl CacheKey {
    // == Constructor ==
    /// Builds a key from its four components.
    pub fn new(
        id: impl Into<String>,
        exclude_background: bool,
        theme_index: i32,
        part_index: i32,
    ) -> Self {
        Self {
            id: id.into(),
            exclude_background,
            theme_index,
            part_index,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{sep}{}{sep}{}{sep}{}",
            self.id,
            self.exclude_background,
            self.theme_index,
            self.part_index,
            sep = KEY_SEPARATOR
        )
    }
}

// == Parsing ==
impl FromStr for CacheKey {
    type Err = CacheError;

    /// Parses the textual encoding back into a key.
    ///
    /// Exactly four fields are required, so ids containing the separator
    /// cannot be addressed this way.
    fn from_str(s: &str) -> Result<Self> {
        let fields: Vec<&str> = s.split(KEY_SEPARATOR).collect();
        let [id, exclude_background, theme_index, part_index] = fields.as_slice() else {
            return Err(CacheError::InvalidKey(format!(
                "expected 4 '{}'-delimited fields in '{}', found {}",
                KEY_SEPARATOR,
                s,
                fields.len()
            )));
        };

        if id.is_empty() {
            return Err(CacheError::InvalidKey(format!("empty id in '{}'", s)));
        }

        let exclude_background = match *exclude_background {
            "true" => true,
            "false" => false,
            other => {
                return Err(CacheError::InvalidKey(format!(
                    "background flag must be 'true' or 'false', got '{}'",
                    other
                )))
            }
        };

        let theme_index = theme_index
            .parse()
            .map_err(|e| CacheError::InvalidKey(format!("theme index '{}': {}", theme_index, e)))?;
        let part_index = part_index
            .parse()
            .map_err(|e| CacheError::InvalidKey(format!("part index '{}': {}", part_index, e)))?;

        Ok(Self {
            id: id.to_string(),
            exclude_background,
            theme_index,
            part_index,
        })
    }
}
