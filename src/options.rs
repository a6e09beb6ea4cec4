// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::array::MAX_DYNAMIC_TYPES_LIMIT;
use crate::error::{ColumnError, ColumnResult};

/// Settings of the tagged binary value codec.
///
/// Created once by the owner of the columns and handed to every decode call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatSettings {
    /// Maximum depth of nested lists accepted by the decoder.
    pub max_nesting_depth: usize,

    /// Maximum length (in bytes) of a single string or blob accepted by the decoder.
    pub max_value_size: usize,
}

impl Default for FormatSettings {
    fn default() -> Self {
        Self {
            max_nesting_depth: 64,
            max_value_size: 1 << 30, // 1GB
        }
    }
}

impl FormatSettings {
    /// No limits. Used to decode values a column encoded itself, which are read back whatever
    /// the settings of the column are.
    pub const UNLIMITED: Self = Self {
        max_nesting_depth: usize::MAX,
        max_value_size: usize::MAX,
    };
}

/// Options for `ObjectArray`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectOptions {
    /// Number of paths that may get their own dynamic column.
    pub max_dynamic_paths: usize,

    /// Number of distinct value types a dynamic column keeps in typed variants.
    pub max_dynamic_types: usize,

    /// Codec settings used for dynamic values and shared data.
    pub format: FormatSettings,
}

impl Default for ObjectOptions {
    fn default() -> Self {
        Self {
            max_dynamic_paths: 1024,
            max_dynamic_types: 32,
            format: FormatSettings::default(),
        }
    }
}

impl ObjectOptions {
    pub fn new(max_dynamic_paths: usize, max_dynamic_types: usize) -> Self {
        Self {
            max_dynamic_paths,
            max_dynamic_types,
            format: FormatSettings::default(),
        }
    }

    pub fn default_for_test() -> Self {
        Self {
            max_dynamic_paths: 4,
            max_dynamic_types: 2,
            format: FormatSettings {
                max_nesting_depth: 8,
                max_value_size: 1 << 20, // 1MB
            },
        }
    }

    /// Check that the options can be used to build a column.
    pub fn validate(&self) -> ColumnResult<()> {
        if self.max_dynamic_types > MAX_DYNAMIC_TYPES_LIMIT {
            return Err(ColumnError::logical(format!(
                "max_dynamic_types ({}) exceeds the limit ({})",
                self.max_dynamic_types, MAX_DYNAMIC_TYPES_LIMIT
            )));
        }
        if self.max_dynamic_paths == 0 {
            warn!("max_dynamic_paths is 0, every untyped path will be stored in shared data");
        }
        Ok(())
    }
}
