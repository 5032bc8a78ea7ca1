//! # Config - region settings
//!
//! Every setting can come from the environment, following the shell's
//! `REGIONKV_*` convention:
//!
//! ```text
//! REGIONKV_DATA_DIR    PFile directory                (default: "data/region")
//! REGIONKV_FLUSH_KB    Flush threshold in KiB         (default: 1024 = 1 MiB)
//! REGIONKV_ROW_GROUP   Rows per PFile row group       (default: 1024)
//! REGIONKV_AUTO_FLUSH  Flush when over the threshold  (default: "true")
//! ```
//!
//! Unlike a silent `unwrap_or(default)`, a value that is present but does not
//! parse is an error.

use std::path::PathBuf;
use thiserror::Error;

pub const ENV_DATA_DIR: &str = "REGIONKV_DATA_DIR";
pub const ENV_FLUSH_KB: &str = "REGIONKV_FLUSH_KB";
pub const ENV_ROW_GROUP: &str = "REGIONKV_ROW_GROUP";
pub const ENV_AUTO_FLUSH: &str = "REGIONKV_AUTO_FLUSH";

pub const DEFAULT_DATA_DIR: &str = "data/region";
/// 1 MiB.
pub const DEFAULT_FLUSH_THRESHOLD: usize = 1024 * 1024;
pub const DEFAULT_ROW_GROUP_SIZE: usize = 1024;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var}: invalid value {value:?} ({reason})")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Settings for one region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionConfig {
    /// Directory holding the region's PFiles.
    pub data_dir: PathBuf,
    /// Live memtable size in bytes that triggers an automatic flush.
    pub flush_threshold: usize,
    /// Rows per row group in flushed files.
    pub row_group_size: usize,
    /// Flush from `put`/`delete` once `flush_threshold` is reached.
    pub auto_flush: bool,
}

impl RegionConfig {
    /// Defaults for everything except the directory.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
            row_group_size: DEFAULT_ROW_GROUP_SIZE,
            auto_flush: true,
        }
    }

    #[must_use]
    pub fn with_flush_threshold(mut self, bytes: usize) -> Self {
        self.flush_threshold = bytes;
        self
    }

    #[must_use]
    pub fn with_row_group_size(mut self, rows: usize) -> Self {
        self.row_group_size = rows;
        self
    }

    #[must_use]
    pub fn with_auto_flush(mut self, enabled: bool) -> Self {
        self.auto_flush = enabled;
        self
    }

    /// Reads the `REGIONKV_*` variables from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for a variable that is set but does
    /// not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from `lookup`, which maps a variable name to its
    /// value. Missing variables take their default.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let data_dir = lookup(ENV_DATA_DIR).unwrap_or_else(|| DEFAULT_DATA_DIR.to_string());
        let mut config = Self::new(data_dir);

        if let Some(raw) = lookup(ENV_FLUSH_KB) {
            let kb = parse_usize(ENV_FLUSH_KB, &raw)?;
            config.flush_threshold = kb.checked_mul(1024).ok_or_else(|| ConfigError::Invalid {
                var: ENV_FLUSH_KB,
                value: raw.clone(),
                reason: "overflows usize".to_string(),
            })?;
        }
        if let Some(raw) = lookup(ENV_ROW_GROUP) {
            let rows = parse_usize(ENV_ROW_GROUP, &raw)?;
            if rows == 0 {
                return Err(ConfigError::Invalid {
                    var: ENV_ROW_GROUP,
                    value: raw,
                    reason: "must be at least 1".to_string(),
                });
            }
            config.row_group_size = rows;
        }
        if let Some(raw) = lookup(ENV_AUTO_FLUSH) {
            config.auto_flush = parse_bool(ENV_AUTO_FLUSH, &raw)?;
        }
        Ok(config)
    }

    /// Flush threshold in KiB, for display.
    #[must_use]
    pub fn flush_threshold_kb(&self) -> usize {
        self.flush_threshold / 1024
    }
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self::new(DEFAULT_DATA_DIR)
    }
}

fn parse_usize(var: &'static str, raw: &str) -> Result<usize, ConfigError> {
    raw.trim().parse().map_err(|e: std::num::ParseIntError| ConfigError::Invalid {
        var,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

fn parse_bool(var: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            var,
            value: raw.to_string(),
            reason: "expected true or false".to_string(),
        }),
    }
}
