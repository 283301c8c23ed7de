//! Store configuration

use crate::core::error::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Initial size of the reusable scratch buffer in bytes
pub const DEFAULT_BUFFER_CAPACITY: usize = 20_000;

/// Default scratch file name prefix
pub const DEFAULT_FILE_PREFIX: &str = "scanstore";

/// Scratch store settings
///
/// Every field has a default, so a partial TOML document is valid:
///
/// ```toml
/// scratch_dir = "/var/tmp/scans"
/// initial_buffer_capacity = 65536
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory for the scratch file (system temp dir when unset)
    pub scratch_dir: Option<PathBuf>,

    /// Scratch file name prefix
    pub file_prefix: String,

    /// Initial scratch buffer capacity in bytes
    pub initial_buffer_capacity: usize,

    /// Take an exclusive OS-level advisory lock on the scratch file
    pub lock_scratch_file: bool,
}

impl StoreConfig {
    /// Parse a configuration from a TOML document
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            scratch_dir: None,
            file_prefix: DEFAULT_FILE_PREFIX.to_string(),
            initial_buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            lock_scratch_file: true,
        }
    }
}
