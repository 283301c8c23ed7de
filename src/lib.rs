//! # Scanstore - Scratch Storage for Scan Data Points
//!
//! `scanstore` keeps the data points of large scan collections on disk while
//! their metadata stays in memory:
//!
//! - **Append-only scratch file** holding fixed-width `(coordinate, intensity)` records
//! - **In-memory index** from storage ID to byte range; deletion is logical only
//! - **Scan index** keyed by scan number, filterable by resolution level and time
//! - **Cached aggregates**: max intensity, max total signal, coordinate and time ranges
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scanstore::{DataPoint, ScanRecord, Session, Result};
//!
//! # fn main() -> Result<()> {
//! let session = Session::new("run-01");
//!
//! // The scratch file is created on the first write
//! session.add_scan(ScanRecord::new(
//!     1,
//!     1,
//!     0.25,
//!     vec![DataPoint::new(100.0, 10.0), DataPoint::new(100.5, 20.0)],
//! ))?;
//!
//! let points = session.scan_data_points(1)?;
//! let base_peak = session.max_intensity(1);
//!
//! // Deletes the scratch file
//! session.close();
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration
//!
//! ```rust,no_run
//! use scanstore::{SessionBuilder, StoreConfig, Result};
//!
//! # fn main() -> Result<()> {
//! let config = StoreConfig::from_toml_str(r#"scratch_dir = "/var/tmp/scans""#)?;
//! let session = SessionBuilder::new()
//!     .name("run-02")
//!     .config(config)
//!     .build();
//! # Ok(())
//! # }
//! ```
//!
//! ## Scratch File Layout
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │ record 1: count₁ × [f32 mz][f32 int]     │  <- offsets[1]
//! ├──────────────────────────────────────────┤
//! │ record 2: count₂ × [f32 mz][f32 int]     │  <- offsets[2]
//! ├──────────────────────────────────────────┤
//! │ ... (deleted records stay until close)   │
//! └──────────────────────────────────────────┘
//! ```
//!
//! Floats are big-endian. There are no headers or length prefixes, so the
//! file can only be read together with the index from [`Session::snapshot`].

pub mod core;

pub use crate::core::{
    config::StoreConfig,
    error::{Result, ScanStoreError},
    index::{ScanFilter, ScanIndex},
    scan::{
        DataPoint, Level, Range, ScanHandle, ScanNumber, ScanRecord, ScanSummary, ALL_LEVELS,
    },
    session::{Session, SessionSnapshot},
    stats::{AggregateCache, NO_DATA},
    store::{ScratchStore, StorageId, StoreSnapshot},
};

use std::path::PathBuf;
use tracing::{debug, info};

/// Builder for customizing Session creation
///
/// # Examples
///
/// ```rust,no_run
/// use scanstore::SessionBuilder;
///
/// let session = SessionBuilder::new()
///     .name("run-01")
///     .scratch_dir("/data/scratch")
///     .build();
/// ```
pub struct SessionBuilder {
    name: Option<String>,
    scratch_dir: Option<PathBuf>,
    config: StoreConfig,
}

impl SessionBuilder {
    /// Create a new SessionBuilder with default settings
    pub fn new() -> Self {
        SessionBuilder {
            name: None,
            scratch_dir: None,
            config: StoreConfig::default(),
        }
    }

    /// Set the session display name
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Directory for the scratch file; overrides the config's `scratch_dir`
    pub fn scratch_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    /// Replace the whole store configuration
    pub fn config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the Session
    pub fn build(self) -> Session {
        let mut config = self.config;
        if let Some(dir) = self.scratch_dir {
            debug!("Scratch directory set to {:?}", dir);
            config.scratch_dir = Some(dir);
        }

        let name = self.name.unwrap_or_else(|| "untitled".to_string());
        info!("Building session '{}'", name);
        Session::with_config(name, config)
    }
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}
