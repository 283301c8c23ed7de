//! Storage engine internals
//!
//! - [`buffer`] - Growable scratch buffer reused across encode/decode calls
//! - [`codec`] - Fixed-width binary encoding of data points
//! - [`io`] - Append-only scratch file with advisory locking
//! - [`store`] - Scratch store: storage ID allocation and byte-range index
//! - [`scan`] - Data points, ranges and scan handles
//! - [`index`] - Scan number -> scan handle index with filtered queries
//! - [`stats`] - Lazily cached per-level aggregates and scan-number arrays
//! - [`session`] - Session tying store, index and caches together
//! - [`config`] - Store configuration

pub mod buffer;
pub mod codec;
pub mod config;
pub mod error;
pub mod index;
pub mod io;
pub mod scan;
pub mod session;
pub mod stats;
pub mod store;
