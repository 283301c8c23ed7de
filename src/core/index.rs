//! Scan index: scan number -> scan handle
//!
//! A flat ordered map with linear-scan filtering. Every query that walks
//! the handles bumps a pass counter, which lets callers (and tests) see
//! whether a cached answer was served.

use crate::core::error::{Result, ScanStoreError};
use crate::core::scan::{Level, Range, ScanHandle, ScanNumber, ScanSummary, ALL_LEVELS};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};

/// Predicate over scan handles: a level (or the wildcard) and a time window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanFilter {
    pub level: Level,
    pub time: Range,
}

impl ScanFilter {
    /// Every scan
    pub fn all() -> Self {
        ScanFilter {
            level: ALL_LEVELS,
            time: Range::unbounded(),
        }
    }

    /// Every scan at `level`, at any time
    pub fn level(level: Level) -> Self {
        ScanFilter {
            level,
            time: Range::unbounded(),
        }
    }

    /// Restrict to scans whose time falls in `time` (inclusive)
    pub fn within(mut self, time: Range) -> Self {
        self.time = time;
        self
    }

    pub fn matches(&self, handle: &ScanHandle) -> bool {
        handle.matches_level(self.level) && self.time.contains(handle.time)
    }
}

/// Scan index
#[derive(Default)]
pub struct ScanIndex {
    scans: RwLock<BTreeMap<ScanNumber, ScanHandle>>,
    passes: AtomicU64,
}

impl ScanIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a handle, replacing any previous one with the same number
    pub fn register(&self, handle: ScanHandle) -> Option<ScanHandle> {
        self.scans.write().insert(handle.scan_number, handle)
    }

    /// Get a copy of the handle for `scan_number`
    pub fn get(&self, scan_number: ScanNumber) -> Result<ScanHandle> {
        self.scans
            .read()
            .get(&scan_number)
            .cloned()
            .ok_or(ScanStoreError::UnknownScan(scan_number))
    }

    pub fn contains(&self, scan_number: ScanNumber) -> bool {
        self.scans.read().contains_key(&scan_number)
    }

    /// Scan numbers matching `filter`, ascending
    pub fn scan_numbers(&self, filter: &ScanFilter) -> Vec<ScanNumber> {
        self.fold(Vec::new(), |mut numbers, handle| {
            if filter.matches(handle) {
                numbers.push(handle.scan_number);
            }
            numbers
        })
    }

    /// Distinct levels present, ascending
    pub fn resolution_levels(&self) -> Vec<Level> {
        self.fold(BTreeSet::new(), |mut levels, handle| {
            levels.insert(handle.level);
            levels
        })
        .into_iter()
        .collect()
    }

    /// One pass over all handles in scan number order
    pub fn fold<T, F>(&self, init: T, f: F) -> T
    where
        F: FnMut(T, &ScanHandle) -> T,
    {
        self.passes.fetch_add(1, Ordering::Relaxed);
        self.scans.read().values().fold(init, f)
    }

    /// Replace the summaries of the listed scans in one write
    ///
    /// Scan numbers that are not registered are skipped.
    pub fn set_summaries<I>(&self, summaries: I)
    where
        I: IntoIterator<Item = (ScanNumber, ScanSummary)>,
    {
        let mut scans = self.scans.write();
        for (scan_number, summary) in summaries {
            if let Some(handle) = scans.get_mut(&scan_number) {
                handle.summary = summary;
            }
        }
    }

    /// Copies of all handles, ascending by scan number
    pub fn handles(&self) -> Vec<ScanHandle> {
        self.scans.read().values().cloned().collect()
    }

    /// Number of full passes made over the handles so far
    pub fn passes(&self) -> u64 {
        self.passes.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.scans.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.scans.read().is_empty()
    }

    pub fn clear(&self) {
        self.scans.write().clear();
    }
}
