//! Lazily computed aggregates over the scan index
//!
//! Each aggregate is computed on first request for a level, from one pass
//! over the index, and cached from then on. Entries are never invalidated
//! by later registrations: once a key is populated it keeps its value until
//! it is explicitly overridden or the whole cache is reset.
//!
//! When no scan matches a level, the intensity aggregates return
//! [`NO_DATA`] (which is cached like any other value) and the range
//! aggregates return a zero-width range at 0 (which is not cached).

use crate::core::index::{ScanFilter, ScanIndex};
use crate::core::scan::{Level, Range, ScanNumber, ALL_LEVELS};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Sentinel returned by the intensity aggregates when no scan matches
pub const NO_DATA: f64 = -1.0;

/// Cache key: the wildcard is kept apart from every concrete level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LevelKey {
    All,
    Level(Level),
}

impl From<Level> for LevelKey {
    fn from(level: Level) -> Self {
        if level == ALL_LEVELS {
            LevelKey::All
        } else {
            LevelKey::Level(level)
        }
    }
}

#[derive(Default)]
struct CacheTables {
    max_intensity: BTreeMap<LevelKey, f64>,
    max_total_signal: BTreeMap<LevelKey, f64>,
    mz_range: BTreeMap<LevelKey, Range>,
    time_range: BTreeMap<LevelKey, Range>,
    scan_numbers: BTreeMap<LevelKey, Arc<[ScanNumber]>>,
}

/// Per-level aggregate and scan-number caches
#[derive(Default)]
pub struct AggregateCache {
    tables: Mutex<CacheTables>,
}

impl AggregateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached value for `key`, else `compute()` stored if absent
    ///
    /// Computation runs outside the lock; a value stored in the meantime
    /// (e.g. an override) wins over the freshly computed one.
    fn lookup_or_compute<T, S, C>(&self, key: LevelKey, select: S, compute: C) -> Option<T>
    where
        T: Clone,
        S: Fn(&mut CacheTables) -> &mut BTreeMap<LevelKey, T>,
        C: FnOnce() -> Option<T>,
    {
        if let Some(value) = select(&mut self.tables.lock()).get(&key) {
            return Some(value.clone());
        }

        let value = compute()?;
        let mut tables = self.tables.lock();
        Some(select(&mut tables).entry(key).or_insert(value).clone())
    }

    /// Highest base peak intensity among scans at `level`
    pub fn max_intensity(&self, index: &ScanIndex, level: Level) -> f64 {
        self.lookup_or_compute(
            level.into(),
            |t| &mut t.max_intensity,
            || {
                debug!("Computing max intensity for level {}", level);
                let max = index.fold(None, |max: Option<f64>, handle| {
                    if !handle.matches_level(level) {
                        return max;
                    }
                    match handle.highest_intensity() {
                        Some(i) if max.map_or(true, |m| i > m) => Some(i),
                        _ => max,
                    }
                });
                Some(max.unwrap_or(NO_DATA))
            },
        )
        .unwrap_or(NO_DATA)
    }

    /// Highest total signal among scans at `level`
    pub fn max_total_signal(&self, index: &ScanIndex, level: Level) -> f64 {
        self.lookup_or_compute(
            level.into(),
            |t| &mut t.max_total_signal,
            || {
                debug!("Computing max total signal for level {}", level);
                let max = index.fold(None, |max: Option<f64>, handle| {
                    if !handle.matches_level(level) {
                        return max;
                    }
                    let signal = handle.total_signal();
                    Some(max.map_or(signal, |m| m.max(signal)))
                });
                Some(max.unwrap_or(NO_DATA))
            },
        )
        .unwrap_or(NO_DATA)
    }

    /// Coordinate range covered by scans at `level`
    pub fn coordinate_range(&self, index: &ScanIndex, level: Level) -> Range {
        self.lookup_or_compute(
            level.into(),
            |t| &mut t.mz_range,
            || {
                debug!("Computing coordinate range for level {}", level);
                index.fold(None, |range: Option<Range>, handle| {
                    let scan_range = match handle.mz_range() {
                        Some(r) if handle.matches_level(level) => r,
                        _ => return range,
                    };
                    let mut range = range.unwrap_or(scan_range);
                    range.extend(&scan_range);
                    Some(range)
                })
            },
        )
        .unwrap_or_else(|| Range::point(0.0))
    }

    /// Time range covered by scans at `level`
    pub fn time_range(&self, index: &ScanIndex, level: Level) -> Range {
        self.lookup_or_compute(
            level.into(),
            |t| &mut t.time_range,
            || {
                debug!("Computing time range for level {}", level);
                index.fold(None, |range: Option<Range>, handle| {
                    if !handle.matches_level(level) {
                        return range;
                    }
                    let mut range = range.unwrap_or_else(|| Range::point(handle.time));
                    range.extend_value(handle.time);
                    Some(range)
                })
            },
        )
        .unwrap_or_else(|| Range::point(0.0))
    }

    /// Sorted scan numbers at `level` (every scan for the wildcard)
    pub fn scan_number_array(&self, index: &ScanIndex, level: Level) -> Arc<[ScanNumber]> {
        self.lookup_or_compute(
            level.into(),
            |t| &mut t.scan_numbers,
            || Some(Arc::from(index.scan_numbers(&ScanFilter::level(level)))),
        )
        .unwrap_or_else(|| Arc::from(Vec::new()))
    }

    /// Override the cached coordinate range for `level`
    pub fn set_coordinate_range(&self, level: Level, range: Range) {
        self.tables.lock().mz_range.insert(level.into(), range);
    }

    /// Override the cached time range for `level`
    pub fn set_time_range(&self, level: Level, range: Range) {
        self.tables.lock().time_range.insert(level.into(), range);
    }

    /// Drop every cached entry
    pub fn reset(&self) {
        *self.tables.lock() = CacheTables::default();
    }
}
