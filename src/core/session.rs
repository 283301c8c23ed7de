//! Session: one scratch store, one scan index and their caches
//!
//! Producers call [`Session::add_scan`] (possibly from several threads);
//! readers look scans up by number and pull their data points back through
//! the store. Aggregate queries go through the [`AggregateCache`].
//!
//! Calls that change the store or the index hold the session's lifecycle
//! lock shared; `snapshot`, `finish_writing` and `close` hold it exclusively,
//! so they never observe a scan that is stored but not yet registered.

use crate::core::config::StoreConfig;
use crate::core::error::{Result, ScanStoreError};
use crate::core::index::{ScanFilter, ScanIndex};
use crate::core::scan::{
    DataPoint, Level, Range, ScanHandle, ScanNumber, ScanRecord, ScanSummary,
};
use crate::core::stats::AggregateCache;
use crate::core::store::{ScratchStore, StorageId, StoreSnapshot};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Consistent view handed to consolidation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Session display name
    pub name: String,
    /// Live byte ranges, ascending by storage ID
    pub store: StoreSnapshot,
    /// Scan handles, ascending by scan number
    pub scans: Vec<ScanHandle>,
}

impl SessionSnapshot {
    /// Serialize as JSON
    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Parse a snapshot previously written by [`to_json`](Self::to_json)
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Scan data session
pub struct Session {
    /// Display name, changeable by the user
    name: RwLock<String>,
    lifecycle: RwLock<()>,
    store: ScratchStore,
    index: ScanIndex,
    cache: AggregateCache,
}

impl Session {
    /// Create a session with default configuration
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self::with_config(name, StoreConfig::default())
    }

    pub fn with_config<S: Into<String>>(name: S, config: StoreConfig) -> Self {
        Session {
            name: RwLock::new(name.into()),
            lifecycle: RwLock::new(()),
            store: ScratchStore::new(config),
            index: ScanIndex::new(),
            cache: AggregateCache::new(),
        }
    }

    pub fn name(&self) -> String {
        self.name.read().clone()
    }

    pub fn set_name<S: Into<String>>(&self, name: S) {
        *self.name.write() = name.into();
    }

    /// Underlying scratch store
    pub fn store(&self) -> &ScratchStore {
        &self.store
    }

    /// Underlying scan index
    pub fn index(&self) -> &ScanIndex {
        &self.index
    }

    /// Use an explicit scratch file (loader path)
    pub fn open_data_store<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let _shared = self.lifecycle.read();
        self.store.open(path)
    }

    /// Describe a record already present in the opened scratch file
    pub fn restore_entry(&self, id: StorageId, offset: u64, count: usize) -> Result<()> {
        let _shared = self.lifecycle.read();
        self.store.restore_entry(id, offset, count)
    }

    pub fn store_data_points(&self, points: &[DataPoint]) -> Result<StorageId> {
        let _shared = self.lifecycle.read();
        self.store.store(points)
    }

    pub fn read_data_points(&self, id: StorageId) -> Result<Vec<DataPoint>> {
        self.store.read(id)
    }

    pub fn remove_data_points(&self, id: StorageId) -> Result<()> {
        let _shared = self.lifecycle.read();
        self.store.delete(id)
    }

    /// Store a scan's data points and register its handle
    pub fn add_scan(&self, record: ScanRecord) -> Result<ScanHandle> {
        let _shared = self.lifecycle.read();
        let storage_id = self.store.store(&record.points)?;
        let handle = ScanHandle::new(record.scan_number, record.level, record.time, storage_id)
            .with_summary(ScanSummary::from_points(&record.points));

        debug!(
            "Added scan {} (level {}, {} points) as storage ID {}",
            record.scan_number,
            record.level,
            record.points.len(),
            storage_id
        );
        self.index.register(handle.clone());
        Ok(handle)
    }

    /// Register a handle whose data points are already stored
    ///
    /// Replaces any handle with the same scan number.
    pub fn register_scan(&self, handle: ScanHandle) -> Result<()> {
        let _shared = self.lifecycle.read();
        if self.store.is_closed() {
            return Err(ScanStoreError::StoreClosed);
        }
        self.index.register(handle);
        Ok(())
    }

    pub fn scan(&self, scan_number: ScanNumber) -> Result<ScanHandle> {
        self.index.get(scan_number)
    }

    /// Data points of a registered scan, read back from the store
    pub fn scan_data_points(&self, scan_number: ScanNumber) -> Result<Vec<DataPoint>> {
        let handle = self.index.get(scan_number)?;
        self.store.read(handle.storage_id)
    }

    pub fn scan_count(&self) -> usize {
        self.index.len()
    }

    /// Number of scans at `level`, through the scan-number cache
    pub fn scan_count_at(&self, level: Level) -> usize {
        self.scan_number_array(level).len()
    }

    /// Scan numbers matching `filter`, ascending (not cached)
    pub fn scan_numbers(&self, filter: &ScanFilter) -> Vec<ScanNumber> {
        self.index.scan_numbers(filter)
    }

    /// Sorted scan numbers at `level`, memoized
    pub fn scan_number_array(&self, level: Level) -> Arc<[ScanNumber]> {
        self.cache.scan_number_array(&self.index, level)
    }

    pub fn resolution_levels(&self) -> Vec<Level> {
        self.index.resolution_levels()
    }

    /// Highest base peak intensity at `level`, or `NO_DATA`
    pub fn max_intensity(&self, level: Level) -> f64 {
        self.cache.max_intensity(&self.index, level)
    }

    /// Highest total signal at `level`, or `NO_DATA`
    pub fn max_total_signal(&self, level: Level) -> f64 {
        self.cache.max_total_signal(&self.index, level)
    }

    pub fn coordinate_range(&self, level: Level) -> Range {
        self.cache.coordinate_range(&self.index, level)
    }

    pub fn time_range(&self, level: Level) -> Range {
        self.cache.time_range(&self.index, level)
    }

    pub fn set_coordinate_range(&self, level: Level, range: Range) {
        self.cache.set_coordinate_range(level, range);
    }

    pub fn set_time_range(&self, level: Level, range: Range) {
        self.cache.set_time_range(level, range);
    }

    /// Drop every cached aggregate and scan-number array
    pub fn reset_caches(&self) {
        self.cache.reset();
    }

    /// Recompute every scan's summary from its stored data points
    ///
    /// All points are read before any summary changes; if one read fails,
    /// every handle keeps its previous summary.
    pub fn finish_writing(&self) -> Result<()> {
        let _exclusive = self.lifecycle.write();

        let summaries = self
            .index
            .handles()
            .into_iter()
            .map(|handle| {
                let points = self.store.read(handle.storage_id)?;
                Ok((handle.scan_number, ScanSummary::from_points(&points)))
            })
            .collect::<Result<Vec<_>>>()?;

        let count = summaries.len();
        self.index.set_summaries(summaries);

        info!(
            "Writing of scans to session '{}' finished ({} scans)",
            self.name(),
            count
        );
        Ok(())
    }

    /// Live index and scan handles for consolidation
    pub fn snapshot(&self) -> Result<SessionSnapshot> {
        let _exclusive = self.lifecycle.write();
        Ok(SessionSnapshot {
            name: self.name(),
            store: self.store.snapshot()?,
            scans: self.index.handles(),
        })
    }

    /// Close and delete the scratch file and drop all scans
    ///
    /// Idempotent. Store operations fail with `StoreClosed` afterwards.
    pub fn close(&self) {
        let _exclusive = self.lifecycle.write();
        self.store.close();
        self.index.clear();
        self.cache.reset();
    }

    pub fn is_closed(&self) -> bool {
        self.store.is_closed()
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name.read())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::scan::ALL_LEVELS;
    use crate::core::stats::NO_DATA;
    use tempfile::TempDir;

    fn test_session(dir: &TempDir) -> Session {
        Session::with_config(
            "run-01",
            StoreConfig {
                scratch_dir: Some(dir.path().to_path_buf()),
                ..StoreConfig::default()
            },
        )
    }

    #[test]
    fn test_add_scan_and_max_intensity() {
        let dir = TempDir::new().unwrap();
        let session = test_session(&dir);

        let points = vec![
            DataPoint::new(100.0, 10.0),
            DataPoint::new(100.5, 20.0),
            DataPoint::new(101.0, 5.0),
        ];
        let handle = session
            .add_scan(ScanRecord::new(1, 1, 0.5, points.clone()))
            .unwrap();

        assert_eq!(handle.storage_id, 1);
        assert_eq!(session.read_data_points(1).unwrap(), points);
        assert_eq!(session.scan_data_points(1).unwrap(), points);
        assert_eq!(session.max_intensity(1), 20.0);
        assert_eq!(session.max_total_signal(1), 35.0);
    }

    #[test]
    fn test_name() {
        let session = Session::new("first");
        session.set_name("renamed");
        assert_eq!(session.name(), "renamed");
        assert_eq!(session.to_string(), "renamed");
    }

    #[test]
    fn test_counts() {
        let dir = TempDir::new().unwrap();
        let session = test_session(&dir);

        for (n, level) in [(1, 1), (2, 2), (3, 1)] {
            session
                .add_scan(ScanRecord::new(n, level, n as f64, vec![]))
                .unwrap();
        }

        assert_eq!(session.scan_count(), 3);
        assert_eq!(session.scan_count_at(1), 2);
        assert_eq!(session.scan_count_at(ALL_LEVELS), 3);
        assert_eq!(session.resolution_levels(), vec![1, 2]);
    }

    #[test]
    fn test_finish_writing_recomputes_summaries() {
        let dir = TempDir::new().unwrap();
        let session = test_session(&dir);

        let id = session
            .store_data_points(&[DataPoint::new(10.0, 3.0), DataPoint::new(11.0, 4.0)])
            .unwrap();
        session.register_scan(ScanHandle::new(1, 1, 0.0, id)).unwrap();
        assert_eq!(session.scan(1).unwrap().highest_intensity(), None);

        session.finish_writing().unwrap();
        let handle = session.scan(1).unwrap();
        assert_eq!(handle.highest_intensity(), Some(4.0));
        assert_eq!(handle.total_signal(), 7.0);
        assert_eq!(handle.summary.point_count, 2);
    }

    #[test]
    fn test_finish_writing_is_all_or_nothing() {
        let dir = TempDir::new().unwrap();
        let session = test_session(&dir);

        let kept = session
            .store_data_points(&[DataPoint::new(10.0, 3.0)])
            .unwrap();
        let lost = session
            .store_data_points(&[DataPoint::new(20.0, 9.0)])
            .unwrap();
        session.register_scan(ScanHandle::new(1, 1, 0.0, kept)).unwrap();
        session.register_scan(ScanHandle::new(2, 1, 0.1, lost)).unwrap();
        session.remove_data_points(lost).unwrap();

        let result = session.finish_writing();
        assert!(matches!(result, Err(ScanStoreError::UnknownIdentifier(id)) if id == lost));

        // The readable scan was not updated either
        assert_eq!(session.scan(1).unwrap().summary, ScanSummary::default());
        assert_eq!(session.scan(2).unwrap().summary, ScanSummary::default());
    }

    #[test]
    fn test_snapshot_json_round_trip() {
        let dir = TempDir::new().unwrap();
        let session = test_session(&dir);

        session
            .add_scan(ScanRecord::new(1, 1, 0.1, vec![DataPoint::new(1.0, 2.0)]))
            .unwrap();
        let snapshot = session.snapshot().unwrap();
        let json = snapshot.to_json().unwrap();

        assert_eq!(SessionSnapshot::from_json(&json).unwrap(), snapshot);
    }

    #[test]
    fn test_close() {
        let dir = TempDir::new().unwrap();
        let session = test_session(&dir);

        session
            .add_scan(ScanRecord::new(1, 1, 0.1, vec![DataPoint::new(1.0, 2.0)]))
            .unwrap();
        let path = session.store().path().unwrap();

        session.close();
        session.close();

        assert!(!path.exists());
        assert!(session.is_closed());
        assert!(matches!(
            session.add_scan(ScanRecord::new(2, 1, 0.2, vec![])),
            Err(ScanStoreError::StoreClosed)
        ));
        assert!(matches!(
            session.register_scan(ScanHandle::new(2, 1, 0.2, 1)),
            Err(ScanStoreError::StoreClosed)
        ));
        assert!(matches!(session.scan(1), Err(ScanStoreError::UnknownScan(1))));
        assert_eq!(session.max_intensity(1), NO_DATA);
    }
}
