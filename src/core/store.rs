//! Append-only scratch store for scan data points
//!
//! Data points are encoded into a reusable buffer and appended to a
//! temporary file. An in-memory index maps each storage ID to the offset of
//! its record and the number of points in it; the file itself carries no
//! record boundaries.
//!
//! Deleting an ID only drops it from the index. The bytes stay in the file
//! until the store is closed, so holders that want to compact the data read
//! the live index via [`ScratchStore::snapshot`] and rewrite it themselves.
//!
//! All operations, reads included, run under one lock: they share the file
//! cursor and the scratch buffer.

use crate::core::buffer::ScratchBuffer;
use crate::core::codec::{self, checked_encoded_len, encoded_len};
use crate::core::config::StoreConfig;
use crate::core::error::{Result, ScanStoreError};
use crate::core::io::ScratchFile;
use crate::core::scan::DataPoint;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Opaque handle to a record in the scratch store; never reused
pub type StorageId = u32;

/// Consistent copy of the live index
///
/// Both maps iterate in ascending storage ID order, which is the order
/// consolidation rewrites records in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    /// Storage ID -> byte offset in the scratch file
    pub offsets: BTreeMap<StorageId, u64>,
    /// Storage ID -> number of data points
    pub lengths: BTreeMap<StorageId, usize>,
}

impl StoreSnapshot {
    /// Live storage IDs in ascending order
    pub fn ids(&self) -> impl Iterator<Item = StorageId> + '_ {
        self.offsets.keys().copied()
    }

    /// Byte range `[start, end)` of a record
    ///
    /// `None` for unknown IDs and for entries whose end overflows `u64`.
    pub fn byte_range(&self, id: StorageId) -> Option<(u64, u64)> {
        let offset = *self.offsets.get(&id)?;
        let count = *self.lengths.get(&id)?;
        let end = offset.checked_add(checked_encoded_len(count)? as u64)?;
        Some((offset, end))
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}

enum FileState {
    /// No data written yet
    Unopened,
    Open(ScratchFile),
    Closed,
}

impl FileState {
    fn open_or_create(&mut self, config: &StoreConfig) -> Result<&mut ScratchFile> {
        if let FileState::Unopened = self {
            let file = ScratchFile::create_temp(config)?;
            info!("Created scratch file {:?}", file.path());
            *self = FileState::Open(file);
        }
        self.get_mut()
    }

    fn get_mut(&mut self) -> Result<&mut ScratchFile> {
        match self {
            FileState::Open(file) => Ok(file),
            FileState::Unopened | FileState::Closed => Err(ScanStoreError::StoreClosed),
        }
    }

    fn check_not_closed(&self) -> Result<()> {
        match self {
            FileState::Closed => Err(ScanStoreError::StoreClosed),
            _ => Ok(()),
        }
    }
}

struct StoreInner {
    file: FileState,
    buffer: ScratchBuffer,
    offsets: BTreeMap<StorageId, u64>,
    lengths: BTreeMap<StorageId, usize>,
    /// Highest storage ID ever issued or restored
    high_water: StorageId,
}

/// Scratch store
///
/// Safe to share between threads; every call takes the store's lock.
pub struct ScratchStore {
    inner: Mutex<StoreInner>,
    config: StoreConfig,
}

impl ScratchStore {
    /// Create a store; the scratch file is created on the first write
    pub fn new(config: StoreConfig) -> Self {
        ScratchStore {
            inner: Mutex::new(StoreInner {
                file: FileState::Unopened,
                buffer: ScratchBuffer::with_capacity(config.initial_buffer_capacity),
                offsets: BTreeMap::new(),
                lengths: BTreeMap::new(),
                high_water: 0,
            }),
            config,
        }
    }

    /// Use an explicit scratch file instead of a lazily created one
    ///
    /// Existing contents are kept, to be described by [`restore_entry`](Self::restore_entry).
    pub fn open<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut inner = self.inner.lock();
        match inner.file {
            FileState::Open(_) => {
                return Err(ScanStoreError::AlreadyOpen(path.as_ref().to_path_buf()))
            }
            FileState::Closed => return Err(ScanStoreError::StoreClosed),
            FileState::Unopened => {}
        }

        let file = ScratchFile::open(&path, self.config.lock_scratch_file)?;
        info!(
            "Opened scratch file {:?} ({} bytes)",
            path.as_ref(),
            file.len()
        );
        inner.file = FileState::Open(file);
        Ok(())
    }

    /// Append `points` and return the new storage ID
    ///
    /// An empty slice is valid and yields a zero-count entry. The index is
    /// only updated once the bytes are written.
    pub fn store(&self, points: &[DataPoint]) -> Result<StorageId> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        inner.file.check_not_closed()?;
        let id = inner
            .high_water
            .checked_add(1)
            .ok_or(ScanStoreError::IdentifiersExhausted(inner.high_water))?;

        let file = inner.file.open_or_create(&self.config)?;
        let num_bytes = encoded_len(points.len());
        let bytes = inner.buffer.prepare(num_bytes);
        codec::encode_into(points, bytes);
        let offset = file.append(bytes)?;

        inner.offsets.insert(id, offset);
        inner.lengths.insert(id, points.len());
        inner.high_water = id;

        debug!(
            "Stored {} data points as ID {} at offset {}",
            points.len(),
            id,
            offset
        );
        Ok(id)
    }

    /// Read back the data points stored under `id`, in original order
    pub fn read(&self, id: StorageId) -> Result<Vec<DataPoint>> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        inner.file.check_not_closed()?;

        let (offset, count) = match (inner.offsets.get(&id), inner.lengths.get(&id)) {
            (Some(&offset), Some(&count)) => (offset, count),
            _ => return Err(ScanStoreError::UnknownIdentifier(id)),
        };

        if count == 0 {
            return Ok(Vec::new());
        }

        let file = inner.file.get_mut()?;
        let num_bytes = encoded_len(count);
        let bytes = inner.buffer.prepare(num_bytes);
        file.read_at(offset, bytes)?;

        debug!("Read {} data points for ID {}", count, id);
        codec::decode(bytes)
    }

    /// Drop `id` from the index; unknown IDs are ignored
    ///
    /// File space is not reclaimed.
    pub fn delete(&self, id: StorageId) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.file.check_not_closed()?;

        let removed = inner.offsets.remove(&id).is_some();
        inner.lengths.remove(&id);

        if removed {
            debug!("Removed storage ID {}", id);
        } else {
            debug!("Storage ID {} not present, nothing to remove", id);
        }
        Ok(())
    }

    /// Re-create an index entry for a record already in an opened file
    ///
    /// The restored ID counts towards ID allocation, so later writes never
    /// collide with it. ID 0 is rejected.
    pub fn restore_entry(&self, id: StorageId, offset: u64, count: usize) -> Result<()> {
        if id == 0 {
            return Err(ScanStoreError::InvalidIdentifier(id));
        }

        let mut inner = self.inner.lock();
        let file_len = match &inner.file {
            FileState::Open(file) => file.len(),
            FileState::Unopened => 0,
            FileState::Closed => return Err(ScanStoreError::StoreClosed),
        };

        let fits = checked_encoded_len(count)
            .and_then(|num_bytes| offset.checked_add(num_bytes as u64))
            .is_some_and(|end| end <= file_len);
        if !fits {
            return Err(ScanStoreError::InvalidRange {
                id,
                offset,
                count,
                file_len,
            });
        }

        inner.offsets.insert(id, offset);
        inner.lengths.insert(id, count);
        inner.high_water = inner.high_water.max(id);
        Ok(())
    }

    /// Copy of the live index
    pub fn snapshot(&self) -> Result<StoreSnapshot> {
        let inner = self.inner.lock();
        inner.file.check_not_closed()?;

        Ok(StoreSnapshot {
            offsets: inner.offsets.clone(),
            lengths: inner.lengths.clone(),
        })
    }

    /// Close and delete the scratch file
    ///
    /// Idempotent. Deletion is best-effort: a failure is logged, not returned.
    /// Every later operation fails with `StoreClosed`.
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        let state = std::mem::replace(&mut inner.file, FileState::Closed);
        inner.offsets.clear();
        inner.lengths.clear();

        if let FileState::Open(file) = state {
            let path = file.path().to_path_buf();
            match file.remove() {
                Ok(()) => info!("Closed and removed scratch file {:?}", path),
                Err(e) => warn!("Could not remove scratch file {:?}: {}", path, e),
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.inner.lock().file, FileState::Closed)
    }

    /// Number of live storage IDs
    pub fn len(&self) -> usize {
        self.inner.lock().offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current scratch file length in bytes (0 before the first write)
    pub fn file_len(&self) -> u64 {
        match &self.inner.lock().file {
            FileState::Open(file) => file.len(),
            _ => 0,
        }
    }

    /// Path of the scratch file, once it exists
    pub fn path(&self) -> Option<PathBuf> {
        match &self.inner.lock().file {
            FileState::Open(file) => Some(file.path().to_path_buf()),
            _ => None,
        }
    }

    /// Capacity of the reusable scratch buffer in bytes
    pub fn buffer_capacity(&self) -> usize {
        self.inner.lock().buffer.capacity()
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }
}

impl Default for ScratchStore {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

impl Drop for ScratchStore {
    fn drop(&mut self) {
        self.close();
    }
}
