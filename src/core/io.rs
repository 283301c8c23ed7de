//! Disk I/O for the append-only scratch file

use crate::core::config::StoreConfig;
use crate::core::error::Result;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Suffix given to lazily created scratch files
pub const SCRATCH_SUFFIX: &str = ".scans";

/// Disk-backed scratch file
///
/// Tracks its own logical length so a failed append can be rolled back
/// without re-reading file metadata.
pub struct ScratchFile {
    file: File,
    path: PathBuf,
    len: u64,
    locked: bool,
}

impl ScratchFile {
    /// Create a fresh, uniquely named scratch file as configured
    pub fn create_temp(config: &StoreConfig) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(&config.file_prefix).suffix(SCRATCH_SUFFIX);

        let temp = match &config.scratch_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };

        // Deletion is handled by `remove`, not by the temp file guard
        let (file, path) = temp.keep().map_err(|e| e.error)?;
        Self::from_parts(file, path, config.lock_scratch_file)
    }

    /// Open an existing scratch file, creating it when absent
    ///
    /// Existing contents are kept; the caller is responsible for restoring
    /// the index that describes them.
    pub fn open<P: AsRef<Path>>(path: P, lock: bool) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        Self::from_parts(file, path.as_ref().to_path_buf(), lock)
    }

    /// Open an existing file without write access, so every append fails
    #[cfg(test)]
    pub(crate) fn open_read_only<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new().read(true).open(&path)?;
        Self::from_parts(file, path.as_ref().to_path_buf(), false)
    }

    fn from_parts(file: File, path: PathBuf, lock: bool) -> Result<Self> {
        if lock {
            file.lock_exclusive()?;
        }
        let len = file.metadata()?.len();

        Ok(ScratchFile {
            file,
            path,
            len,
            locked: lock,
        })
    }

    /// Append bytes at the end of the file, returning their offset
    ///
    /// On failure the file is truncated back to its previous length.
    pub fn append(&mut self, bytes: &[u8]) -> Result<u64> {
        let offset = self.len;
        if let Err(e) = self.write_at(offset, bytes) {
            let _ = self.file.set_len(offset);
            return Err(e.into());
        }

        self.len = offset + bytes.len() as u64;
        Ok(offset)
    }

    fn write_at(&mut self, offset: u64, bytes: &[u8]) -> std::io::Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(bytes)?;
        self.file.flush()
    }

    /// Fill `buf` from the given offset; a short read is an error
    pub fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(buf)?;
        Ok(())
    }

    /// Logical file length in bytes
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Check if nothing has been written
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Get file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the lock, close the handle and delete the file
    pub fn remove(self) -> Result<()> {
        if self.locked {
            let _ = self.file.unlock();
        }
        let path = self.path;
        drop(self.file);
        std::fs::remove_file(&path)?;
        Ok(())
    }
}
