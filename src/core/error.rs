use crate::core::scan::ScanNumber;
use crate::core::store::StorageId;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanStoreError {
    #[error("Unknown storage ID: {0}")]
    UnknownIdentifier(StorageId),

    #[error("Unknown scan number: {0}")]
    UnknownScan(ScanNumber),

    #[error("Storage I/O error: {0}")]
    StorageIo(#[from] std::io::Error),

    #[error("Cannot open data store {0:?}: a data store is already open")]
    AlreadyOpen(PathBuf),

    #[error("Data store is closed")]
    StoreClosed,

    #[error("Invalid storage ID: {0} (storage IDs start at 1)")]
    InvalidIdentifier(StorageId),

    #[error("Storage IDs exhausted: no ID above {0} can be issued")]
    IdentifiersExhausted(StorageId),

    #[error("Invalid byte range for storage ID {id}: {count} points at offset {offset} exceed file length {file_len}")]
    InvalidRange {
        id: StorageId,
        offset: u64,
        count: usize,
        file_len: u64,
    },

    #[error("Malformed record: {0} bytes is not a whole number of data points")]
    MalformedRecord(usize),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<toml::de::Error> for ScanStoreError {
    fn from(err: toml::de::Error) -> Self {
        ScanStoreError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ScanStoreError>;
