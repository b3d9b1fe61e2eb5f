//! Persistence layer for rollcalld
//!
//! Provides:
//! - Evidence store (one PNG per period per day, with corrected copies)
//! - Daily CSV attendance log
//! - SQLite attendance log for history queries
//! - Fan-out over several logs
//! - In-memory doubles for tests

mod csv;
mod fanout;
mod file;
mod memory;
mod sqlite;
mod traits;

pub use csv::*;
pub use fanout::*;
pub use file::*;
pub use memory::*;
pub use sqlite::*;
pub use traits::*;

use rollcall_api::StorageErrorKind;
use thiserror::Error;

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image encoding error: {0}")]
    Encode(String),

    #[error("{kind}: {message}")]
    Storage {
        kind: StorageErrorKind,
        message: String,
    },
}

impl StoreError {
    /// Classify the failure for operator alerting
    pub fn kind(&self) -> StorageErrorKind {
        match self {
            StoreError::Storage { kind, .. } => *kind,
            StoreError::Io(e) => classify_io(e.kind()),
            _ => StorageErrorKind::Other,
        }
    }
}

fn classify_io(kind: std::io::ErrorKind) -> StorageErrorKind {
    use std::io::ErrorKind;

    match kind {
        ErrorKind::PermissionDenied | ErrorKind::ReadOnlyFilesystem => {
            StorageErrorKind::PermissionDenied
        }
        ErrorKind::StorageFull | ErrorKind::QuotaExceeded => StorageErrorKind::OutOfSpace,
        _ => StorageErrorKind::Other,
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

impl From<image::ImageError> for StoreError {
    fn from(e: image::ImageError) -> Self {
        match e {
            image::ImageError::IoError(io) => StoreError::Io(io),
            other => StoreError::Encode(other.to_string()),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
