//! Error types for the log store.
//!
//! All errors are propagated via [`StoreError`], which wraps the underlying
//! I/O, `SQLite` and JSON errors. A corrupt record is its own variant
//! because readers recover from it: the record is skipped and the next
//! call resumes after it.

use std::path::PathBuf;

/// Errors that can occur while reading or writing a log.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// One record could not be decoded. The reader has already moved past
    /// it, so the stream continues with the next record.
    #[error("corrupt record at {location}: {message}")]
    Decode {
        /// Where the record sits (file offset or row id).
        location: String,
        /// What was wrong with it.
        message: String,
    },

    /// A filesystem operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A `SQLite` operation failed.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A record could not be serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The file extension does not name a known log format.
    #[error("unsupported log format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    /// The store handed out an id outside the `u64` range or ran out of ids.
    #[error("invalid record id: {0}")]
    InvalidId(String),
}

impl StoreError {
    /// Whether this error concerns a single record rather than the store.
    pub const fn is_corrupt_record(&self) -> bool {
        matches!(self, Self::Decode { .. })
    }
}
