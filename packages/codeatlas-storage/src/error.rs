//! Storage-crate errors.
//!
//! Read-side corruption is NOT an error: callers treat it as a cache miss.
//! Only the write path (tmp-file flow) surfaces failures.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Encode(String),

    #[error("version record not found: {0}")]
    VersionNotFound(String),

    #[error("findings record not found: {0}")]
    FindingsNotFound(String),
}

pub type Result<T> = std::result::Result<T, StorageError>;
