//! Storage error types.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors raised by the persistence port and the local store.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] duckdb::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid local record for {key}: {reason}")]
    InvalidRecord { key: String, reason: String },

    #[error("invalid big integer literal: {0}")]
    InvalidBigInt(String),

    #[error("store lock poisoned: {0}")]
    Lock(String),
}
