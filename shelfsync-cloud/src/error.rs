//! Remote sync error types.

use shelfsync_storage::StorageError;
use thiserror::Error;

/// Result type for cloud operations.
pub type CloudResult<T> = Result<T, CloudError>;

/// Errors that can occur in remote sync operations.
#[derive(Debug, Error)]
pub enum CloudError {
    #[error("remote library not initialized")]
    NotInitialized,

    #[error("remote session not ready")]
    NotReady,

    #[error("index entry for {0} has no backing content file")]
    RemoteInconsistency(String),

    #[error("no destination folder available for the index file")]
    FolderUnavailable,

    #[error("authentication required")]
    AuthRequired,

    #[error("remote backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("local storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl CloudError {
    /// Returns true for errors that reject a call before any network traffic.
    pub fn is_precondition(&self) -> bool {
        matches!(self, CloudError::NotInitialized | CloudError::NotReady)
    }
}
