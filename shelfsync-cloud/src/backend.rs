//! Remote file backend abstraction.
//!
//! The sync layer only needs four primitives on opaque named files. Retry and
//! backoff, if any, belong to the implementation.

use crate::error::CloudResult;
use crate::types::{FileFilter, NewFile, RemoteFile};
use async_trait::async_trait;

/// List/create/read/update on remote files.
#[async_trait]
pub trait RemoteFileBackend: Send + Sync {
    /// Lists files matching the filter.
    async fn list(&self, filter: &FileFilter) -> CloudResult<Vec<RemoteFile>>;

    /// Creates a file and returns its id.
    async fn create(&self, file: NewFile) -> CloudResult<String>;

    /// Reads a file's content. A missing file is `CloudError::NotFound`.
    async fn read(&self, file_id: &str) -> CloudResult<String>;

    /// Overwrites a file's content and returns its id.
    async fn update(&self, file_id: &str, mime_type: &str, content: String) -> CloudResult<String>;
}
