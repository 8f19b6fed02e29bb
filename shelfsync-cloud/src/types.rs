//! Shared types for remote sync operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shelfsync_storage::Value;

/// Name of the remote catalog file.
pub const INDEX_FILE_NAME: &str = "index";

/// Mime type of the index file.
pub const INDEX_MIME_TYPE: &str = "application/json";

/// Mime type of per-key content files.
pub const CONTENT_MIME_TYPE: &str = "text/plain";

/// Folder alias for the private application data space.
pub const APP_DATA_FOLDER: &str = "appDataFolder";

/// Returns the remote file name holding a key's content.
pub fn content_file_name(key: &str) -> String {
    format!("{key}.data")
}

/// Metadata for a remote file as returned by `list`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteFile {
    pub id: String,
    pub name: String,
    pub modified_time: DateTime<Utc>,
    #[serde(default)]
    pub parents: Vec<String>,
}

/// Filter for `list`. Unset fields match everything.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FileFilter {
    pub name: Option<String>,
    pub parent: Option<String>,
}

impl FileFilter {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            parent: None,
        }
    }

    pub fn in_folder(mut self, parent: Option<String>) -> Self {
        self.parent = parent;
        self
    }

    /// Returns true if the file passes this filter.
    pub fn matches(&self, file: &RemoteFile) -> bool {
        self.name.as_ref().is_none_or(|n| *n == file.name)
            && self
                .parent
                .as_ref()
                .is_none_or(|p| file.parents.iter().any(|fp| fp == p))
    }
}

/// Request to create a remote file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewFile {
    pub name: String,
    pub folder: Option<String>,
    pub mime_type: String,
    pub content: String,
}

/// Resolved location of the index file for this session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexHandle {
    pub file_id: String,
    /// Folder that owns the index; content files are created next to it.
    pub folder_id: Option<String>,
}

/// One key of a remote `load` batch, paired with its local fallback.
#[derive(Clone, Debug, PartialEq)]
pub struct LoadEntry {
    pub key: String,
    pub local: Value,
}

impl LoadEntry {
    pub fn new(key: impl Into<String>, local: Value) -> Self {
        Self {
            key: key.into(),
            local,
        }
    }
}

/// One key of a remote `save` batch.
#[derive(Clone, Debug, PartialEq)]
pub struct SaveEntry {
    pub key: String,
    pub value: Value,
}

impl SaveEntry {
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// Result of a remote `load` batch.
#[derive(Clone, Debug, PartialEq)]
pub struct LoadOutcome {
    /// One value per input entry, in input order.
    pub values: Vec<Value>,
    /// Index timestamp confirmed during the call.
    pub observed: DateTime<Utc>,
    /// False when the freshness check short-circuited the call.
    pub index_read: bool,
}

/// Result of a remote `save` batch.
#[derive(Clone, Debug, PartialEq)]
pub struct SaveOutcome {
    /// Keys whose content file was written.
    pub uploaded: Vec<String>,
    /// Index timestamp confirmed after the write.
    pub observed: DateTime<Utc>,
}

/// Result of a push from the sync engine.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PushReport {
    /// Keys included in the batch.
    pub pushed: Vec<String>,
    /// Keys whose remote content actually changed.
    pub uploaded: Vec<String>,
}

/// Commands sent to the auto-sync loop.
#[derive(Debug)]
pub enum AutoSyncCommand {
    Stop,
    SyncNow,
}
