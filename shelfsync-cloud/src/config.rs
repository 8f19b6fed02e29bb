//! Remote sync configuration.

use crate::policy::ConflictPolicy;
use serde::{Deserialize, Serialize};

/// Configuration for the sync engine and the Drive backend.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Base URL for the Drive REST API (e.g., "https://www.googleapis.com").
    pub api_base_url: String,

    /// Folder that holds the index file. When unset, the persisted folder id
    /// or a one-time prompt supplies it.
    pub folder_id: Option<String>,

    /// Keep all files in the private application data space.
    pub use_private: bool,

    /// Run the background auto-sync loop.
    pub auto_sync: bool,

    /// Interval between auto-sync pushes (seconds).
    pub auto_sync_interval_secs: u64,

    /// How remote values are reconciled with pending local edits.
    pub conflict_policy: ConflictPolicy,

    /// Prefix for every key this crate writes to the persistence port.
    pub state_prefix: String,

    /// HTTP request timeout for the Drive backend (seconds).
    pub request_timeout_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://www.googleapis.com".to_string(),
            folder_id: None,
            use_private: false,
            auto_sync: false,
            auto_sync_interval_secs: 60,
            conflict_policy: ConflictPolicy::LastRemoteWins,
            state_prefix: "shelfsync".to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl SyncConfig {
    /// Checks values that would otherwise fail later at runtime.
    pub fn validate(&self) -> Result<(), crate::CloudError> {
        if self.state_prefix.is_empty() {
            return Err(crate::CloudError::Config("state_prefix must not be empty".into()));
        }
        if self.auto_sync && self.auto_sync_interval_secs == 0 {
            return Err(crate::CloudError::Config(
                "auto_sync_interval_secs must be positive when auto_sync is on".into(),
            ));
        }
        if self.use_private && self.folder_id.is_some() {
            return Err(crate::CloudError::Config(
                "folder_id cannot be combined with use_private".into(),
            ));
        }
        Ok(())
    }

    pub(crate) fn dirty_key(&self) -> String {
        format!("{}.dirty", self.state_prefix)
    }

    pub(crate) fn last_modified_key(&self) -> String {
        format!("{}.lastModified", self.state_prefix)
    }

    pub(crate) fn folder_key(&self) -> String {
        format!("{}.folderId", self.state_prefix)
    }
}
