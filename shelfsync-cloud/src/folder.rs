//! Destination folder for the index file.
//!
//! The folder is asked for at most once: the answer is persisted and reused
//! on every later run. A declined prompt is reported, never retried here.

use crate::config::SyncConfig;
use crate::error::{CloudError, CloudResult};
use crate::types::APP_DATA_FOLDER;
use shelfsync_storage::KvStore;
use std::sync::Arc;
use tracing::{debug, info};

/// One-time, user-facing source of a folder id.
pub trait FolderProvider: Send + Sync {
    /// Asks for the folder id. `None` means the user declined.
    fn prompt_folder_id(&self) -> Option<String>;
}

/// Provider that always answers with a fixed folder.
#[derive(Clone, Debug)]
pub struct StaticFolder(pub String);

impl FolderProvider for StaticFolder {
    fn prompt_folder_id(&self) -> Option<String> {
        Some(self.0.clone())
    }
}

/// Provider for setups that must never prompt.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoPrompt;

impl FolderProvider for NoPrompt {
    fn prompt_folder_id(&self) -> Option<String> {
        None
    }
}

impl<F> FolderProvider for F
where
    F: Fn() -> Option<String> + Send + Sync,
{
    fn prompt_folder_id(&self) -> Option<String> {
        self()
    }
}

/// Resolves the destination folder: configuration, then persisted state,
/// then the prompt (whose answer is persisted).
pub(crate) fn resolve_folder(
    config: &SyncConfig,
    kv: &Arc<dyn KvStore>,
    provider: &dyn FolderProvider,
) -> CloudResult<String> {
    if config.use_private {
        return Ok(APP_DATA_FOLDER.to_string());
    }
    if let Some(ref folder) = config.folder_id {
        return Ok(folder.clone());
    }

    let key = config.folder_key();
    if let Some(folder) = kv.get(&key)? {
        debug!("using persisted folder id {folder}");
        return Ok(folder);
    }

    let folder = provider
        .prompt_folder_id()
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty())
        .ok_or(CloudError::FolderUnavailable)?;
    kv.set(&key, &folder)?;
    info!("persisted destination folder {folder}");
    Ok(folder)
}
