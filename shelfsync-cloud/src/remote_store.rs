//! Remote key/value store over an index document and per-key content files.
//!
//! Every key lives in its own `<key>.data` file. A single `index` file maps
//! each key to its file id and content digest, and its modification time is
//! the freshness signal for the whole key space:
//!
//! - **load**: if the index has not moved past the caller's last known
//!   timestamp, nothing else is fetched. Otherwise keys whose local digest
//!   matches the index are answered locally and only the rest are downloaded.
//! - **save**: keys whose digest already matches are skipped, changed keys are
//!   uploaded, then the index is rewritten once for the whole batch.
//!
//! The store holds the resolved index handle and the last index content it
//! read, tagged with the timestamp it was read at. A cached document is only
//! reused while the remote timestamp still equals that tag. Writing the index
//! drops the cache; only a read can tag a document with a timestamp.

use crate::backend::RemoteFileBackend;
use crate::config::SyncConfig;
use crate::digest::{content_digest, digest_text};
use crate::error::{CloudError, CloudResult};
use crate::folder::{resolve_folder, FolderProvider};
use crate::index::{IndexDocument, IndexEntry};
use crate::types::*;
use chrono::{DateTime, Utc};
use shelfsync_storage::{KvStore, Value};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

struct CachedIndex {
    modified: DateTime<Utc>,
    document: IndexDocument,
}

/// Remote side of the key space.
pub struct RemoteStore {
    backend: Arc<dyn RemoteFileBackend>,
    kv: Arc<dyn KvStore>,
    folder_provider: Arc<dyn FolderProvider>,
    config: SyncConfig,
    index_handle: Option<IndexHandle>,
    cached_index: Option<CachedIndex>,
}

impl RemoteStore {
    pub fn new(
        backend: Arc<dyn RemoteFileBackend>,
        kv: Arc<dyn KvStore>,
        folder_provider: Arc<dyn FolderProvider>,
        config: SyncConfig,
    ) -> Self {
        Self {
            backend,
            kv,
            folder_provider,
            config,
            index_handle: None,
            cached_index: None,
        }
    }

    /// Returns the index handle resolved in this session, if any.
    pub fn cached_handle(&self) -> Option<&IndexHandle> {
        self.index_handle.as_ref()
    }

    /// Forgets the resolved handle and cached index content.
    pub fn invalidate(&mut self) {
        self.index_handle = None;
        self.cached_index = None;
    }

    /// Folder the index is expected in, without prompting.
    fn known_folder(&self) -> CloudResult<Option<String>> {
        if self.config.use_private {
            return Ok(Some(APP_DATA_FOLDER.to_string()));
        }
        if let Some(ref folder) = self.config.folder_id {
            return Ok(Some(folder.clone()));
        }
        Ok(self.kv.get(&self.config.folder_key())?)
    }

    /// Resolves the index file, creating it on first use.
    pub async fn ensure_index(&mut self) -> CloudResult<IndexHandle> {
        if let Some(ref handle) = self.index_handle {
            return Ok(handle.clone());
        }

        debug!("looking up index file");
        let filter = FileFilter::named(INDEX_FILE_NAME).in_folder(self.known_folder()?);
        let found = self.backend.list(&filter).await?.into_iter().next();

        let handle = match found {
            Some(file) => IndexHandle {
                file_id: file.id,
                folder_id: file.parents.into_iter().next(),
            },
            None => self.provision_index().await?,
        };

        self.index_handle = Some(handle.clone());
        Ok(handle)
    }

    async fn provision_index(&mut self) -> CloudResult<IndexHandle> {
        let folder = resolve_folder(&self.config, &self.kv, self.folder_provider.as_ref())?;
        info!("no index file found, creating one in folder {folder}");

        let file_id = self
            .backend
            .create(NewFile {
                name: INDEX_FILE_NAME.to_string(),
                folder: Some(folder.clone()),
                mime_type: INDEX_MIME_TYPE.to_string(),
                content: "{}".to_string(),
            })
            .await?;

        self.cached_index = None;
        Ok(IndexHandle {
            file_id,
            folder_id: Some(folder),
        })
    }

    /// Fetches the index file's current modification time.
    pub async fn index_modified_time(&mut self) -> CloudResult<DateTime<Utc>> {
        let handle = self.ensure_index().await?;
        self.modified_time_of(&handle).await
    }

    async fn modified_time_of(&mut self, handle: &IndexHandle) -> CloudResult<DateTime<Utc>> {
        let filter = FileFilter::named(INDEX_FILE_NAME).in_folder(handle.folder_id.clone());
        let found = self
            .backend
            .list(&filter)
            .await?
            .into_iter()
            .find(|f| f.id == handle.file_id);

        match found {
            Some(file) => Ok(file.modified_time),
            None => {
                warn!("index file {} disappeared, resolving again next call", handle.file_id);
                self.invalidate();
                Err(CloudError::NotFound(format!("index file {}", handle.file_id)))
            }
        }
    }

    async fn read_index(
        &mut self,
        handle: &IndexHandle,
        modified: DateTime<Utc>,
    ) -> CloudResult<IndexDocument> {
        if let Some(ref cached) = self.cached_index {
            if cached.modified == modified {
                debug!("index unchanged since last read, using cached copy");
                return Ok(cached.document.clone());
            }
        }

        debug!("reading index document");
        let content = self.backend.read(&handle.file_id).await?;
        let document = IndexDocument::parse(&content)?;
        self.cached_index = Some(CachedIndex {
            modified,
            document: document.clone(),
        });
        Ok(document)
    }

    async fn find_content_file(
        &self,
        handle: &IndexHandle,
        key: &str,
    ) -> CloudResult<Option<String>> {
        let filter = FileFilter::named(content_file_name(key)).in_folder(handle.folder_id.clone());
        Ok(self.backend.list(&filter).await?.into_iter().next().map(|f| f.id))
    }

    /// Loads a batch of keys.
    ///
    /// Returns one value per entry in input order. Keys the index does not know
    /// keep their local value; keys whose content file is gone come back as
    /// [`Value::Undefined`].
    pub async fn load(
        &mut self,
        entries: &[LoadEntry],
        last_known: Option<DateTime<Utc>>,
        force: bool,
    ) -> CloudResult<LoadOutcome> {
        let handle = self.ensure_index().await?;
        let modified = self.modified_time_of(&handle).await?;

        if !force && last_known.is_some_and(|known| modified <= known) {
            debug!("index not modified since {modified}, skipping content fetch");
            return Ok(LoadOutcome {
                values: entries.iter().map(|e| e.local.clone()).collect(),
                observed: modified,
                index_read: false,
            });
        }

        let document = self.read_index(&handle, modified).await?;
        let mut values = Vec::with_capacity(entries.len());
        for entry in entries {
            values.push(self.resolve_entry(&handle, &document, entry).await?);
        }

        Ok(LoadOutcome {
            values,
            observed: modified,
            index_read: true,
        })
    }

    async fn resolve_entry(
        &self,
        handle: &IndexHandle,
        document: &IndexDocument,
        entry: &LoadEntry,
    ) -> CloudResult<Value> {
        let Some(index_entry) = document.get(&entry.key) else {
            debug!("{} has no index entry, keeping local value", entry.key);
            return Ok(entry.local.clone());
        };

        if content_digest(&entry.local)?.is_some_and(|hash| hash == index_entry.content_hash) {
            return Ok(entry.local.clone());
        }

        let file_id = match index_entry.file_id {
            Some(ref id) => Some(id.clone()),
            None => self.find_content_file(handle, &entry.key).await?,
        };
        let Some(file_id) = file_id else {
            warn!("{}", CloudError::RemoteInconsistency(entry.key.clone()));
            return Ok(Value::Undefined);
        };

        match self.backend.read(&file_id).await {
            Ok(content) => {
                debug!("fetched remote content for {}", entry.key);
                Ok(Value::from_canonical(&content)?)
            }
            Err(CloudError::NotFound(_)) => {
                warn!("{}", CloudError::RemoteInconsistency(entry.key.clone()));
                Ok(Value::Undefined)
            }
            Err(e) => Err(e),
        }
    }

    /// Saves a batch of keys with a single index read-modify-write.
    ///
    /// When a key appears more than once, its last value wins.
    pub async fn save(&mut self, entries: &[SaveEntry]) -> CloudResult<SaveOutcome> {
        let handle = self.ensure_index().await?;
        let modified = self.modified_time_of(&handle).await?;
        let mut document = self.read_index(&handle, modified).await?;

        let mut changes: Vec<(String, IndexEntry)> = Vec::new();
        for entry in last_write_wins(entries) {
            let Some(canonical) = entry.value.to_canonical()? else {
                debug!("{} holds an unsupported value, not pushing", entry.key);
                continue;
            };

            let hash = digest_text(&canonical);
            if document.hash_matches(&entry.key, &hash) {
                debug!("{} unchanged remotely, skipping upload", entry.key);
                continue;
            }

            let file_id = self
                .write_content(&handle, &entry.key, document.get(&entry.key), canonical)
                .await?;
            changes.push((
                entry.key.clone(),
                IndexEntry {
                    file_id: Some(file_id),
                    content_hash: hash,
                },
            ));
        }

        if changes.is_empty() {
            return Ok(SaveOutcome {
                uploaded: Vec::new(),
                observed: modified,
            });
        }

        let uploaded: Vec<String> = changes.iter().map(|(k, _)| k.clone()).collect();
        document.apply(changes);
        self.backend
            .update(&handle.file_id, INDEX_MIME_TYPE, document.to_json()?)
            .await?;

        // Another writer may land between our update and the timestamp read,
        // so our document cannot be tagged with that timestamp.
        self.cached_index = None;
        let observed = self.modified_time_of(&handle).await?;

        info!("pushed {} keys, index now at {observed}", uploaded.len());
        Ok(SaveOutcome { uploaded, observed })
    }

    async fn write_content(
        &self,
        handle: &IndexHandle,
        key: &str,
        existing: Option<&IndexEntry>,
        canonical: String,
    ) -> CloudResult<String> {
        let existing_id = match existing.and_then(|e| e.file_id.clone()) {
            Some(id) => Some(id),
            None => self.find_content_file(handle, key).await?,
        };

        if let Some(id) = existing_id {
            match self
                .backend
                .update(&id, CONTENT_MIME_TYPE, canonical.clone())
                .await
            {
                Ok(id) => return Ok(id),
                Err(CloudError::NotFound(_)) => {
                    warn!("content file for {key} vanished, creating a new one");
                }
                Err(e) => return Err(e),
            }
        }

        debug!("creating content file for {key}");
        self.backend
            .create(NewFile {
                name: content_file_name(key),
                folder: handle.folder_id.clone(),
                mime_type: CONTENT_MIME_TYPE.to_string(),
                content: canonical,
            })
            .await
    }
}

/// Keeps the last entry per key, preserving the order of those survivors.
fn last_write_wins(entries: &[SaveEntry]) -> Vec<&SaveEntry> {
    let mut seen = HashSet::new();
    let mut kept: Vec<&SaveEntry> = entries
        .iter()
        .rev()
        .filter(|e| seen.insert(e.key.as_str()))
        .collect();
    kept.reverse();
    kept
}
