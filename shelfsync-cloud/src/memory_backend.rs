//! In-memory remote file backend, intended primarily for testing.
//!
//! Every write advances a logical clock by one second so modification
//! timestamps are strictly increasing. Call counters let tests assert how
//! many round-trips an operation cost.

use crate::backend::RemoteFileBackend;
use crate::error::{CloudError, CloudResult};
use crate::types::{FileFilter, NewFile, RemoteFile};
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

#[derive(Clone, Debug)]
struct StoredFile {
    name: String,
    parents: Vec<String>,
    mime_type: String,
    content: String,
    modified_time: DateTime<Utc>,
}

/// Per-call counters.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CallStats {
    pub list: usize,
    pub create: usize,
    pub read: usize,
    pub update: usize,
    pub reads_by_id: HashMap<String, usize>,
    pub updates_by_id: HashMap<String, usize>,
}

impl CallStats {
    pub fn reads_of(&self, file_id: &str) -> usize {
        self.reads_by_id.get(file_id).copied().unwrap_or(0)
    }

    pub fn updates_of(&self, file_id: &str) -> usize {
        self.updates_by_id.get(file_id).copied().unwrap_or(0)
    }
}

struct MemoryState {
    files: BTreeMap<String, StoredFile>,
    clock: DateTime<Utc>,
    next_id: u64,
    stats: CallStats,
}

impl MemoryState {
    fn tick(&mut self) -> DateTime<Utc> {
        self.clock += Duration::seconds(1);
        self.clock
    }

    fn to_remote(id: &str, file: &StoredFile) -> RemoteFile {
        RemoteFile {
            id: id.to_string(),
            name: file.name.clone(),
            modified_time: file.modified_time,
            parents: file.parents.clone(),
        }
    }
}

/// Remote files held in process memory.
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
    offline: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        let epoch = Utc
            .with_ymd_and_hms(2026, 1, 1, 0, 0, 0)
            .single()
            .unwrap_or_else(Utc::now);
        Self {
            state: Mutex::new(MemoryState {
                files: BTreeMap::new(),
                clock: epoch,
                next_id: 1,
                stats: CallStats::default(),
            }),
            offline: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> CloudResult<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|e| CloudError::Backend(format!("memory backend poisoned: {e}")))
    }

    fn check_online(&self) -> CloudResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(CloudError::Backend("memory backend offline".to_string()));
        }
        Ok(())
    }

    /// Makes every subsequent call fail until switched back.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Snapshot of the call counters.
    pub fn stats(&self) -> CallStats {
        self.lock().map(|s| s.stats.clone()).unwrap_or_default()
    }

    /// Resets the call counters.
    pub fn reset_stats(&self) {
        if let Ok(mut state) = self.lock() {
            state.stats = CallStats::default();
        }
    }

    /// Returns the first file with the given name.
    pub fn find(&self, name: &str) -> Option<RemoteFile> {
        let state = self.lock().ok()?;
        state
            .files
            .iter()
            .find(|(_, f)| f.name == name)
            .map(|(id, f)| MemoryState::to_remote(id, f))
    }

    /// Returns a file's content without counting a read.
    pub fn content(&self, file_id: &str) -> Option<String> {
        let state = self.lock().ok()?;
        state.files.get(file_id).map(|f| f.content.clone())
    }

    /// Returns a file's mime type.
    pub fn mime_type(&self, file_id: &str) -> Option<String> {
        let state = self.lock().ok()?;
        state.files.get(file_id).map(|f| f.mime_type.clone())
    }

    pub fn file_count(&self) -> usize {
        self.lock().map(|s| s.files.len()).unwrap_or(0)
    }

    /// Writes a file out of band, as another device would. Creates it when
    /// no file with that name exists. Not counted in the stats.
    pub fn put_external(&self, name: &str, parent: Option<&str>, content: &str) -> Option<String> {
        let mut state = self.lock().ok()?;
        let now = state.tick();
        let existing = state
            .files
            .iter()
            .find(|(_, f)| f.name == name)
            .map(|(id, _)| id.clone());

        match existing {
            Some(id) => {
                let file = state.files.get_mut(&id)?;
                file.content = content.to_string();
                file.modified_time = now;
                Some(id)
            }
            None => {
                let id = format!("ext-{}", state.next_id);
                state.next_id += 1;
                state.files.insert(
                    id.clone(),
                    StoredFile {
                        name: name.to_string(),
                        parents: parent.map(|p| vec![p.to_string()]).unwrap_or_default(),
                        mime_type: "text/plain".to_string(),
                        content: content.to_string(),
                        modified_time: now,
                    },
                );
                Some(id)
            }
        }
    }

    /// Deletes a file out of band.
    pub fn delete_external(&self, file_id: &str) -> bool {
        self.lock()
            .map(|mut s| s.files.remove(file_id).is_some())
            .unwrap_or(false)
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteFileBackend for MemoryBackend {
    async fn list(&self, filter: &FileFilter) -> CloudResult<Vec<RemoteFile>> {
        self.check_online()?;
        let mut state = self.lock()?;
        state.stats.list += 1;
        Ok(state
            .files
            .iter()
            .map(|(id, f)| MemoryState::to_remote(id, f))
            .filter(|f| filter.matches(f))
            .collect())
    }

    async fn create(&self, file: NewFile) -> CloudResult<String> {
        self.check_online()?;
        let mut state = self.lock()?;
        state.stats.create += 1;
        let now = state.tick();
        let id = format!("file-{}-{}", state.next_id, uuid::Uuid::new_v4().simple());
        state.next_id += 1;
        state.files.insert(
            id.clone(),
            StoredFile {
                name: file.name,
                parents: file.folder.into_iter().collect(),
                mime_type: file.mime_type,
                content: file.content,
                modified_time: now,
            },
        );
        Ok(id)
    }

    async fn read(&self, file_id: &str) -> CloudResult<String> {
        self.check_online()?;
        let mut state = self.lock()?;
        state.stats.read += 1;
        *state
            .stats
            .reads_by_id
            .entry(file_id.to_string())
            .or_default() += 1;
        state
            .files
            .get(file_id)
            .map(|f| f.content.clone())
            .ok_or_else(|| CloudError::NotFound(format!("file {file_id}")))
    }

    async fn update(&self, file_id: &str, mime_type: &str, content: String) -> CloudResult<String> {
        self.check_online()?;
        let mut state = self.lock()?;
        state.stats.update += 1;
        *state
            .stats
            .updates_by_id
            .entry(file_id.to_string())
            .or_default() += 1;
        let now = state.tick();
        let file = state
            .files
            .get_mut(file_id)
            .ok_or_else(|| CloudError::NotFound(format!("file {file_id}")))?;
        file.mime_type = mime_type.to_string();
        file.content = content;
        file.modified_time = now;
        Ok(file_id.to_string())
    }
}
