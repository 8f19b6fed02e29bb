//! Sync engine: local reads and writes plus batched remote push/pull.
//!
//! Local operations (`load`, `save`, `remove`) never touch the network.
//! `save` marks a key dirty only when its value actually changes, and the
//! dirty set is what `sync_remote`/`save_remote` push, all in one batch.
//! Remote reads go through the configured [`ConflictPolicy`].
//!
//! Remote operations are serialized through one async mutex around the
//! remote store, so index read-modify-write cycles never interleave. Local
//! state (dirty set, marker) sits behind a short synchronous lock that is
//! never held across an await.

use crate::backend::RemoteFileBackend;
use crate::config::SyncConfig;
use crate::dirty_set::DirtySet;
use crate::error::{CloudError, CloudResult};
use crate::folder::FolderProvider;
use crate::marker::LastModifiedMarker;
use crate::policy::{Candidate, ConflictPolicy, ConflictResolver, Resolution};
use crate::remote_store::RemoteStore;
use crate::session::SessionGate;
use crate::types::{LoadEntry, PushReport, SaveEntry};
use chrono::{DateTime, Utc};
use shelfsync_storage::{KvStore, LocalStore, StorageError, Value};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

struct EngineState {
    dirty: DirtySet,
    marker: LastModifiedMarker,
}

/// Local key/value store with remote mirroring.
pub struct SyncEngine {
    local: LocalStore,
    state: Mutex<EngineState>,
    remote: tokio::sync::Mutex<RemoteStore>,
    session: Arc<dyn SessionGate>,
    policy: ConflictPolicy,
    resolver: Option<Arc<dyn ConflictResolver>>,
}

impl SyncEngine {
    /// Creates an engine, restoring the dirty set and marker from `kv`.
    pub fn new(
        config: SyncConfig,
        kv: Arc<dyn KvStore>,
        backend: Arc<dyn RemoteFileBackend>,
        session: Arc<dyn SessionGate>,
        folder_provider: Arc<dyn FolderProvider>,
    ) -> CloudResult<Self> {
        config.validate()?;

        let dirty = DirtySet::load(kv.clone(), config.dirty_key())?;
        let marker = LastModifiedMarker::load(kv.clone(), config.last_modified_key())?;
        if !dirty.is_empty() {
            info!("restored {} dirty keys from previous session", dirty.len());
        }

        Ok(Self {
            local: LocalStore::new(kv.clone(), &config.state_prefix),
            state: Mutex::new(EngineState { dirty, marker }),
            policy: config.conflict_policy,
            remote: tokio::sync::Mutex::new(RemoteStore::new(backend, kv, folder_provider, config)),
            session,
            resolver: None,
        })
    }

    /// Installs the resolver used by [`ConflictPolicy::Manual`].
    pub fn with_resolver(mut self, resolver: Arc<dyn ConflictResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    fn state(&self) -> CloudResult<MutexGuard<'_, EngineState>> {
        self.state
            .lock()
            .map_err(|e| StorageError::Lock(e.to_string()).into())
    }

    pub fn policy(&self) -> ConflictPolicy {
        self.policy
    }

    /// Keys waiting to be pushed, in marking order.
    pub fn dirty_keys(&self) -> CloudResult<Vec<String>> {
        Ok(self.state()?.dirty.snapshot())
    }

    pub fn is_dirty(&self, key: &str) -> CloudResult<bool> {
        Ok(self.state()?.dirty.contains(key))
    }

    /// Last index modification time this engine has confirmed.
    pub fn last_known_modified(&self) -> CloudResult<Option<DateTime<Utc>>> {
        Ok(self.state()?.marker.get())
    }

    // ── Local ──

    /// Reads the local record. Never touches the network.
    pub fn load(&self, key: &str) -> CloudResult<Value> {
        Ok(self.local.load(key)?)
    }

    /// Writes a value locally, marking the key dirty if the value changed.
    ///
    /// Returns true if anything was written.
    pub fn save(&self, key: &str, value: Value) -> CloudResult<bool> {
        if value.is_unsupported() {
            debug!("ignoring unsupported value for {key}");
            return Ok(false);
        }

        let mut state = self.state()?;
        if self.local.load(key)? == value {
            return Ok(false);
        }
        state.dirty.mark(key)?;
        self.local.save(key, &value)?;
        Ok(true)
    }

    /// Deletes the local record and forgets any pending push for it.
    pub fn remove(&self, key: &str) -> CloudResult<()> {
        let mut state = self.state()?;
        state.dirty.unmark(key)?;
        self.local.remove(key)?;
        Ok(())
    }

    // ── Remote ──

    /// Fetches one key from remote, applying the conflict policy.
    pub async fn load_remote(&self, key: &str) -> CloudResult<Value> {
        let mut values = self.fetch(&[key], false).await?;
        values.pop().ok_or_else(|| CloudError::Backend(format!("no value returned for {key}")))
    }

    /// Fetches several keys in one batch. Results follow the input order.
    pub async fn load_remote_many(&self, keys: &[&str]) -> CloudResult<Vec<Value>> {
        self.fetch(keys, false).await
    }

    /// Like [`load_remote`](Self::load_remote), but always checks content
    /// even when the index timestamp has not moved.
    pub async fn load_remote_force(&self, key: &str) -> CloudResult<Value> {
        let mut values = self.fetch(&[key], true).await?;
        values.pop().ok_or_else(|| CloudError::Backend(format!("no value returned for {key}")))
    }

    /// Batch form of [`load_remote_force`](Self::load_remote_force).
    pub async fn load_remote_many_force(&self, keys: &[&str]) -> CloudResult<Vec<Value>> {
        self.fetch(keys, true).await
    }

    async fn fetch(&self, keys: &[&str], force: bool) -> CloudResult<Vec<Value>> {
        self.session.check()?;
        if self.policy == ConflictPolicy::Manual && self.resolver.is_none() {
            return Err(CloudError::Config(
                "manual conflict policy requires a resolver".to_string(),
            ));
        }
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut remote = self.remote.lock().await;
        let (entries, last_known) = {
            let state = self.state()?;
            let entries = keys
                .iter()
                .map(|k| Ok::<_, CloudError>(LoadEntry::new(*k, self.local.load(k)?)))
                .collect::<CloudResult<Vec<_>>>()?;
            (entries, state.marker.get())
        };

        let outcome = remote.load(&entries, last_known, force).await?;
        drop(remote);

        let mut state = self.state()?;
        let mut results = Vec::with_capacity(entries.len());
        for (entry, remote_value) in entries.iter().zip(outcome.values) {
            let current = self.local.load(&entry.key)?;
            // Remote confirmed the value we sent; keep any newer local edit.
            if remote_value == entry.local {
                results.push(current);
                continue;
            }
            let candidate = Candidate {
                key: &entry.key,
                local: &current,
                remote: &remote_value,
                dirty: state.dirty.contains(&entry.key),
            };
            let resolution = match self.policy.resolve(candidate) {
                Some(resolution) => resolution,
                None => match self.resolver {
                    Some(ref resolver) => resolver.resolve(candidate),
                    None => Resolution::KeepLocal,
                },
            };

            match resolution {
                Resolution::KeepLocal => results.push(current),
                Resolution::Replace(value) => {
                    debug!("{} replaced by remote value ({})", entry.key, self.policy);
                    // A merged value is a local change the remote has not seen.
                    if value != remote_value {
                        state.dirty.mark(&entry.key)?;
                    }
                    self.local.save(&entry.key, &value)?;
                    results.push(value);
                }
            }
        }
        state.marker.advance(outcome.observed)?;

        Ok(results)
    }

    /// Writes a value locally, then pushes it together with every dirty key.
    pub async fn save_remote(&self, key: &str, value: Value) -> CloudResult<PushReport> {
        self.session.check()?;
        self.save(key, value)?;
        self.push(Some(key)).await
    }

    /// Pushes the dirty keys. Does nothing when none are pending.
    pub async fn sync_remote(&self) -> CloudResult<PushReport> {
        let clean = self.state()?.dirty.is_empty();
        if clean {
            debug!("nothing dirty, skipping sync");
            return Ok(PushReport::default());
        }
        self.session.check()?;
        self.push(None).await
    }

    async fn push(&self, extra: Option<&str>) -> CloudResult<PushReport> {
        let mut remote = self.remote.lock().await;

        let entries = {
            let state = self.state()?;
            let mut keys = state.dirty.snapshot();
            if let Some(key) = extra {
                if !keys.iter().any(|k| k == key) {
                    keys.push(key.to_string());
                }
            }
            keys.into_iter()
                .map(|k| {
                    let value = self.local.load(&k)?;
                    Ok::<_, CloudError>(SaveEntry::new(k, value))
                })
                .collect::<CloudResult<Vec<_>>>()?
        };
        if entries.is_empty() {
            return Ok(PushReport::default());
        }

        let outcome = remote.save(&entries).await?;
        drop(remote);

        let mut state = self.state()?;
        // With nothing uploaded we never read the index, so its timestamp
        // may cover entries this device has not seen.
        if !outcome.uploaded.is_empty() {
            state.marker.advance(outcome.observed)?;
        }

        // A key edited while its push was in flight stays dirty.
        let mut settled = Vec::with_capacity(entries.len());
        for entry in &entries {
            if self.local.load(&entry.key)? == entry.value {
                settled.push(entry.key.clone());
            }
        }
        state.dirty.clear_keys(&settled)?;

        info!(
            "push complete: {} keys pushed, {} uploaded",
            entries.len(),
            outcome.uploaded.len()
        );
        Ok(PushReport {
            pushed: entries.into_iter().map(|e| e.key).collect(),
            uploaded: outcome.uploaded,
        })
    }
}
