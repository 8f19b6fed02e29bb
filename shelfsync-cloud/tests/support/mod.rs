//! Shared helpers: an engine wired to an in-memory backend and store.

#![allow(dead_code)]

use shelfsync_cloud::{
    FolderProvider, MemoryBackend, RemoteStore, SessionState, StaticFolder, SyncConfig, SyncEngine,
};
use shelfsync_storage::{KvStore, MemoryKvStore};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

pub const FOLDER: &str = "folder-1";

/// Engine plus handles to everything it talks to.
pub struct Harness {
    pub engine: SyncEngine,
    pub backend: Arc<MemoryBackend>,
    pub kv: Arc<MemoryKvStore>,
    pub session: Arc<SessionState>,
}

pub fn config() -> SyncConfig {
    SyncConfig {
        folder_id: Some(FOLDER.into()),
        ..SyncConfig::default()
    }
}

pub fn harness() -> Harness {
    harness_with(config())
}

pub fn harness_with(config: SyncConfig) -> Harness {
    device(Arc::new(MemoryBackend::new()), config)
}

/// A second engine sharing the remote backend but with its own local state.
pub fn device(backend: Arc<MemoryBackend>, config: SyncConfig) -> Harness {
    reopen(backend, Arc::new(MemoryKvStore::new()), config)
}

/// Routes engine logs to the test writer. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("shelfsync_cloud=debug")),
        )
        .with_test_writer()
        .try_init();
}

/// An engine over existing local state, as after a restart.
pub fn reopen(backend: Arc<MemoryBackend>, kv: Arc<MemoryKvStore>, config: SyncConfig) -> Harness {
    init_tracing();
    let session = Arc::new(SessionState::ready());
    let engine = SyncEngine::new(
        config,
        kv.clone(),
        backend.clone(),
        session.clone(),
        Arc::new(StaticFolder(FOLDER.into())),
    )
    .expect("engine must build");
    Harness {
        engine,
        backend,
        kv,
        session,
    }
}

pub fn remote_store(
    backend: Arc<MemoryBackend>,
    kv: Arc<dyn KvStore>,
    provider: Arc<dyn FolderProvider>,
    config: SyncConfig,
) -> RemoteStore {
    RemoteStore::new(backend, kv, provider, config)
}

/// Parsed index content as stored remotely.
pub fn index_json(backend: &MemoryBackend) -> serde_json::Value {
    let index = backend.find("index").expect("index file exists");
    let content = backend.content(&index.id).expect("index content");
    serde_json::from_str(&content).expect("index is json")
}
