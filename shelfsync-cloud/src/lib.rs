//! Remote sync engine for shelfsync.
//!
//! Mirrors a local key/value space to a remote file store with:
//! - A single index document mapping each key to its content file and digest
//! - Batched remote reads that skip content whose digest matches local
//! - A freshness check that skips the index entirely when nothing moved
//! - A durable dirty set so unpushed edits survive restarts
//! - Pluggable conflict policy for remote values meeting local edits
//! - Optional background auto-sync

pub mod auto_sync;
pub mod backend;
pub mod config;
pub mod digest;
pub mod dirty_set;
pub mod drive_backend;
pub mod error;
pub mod folder;
pub mod index;
pub mod marker;
pub mod memory_backend;
pub mod policy;
pub mod remote_store;
pub mod session;
pub mod sync_engine;
pub mod types;

pub use auto_sync::{AutoSync, AutoSyncHandle, create_auto_sync};
pub use backend::RemoteFileBackend;
pub use config::SyncConfig;
pub use drive_backend::DriveBackend;
pub use error::{CloudError, CloudResult};
pub use folder::{FolderProvider, NoPrompt, StaticFolder};
pub use index::{IndexDocument, IndexEntry};
pub use memory_backend::MemoryBackend;
pub use policy::{Candidate, ConflictPolicy, ConflictResolver, Resolution};
pub use remote_store::RemoteStore;
pub use session::{SessionGate, SessionState};
pub use sync_engine::SyncEngine;
pub use types::*;
