mod support;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde_json::json;
use shelfsync_cloud::digest::digest_text;
use shelfsync_cloud::{
    CloudError, CloudResult, FileFilter, FolderProvider, LoadEntry, MemoryBackend, NewFile,
    NoPrompt, RemoteFile, RemoteFileBackend, RemoteStore, SaveEntry, StaticFolder, SyncConfig,
};
use shelfsync_storage::{KvStore, MemoryKvStore, Value};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use support::*;

fn counting_prompt(answer: Option<&str>) -> (Arc<dyn FolderProvider>, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let answer = answer.map(str::to_string);
    let provider: Arc<dyn FolderProvider> = Arc::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        answer.clone()
    });
    (provider, calls)
}

fn unprompted() -> SyncConfig {
    SyncConfig {
        folder_id: None,
        ..SyncConfig::default()
    }
}

// --- Index provisioning ---

#[tokio::test]
async fn index_is_provisioned_once_and_folder_persisted() {
    let backend = Arc::new(MemoryBackend::new());
    let kv: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
    let (provider, calls) = counting_prompt(Some("  chosen  "));

    let mut store = remote_store(backend.clone(), kv.clone(), provider.clone(), unprompted());
    let first = store.ensure_index().await.unwrap();
    let second = store.ensure_index().await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.folder_id.as_deref(), Some("chosen"));
    assert_eq!(backend.stats().create, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(kv.get("shelfsync.folderId").unwrap().as_deref(), Some("chosen"));

    let index = backend.find("index").unwrap();
    assert_eq!(backend.content(&index.id).unwrap(), "{}");
    assert_eq!(backend.mime_type(&index.id).unwrap(), "application/json");

    // A new session finds the existing index without prompting.
    let mut later = remote_store(backend.clone(), kv, provider, unprompted());
    assert_eq!(later.ensure_index().await.unwrap().file_id, first.file_id);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(backend.stats().create, 1);
}

#[tokio::test]
async fn declined_prompt_is_folder_unavailable() {
    let backend = Arc::new(MemoryBackend::new());
    let kv: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
    let (provider, calls) = counting_prompt(None);

    let mut store = remote_store(backend.clone(), kv.clone(), provider, unprompted());
    let err = store.ensure_index().await.unwrap_err();
    assert!(matches!(err, CloudError::FolderUnavailable));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(backend.file_count(), 0);
    assert_eq!(kv.get("shelfsync.folderId").unwrap(), None);
}

#[tokio::test]
async fn blank_prompt_answer_is_declined() {
    let backend = Arc::new(MemoryBackend::new());
    let (provider, _) = counting_prompt(Some("   "));
    let mut store = remote_store(
        backend,
        Arc::new(MemoryKvStore::new()),
        provider,
        unprompted(),
    );
    assert!(matches!(
        store.ensure_index().await.unwrap_err(),
        CloudError::FolderUnavailable
    ));
}

#[tokio::test]
async fn private_space_never_prompts() {
    let backend = Arc::new(MemoryBackend::new());
    let config = SyncConfig {
        use_private: true,
        ..unprompted()
    };
    let mut store = remote_store(
        backend.clone(),
        Arc::new(MemoryKvStore::new()),
        Arc::new(NoPrompt),
        config,
    );

    let handle = store.ensure_index().await.unwrap();
    assert_eq!(handle.folder_id.as_deref(), Some("appDataFolder"));
    assert_eq!(backend.find("index").unwrap().parents, vec!["appDataFolder"]);
}

#[tokio::test]
async fn vanished_index_is_resolved_again() {
    let backend = Arc::new(MemoryBackend::new());
    let mut store = remote_store(
        backend.clone(),
        Arc::new(MemoryKvStore::new()),
        Arc::new(StaticFolder(FOLDER.into())),
        config(),
    );
    let first = store.ensure_index().await.unwrap();
    assert!(backend.delete_external(&first.file_id));

    let err = store.index_modified_time().await.unwrap_err();
    assert!(matches!(err, CloudError::NotFound(_)));
    assert!(store.cached_handle().is_none());

    let second = store.ensure_index().await.unwrap();
    assert_ne!(second.file_id, first.file_id);
}

// --- load ---

#[tokio::test]
async fn load_short_circuits_on_known_timestamp() {
    let h = harness();
    h.engine.save_remote("k", Value::from("v")).await.unwrap();

    let mut store = remote_store(
        h.backend.clone(),
        Arc::new(MemoryKvStore::new()),
        Arc::new(NoPrompt),
        config(),
    );
    let modified = store.index_modified_time().await.unwrap();
    h.backend.reset_stats();

    let entries = [LoadEntry::new("k", Value::from("local"))];
    let outcome = store.load(&entries, Some(modified), false).await.unwrap();
    assert!(!outcome.index_read);
    assert_eq!(outcome.values, vec![Value::from("local")]);
    assert_eq!(outcome.observed, modified);
    assert_eq!(h.backend.stats().read, 0);

    let forced = store.load(&entries, Some(modified), true).await.unwrap();
    assert!(forced.index_read);
    assert_eq!(forced.values, vec![Value::from("v")]);
}

#[tokio::test]
async fn load_reuses_cached_index_while_timestamp_holds() {
    let h = harness();
    h.engine.save_remote("k", Value::from("v")).await.unwrap();
    let index_id = h.backend.find("index").unwrap().id;
    h.backend.reset_stats();

    let mut store = remote_store(
        h.backend.clone(),
        Arc::new(MemoryKvStore::new()),
        Arc::new(NoPrompt),
        config(),
    );
    let entries = [LoadEntry::new("k", Value::Undefined)];
    store.load(&entries, None, false).await.unwrap();
    store.load(&entries, None, false).await.unwrap();
    assert_eq!(h.backend.stats().reads_of(&index_id), 1);

    // Another device moves the index; the cache is refreshed.
    h.engine.save_remote("k", Value::from("w")).await.unwrap();
    h.backend.reset_stats();
    let outcome = store.load(&entries, None, false).await.unwrap();
    assert_eq!(outcome.values, vec![Value::from("w")]);
    assert_eq!(h.backend.stats().reads_of(&index_id), 1);
}

#[tokio::test]
async fn legacy_hash_only_entry_falls_back_to_name_lookup() {
    let backend = Arc::new(MemoryBackend::new());
    let hash = digest_text("\"legacy\"");
    backend
        .put_external("index", Some(FOLDER), &json!({ "k": hash }).to_string())
        .unwrap();
    backend
        .put_external("k.data", Some(FOLDER), "\"legacy\"")
        .unwrap();

    let mut store = remote_store(
        backend,
        Arc::new(MemoryKvStore::new()),
        Arc::new(NoPrompt),
        config(),
    );
    let outcome = store
        .load(&[LoadEntry::new("k", Value::Undefined)], None, false)
        .await
        .unwrap();
    assert_eq!(outcome.values, vec![Value::from("legacy")]);
}

#[tokio::test]
async fn entry_without_any_content_file_reads_as_undefined() {
    let backend = Arc::new(MemoryBackend::new());
    backend
        .put_external("index", Some(FOLDER), r#"{"ghost":{"contentHash":"abc"}}"#)
        .unwrap();

    let mut store = remote_store(
        backend,
        Arc::new(MemoryKvStore::new()),
        Arc::new(NoPrompt),
        config(),
    );
    let outcome = store
        .load(&[LoadEntry::new("ghost", Value::from("local"))], None, false)
        .await
        .unwrap();
    assert_eq!(outcome.values, vec![Value::Undefined]);
}

// --- save ---

#[tokio::test]
async fn save_keeps_last_value_per_key() {
    let backend = Arc::new(MemoryBackend::new());
    let mut store = remote_store(
        backend.clone(),
        Arc::new(MemoryKvStore::new()),
        Arc::new(NoPrompt),
        config(),
    );
    let outcome = store
        .save(&[
            SaveEntry::new("a", Value::from(1)),
            SaveEntry::new("b", Value::from(2)),
            SaveEntry::new("a", Value::from(3)),
        ])
        .await
        .unwrap();

    assert_eq!(outcome.uploaded, vec!["b", "a"]);
    let file = backend.find("a.data").unwrap();
    assert_eq!(backend.content(&file.id).unwrap(), "3");
}

#[tokio::test]
async fn save_skips_unsupported_values() {
    let backend = Arc::new(MemoryBackend::new());
    let mut store = remote_store(
        backend.clone(),
        Arc::new(MemoryKvStore::new()),
        Arc::new(NoPrompt),
        config(),
    );
    let outcome = store
        .save(&[SaveEntry::new("fn", Value::Unsupported("callable".into()))])
        .await
        .unwrap();

    assert!(outcome.uploaded.is_empty());
    assert!(backend.find("fn.data").is_none());
}

#[tokio::test]
async fn save_recreates_vanished_content_file() {
    let backend = Arc::new(MemoryBackend::new());
    let mut store = remote_store(
        backend.clone(),
        Arc::new(MemoryKvStore::new()),
        Arc::new(NoPrompt),
        config(),
    );
    store.save(&[SaveEntry::new("k", Value::from("v1"))]).await.unwrap();
    let old = backend.find("k.data").unwrap();
    assert!(backend.delete_external(&old.id));

    store.save(&[SaveEntry::new("k", Value::from("v2"))]).await.unwrap();
    let new = backend.find("k.data").unwrap();
    assert_ne!(new.id, old.id);
    assert_eq!(index_json(&backend)["k"]["fileId"], json!(new.id));
}

#[tokio::test]
async fn save_reports_index_timestamp_after_write() {
    let backend = Arc::new(MemoryBackend::new());
    let mut store = remote_store(
        backend.clone(),
        Arc::new(MemoryKvStore::new()),
        Arc::new(NoPrompt),
        config(),
    );
    let outcome = store.save(&[SaveEntry::new("k", Value::from(true))]).await.unwrap();
    assert_eq!(outcome.observed, backend.find("index").unwrap().modified_time);
    assert_eq!(store.index_modified_time().await.unwrap(), outcome.observed);
}

/// Backend where another device rewrites the index right after our next
/// index update, adding its own `z` entry.
struct InterleavedWriter {
    inner: Arc<MemoryBackend>,
    armed: AtomicBool,
}

impl InterleavedWriter {
    fn write_foreign_entry(&self, index_id: &str) {
        let z_id = self.inner.put_external("z.data", Some(FOLDER), "\"z\"").unwrap();
        let mut index: serde_json::Value =
            serde_json::from_str(&self.inner.content(index_id).unwrap()).unwrap();
        index["z"] = json!({ "fileId": z_id, "contentHash": digest_text("\"z\"") });
        self.inner
            .put_external("index", Some(FOLDER), &index.to_string())
            .unwrap();
    }
}

#[async_trait]
impl RemoteFileBackend for InterleavedWriter {
    async fn list(&self, filter: &FileFilter) -> CloudResult<Vec<RemoteFile>> {
        self.inner.list(filter).await
    }

    async fn create(&self, file: NewFile) -> CloudResult<String> {
        self.inner.create(file).await
    }

    async fn read(&self, file_id: &str) -> CloudResult<String> {
        self.inner.read(file_id).await
    }

    async fn update(&self, file_id: &str, mime_type: &str, content: String) -> CloudResult<String> {
        let id = self.inner.update(file_id, mime_type, content).await?;
        let is_index = self.inner.find("index").is_some_and(|f| f.id == file_id);
        if is_index && self.armed.swap(false, Ordering::SeqCst) {
            self.write_foreign_entry(file_id);
        }
        Ok(id)
    }
}

#[tokio::test]
async fn index_write_from_another_device_after_ours_is_kept() {
    let memory = Arc::new(MemoryBackend::new());
    let backend = Arc::new(InterleavedWriter {
        inner: memory.clone(),
        armed: AtomicBool::new(true),
    });
    let mut store = RemoteStore::new(
        backend,
        Arc::new(MemoryKvStore::new()),
        Arc::new(NoPrompt),
        config(),
    );

    store
        .save(&[
            SaveEntry::new("a", Value::from(1)),
            SaveEntry::new("b", Value::from(2)),
        ])
        .await
        .unwrap();
    let index = index_json(&memory);
    assert!(index.get("z").is_some());

    store.save(&[SaveEntry::new("c", Value::from(3))]).await.unwrap();

    let index = index_json(&memory);
    let mut keys: Vec<&str> = index.as_object().unwrap().keys().map(String::as_str).collect();
    keys.sort();
    assert_eq!(keys, vec!["a", "b", "c", "z"]);
    let z_file = memory.find("z.data").unwrap();
    assert_eq!(index["z"]["fileId"], json!(z_file.id));
}
