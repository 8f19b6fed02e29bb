//! Durable set of keys with unpushed local changes.
//!
//! Keys keep their first-marked order so pushes are deterministic. Every
//! mutation is written through to the persistence port before the in-memory
//! copy changes, so a failed write leaves both sides agreeing.

use crate::error::CloudResult;
use shelfsync_storage::KvStore;
use std::sync::Arc;
use tracing::debug;

/// Ordered, persisted set of dirty keys.
pub struct DirtySet {
    keys: Vec<String>,
    kv: Arc<dyn KvStore>,
    storage_key: String,
}

impl DirtySet {
    /// Loads the set persisted under `storage_key` (empty when absent).
    pub fn load(kv: Arc<dyn KvStore>, storage_key: String) -> CloudResult<Self> {
        let keys = match kv.get(&storage_key)? {
            Some(raw) => serde_json::from_str(&raw)?,
            None => Vec::new(),
        };
        Ok(Self {
            keys,
            kv,
            storage_key,
        })
    }

    fn persist(&self, keys: &[String]) -> CloudResult<()> {
        if keys.is_empty() {
            self.kv.delete(&self.storage_key)?;
        } else {
            self.kv.set(&self.storage_key, &serde_json::to_string(keys)?)?;
        }
        Ok(())
    }

    /// Marks a key dirty. Returns true if it was not already marked.
    pub fn mark(&mut self, key: &str) -> CloudResult<bool> {
        if self.contains(key) {
            return Ok(false);
        }
        let mut next = self.keys.clone();
        next.push(key.to_string());
        self.persist(&next)?;
        self.keys = next;
        debug!("marked {key} dirty ({} pending)", self.keys.len());
        Ok(true)
    }

    /// Removes a key. Returns true if it was marked.
    pub fn unmark(&mut self, key: &str) -> CloudResult<bool> {
        if !self.contains(key) {
            return Ok(false);
        }
        let next: Vec<String> = self.keys.iter().filter(|k| *k != key).cloned().collect();
        self.persist(&next)?;
        self.keys = next;
        Ok(true)
    }

    /// Removes every listed key that is marked.
    pub fn clear_keys(&mut self, keys: &[String]) -> CloudResult<()> {
        let next: Vec<String> = self
            .keys
            .iter()
            .filter(|k| !keys.contains(k))
            .cloned()
            .collect();
        if next.len() == self.keys.len() {
            return Ok(());
        }
        self.persist(&next)?;
        self.keys = next;
        Ok(())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.iter().any(|k| k == key)
    }

    /// Returns the dirty keys in marking order.
    pub fn snapshot(&self) -> Vec<String> {
        self.keys.clone()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
