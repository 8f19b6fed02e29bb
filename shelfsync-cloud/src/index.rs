//! The remote index document: key → content file identity and digest.

use crate::error::CloudResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Catalog entry for one synchronized key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawIndexEntry")]
pub struct IndexEntry {
    /// Id of the key's content file. Older documents may lack it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
    pub content_hash: String,
}

/// Accepts both entry shapes: the full object and a bare hash string
/// written by early clients.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawIndexEntry {
    Full {
        #[serde(rename = "fileId", default)]
        file_id: Option<String>,
        #[serde(rename = "contentHash")]
        content_hash: String,
    },
    HashOnly(String),
}

impl From<RawIndexEntry> for IndexEntry {
    fn from(raw: RawIndexEntry) -> Self {
        match raw {
            RawIndexEntry::Full {
                file_id,
                content_hash,
            } => Self {
                file_id,
                content_hash,
            },
            RawIndexEntry::HashOnly(content_hash) => Self {
                file_id: None,
                content_hash,
            },
        }
    }
}

/// Parsed index document.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IndexDocument {
    entries: BTreeMap<String, IndexEntry>,
}

impl IndexDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses the remote file content. Empty content is an empty document.
    pub fn parse(content: &str) -> CloudResult<Self> {
        if content.trim().is_empty() {
            return Ok(Self::new());
        }
        Ok(serde_json::from_str(content)?)
    }

    pub fn to_json(&self) -> CloudResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn get(&self, key: &str) -> Option<&IndexEntry> {
        self.entries.get(key)
    }

    /// Returns true if the key's recorded digest equals `hash`.
    pub fn hash_matches(&self, key: &str, hash: &str) -> bool {
        self.entries
            .get(key)
            .is_some_and(|e| e.content_hash == hash)
    }

    pub fn insert(&mut self, key: impl Into<String>, entry: IndexEntry) {
        self.entries.insert(key.into(), entry);
    }

    /// Applies a set of changed entries in one pass.
    pub fn apply<I>(&mut self, changes: I)
    where
        I: IntoIterator<Item = (String, IndexEntry)>,
    {
        self.entries.extend(changes);
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
