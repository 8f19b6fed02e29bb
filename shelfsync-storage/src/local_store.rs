//! Typed local cache of key/value records.
//!
//! Each key maps to a single port entry holding both the type tag and the
//! serialized value, so a record is either fully present or absent.

use crate::error::{StorageError, StorageResult};
use crate::kv_store::KvStore;
use crate::value::{TypeTag, Value};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Persisted form of a value: type tag plus serialized text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalRecord {
    #[serde(rename = "type")]
    pub type_tag: TypeTag,
    pub value: String,
}

impl LocalRecord {
    /// Encodes a value. Returns `None` for kinds that are never stored.
    pub fn encode(value: &Value) -> StorageResult<Option<Self>> {
        let (type_tag, text) = match value {
            Value::String(s) => (TypeTag::String, s.clone()),
            Value::Number(n) => (TypeTag::Number, n.to_string()),
            Value::Boolean(b) => (TypeTag::Boolean, b.to_string()),
            Value::Object(json) => (TypeTag::Object, serde_json::to_string(json)?),
            Value::BigInt(big) => (TypeTag::BigInt, big.to_string()),
            Value::Undefined | Value::Unsupported(_) => return Ok(None),
        };
        Ok(Some(Self {
            type_tag,
            value: text,
        }))
    }

    /// Reconstructs the value this record was encoded from.
    pub fn decode(&self, key: &str) -> StorageResult<Value> {
        let invalid = |reason: String| StorageError::InvalidRecord {
            key: key.to_string(),
            reason,
        };

        match self.type_tag {
            TypeTag::String => Ok(Value::String(self.value.clone())),
            TypeTag::Number => serde_json::from_str(&self.value)
                .map(Value::Number)
                .map_err(|e| invalid(format!("bad number {:?}: {e}", self.value))),
            TypeTag::Boolean => match self.value.as_str() {
                "true" => Ok(Value::Boolean(true)),
                "false" => Ok(Value::Boolean(false)),
                other => Err(invalid(format!("bad boolean {other:?}"))),
            },
            TypeTag::Object => Ok(Value::Object(serde_json::from_str(&self.value)?)),
            TypeTag::BigInt => Ok(Value::BigInt(self.value.parse()?)),
        }
    }
}

/// Typed key/value cache over a [`KvStore`].
#[derive(Clone)]
pub struct LocalStore {
    kv: Arc<dyn KvStore>,
    record_prefix: String,
}

impl LocalStore {
    /// Creates a local store whose records live under `<prefix>.record.`.
    pub fn new(kv: Arc<dyn KvStore>, prefix: &str) -> Self {
        Self {
            kv,
            record_prefix: format!("{prefix}.record."),
        }
    }

    fn record_key(&self, key: &str) -> String {
        format!("{}{key}", self.record_prefix)
    }

    /// Loads a value, returning [`Value::Undefined`] when no record exists.
    pub fn load(&self, key: &str) -> StorageResult<Value> {
        match self.kv.get(&self.record_key(key))? {
            Some(raw) => {
                let record: LocalRecord = serde_json::from_str(&raw)?;
                record.decode(key)
            }
            None => Ok(Value::Undefined),
        }
    }

    /// Saves a value. `Undefined` removes the record; unsupported kinds are ignored.
    pub fn save(&self, key: &str, value: &Value) -> StorageResult<()> {
        if value.is_unsupported() {
            debug!("ignoring save of unsupported value kind for {key}");
            return Ok(());
        }

        match LocalRecord::encode(value)? {
            Some(record) => {
                let raw = serde_json::to_string(&record)?;
                self.kv.set(&self.record_key(key), &raw)
            }
            None => self.remove(key),
        }
    }

    /// Deletes the record for a key.
    pub fn remove(&self, key: &str) -> StorageResult<()> {
        self.kv.delete(&self.record_key(key))
    }

    /// Returns true if a record exists for the key.
    pub fn contains(&self, key: &str) -> StorageResult<bool> {
        Ok(self.kv.get(&self.record_key(key))?.is_some())
    }

    /// Lists the keys that currently have a record.
    pub fn keys(&self) -> StorageResult<Vec<String>> {
        Ok(self
            .kv
            .keys_with_prefix(&self.record_prefix)?
            .into_iter()
            .filter_map(|k| k.strip_prefix(&self.record_prefix).map(str::to_string))
            .collect())
    }
}
