//! Last observed modification time of the remote index.

use crate::error::{CloudError, CloudResult};
use chrono::{DateTime, SecondsFormat, Utc};
use shelfsync_storage::KvStore;
use std::sync::Arc;
use tracing::debug;

/// Persisted, monotonically non-decreasing timestamp.
pub struct LastModifiedMarker {
    value: Option<DateTime<Utc>>,
    kv: Arc<dyn KvStore>,
    storage_key: String,
}

impl LastModifiedMarker {
    pub fn load(kv: Arc<dyn KvStore>, storage_key: String) -> CloudResult<Self> {
        let value = match kv.get(&storage_key)? {
            Some(raw) => Some(
                DateTime::parse_from_rfc3339(&raw)
                    .map_err(|e| CloudError::Config(format!("bad stored timestamp {raw:?}: {e}")))?
                    .with_timezone(&Utc),
            ),
            None => None,
        };
        Ok(Self {
            value,
            kv,
            storage_key,
        })
    }

    pub fn get(&self) -> Option<DateTime<Utc>> {
        self.value
    }

    /// Moves the marker forward to `observed`. Older timestamps are ignored.
    /// Returns true if the marker changed.
    pub fn advance(&mut self, observed: DateTime<Utc>) -> CloudResult<bool> {
        if self.value.is_some_and(|current| observed <= current) {
            return Ok(false);
        }
        self.kv.set(
            &self.storage_key,
            &observed.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        )?;
        self.value = Some(observed);
        debug!("last known index modification advanced to {observed}");
        Ok(true)
    }
}
