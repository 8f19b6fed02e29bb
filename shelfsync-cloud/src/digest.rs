//! Content digests over canonical value text.

use crate::error::CloudResult;
use sha2::{Digest, Sha256};
use shelfsync_storage::Value;

/// SHA-256 hex digest of a string.
pub fn digest_text(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

/// Digest of a value's canonical form, or `None` for values that are never pushed.
pub fn content_digest(value: &Value) -> CloudResult<Option<String>> {
    Ok(value.to_canonical()?.map(|text| digest_text(&text)))
}
