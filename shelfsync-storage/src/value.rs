//! Typed value model shared by the local store and the remote sync layer.
//!
//! Values are JSON-shaped, plus an arbitrary-precision integer kind that is
//! carried as normalized decimal text. Scalars always live in their own
//! variant (`Value::from(serde_json::Value)` classifies them), so derived
//! equality is the deep equality the sync engine compares with.

use crate::error::{StorageError, StorageResult};
use serde::{Deserialize, Serialize};
use serde_json::Number;
use std::fmt;
use std::str::FromStr;

/// Object key used to carry a big integer through canonical JSON.
const BIGINT_ENVELOPE_KEY: &str = "$bigint";

/// Object key that escapes a user map which would read back as an envelope.
const OBJECT_ENVELOPE_KEY: &str = "$object";

/// True for single-key maps whose key is one of the envelope keys.
fn looks_like_envelope(map: &serde_json::Map<String, serde_json::Value>) -> bool {
    map.len() == 1
        && (map.contains_key(BIGINT_ENVELOPE_KEY) || map.contains_key(OBJECT_ENVELOPE_KEY))
}

/// Arbitrary-precision integer in normalized decimal form.
///
/// Normalization strips a leading `+`, leading zeros and the sign of zero,
/// so two equal integers always compare equal as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BigInt(String);

impl BigInt {
    /// Returns the decimal representation.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_negative(&self) -> bool {
        self.0.starts_with('-')
    }
}

impl FromStr for BigInt {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (negative, digits) = match trimmed.as_bytes().first() {
            Some(b'-') => (true, &trimmed[1..]),
            Some(b'+') => (false, &trimmed[1..]),
            _ => (false, trimmed),
        };
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(StorageError::InvalidBigInt(s.to_string()));
        }

        let significant = digits.trim_start_matches('0');
        if significant.is_empty() {
            return Ok(Self("0".to_string()));
        }
        if negative {
            Ok(Self(format!("-{significant}")))
        } else {
            Ok(Self(significant.to_string()))
        }
    }
}

impl fmt::Display for BigInt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<i64> for BigInt {
    fn from(v: i64) -> Self {
        Self(v.to_string())
    }
}

impl From<i128> for BigInt {
    fn from(v: i128) -> Self {
        Self(v.to_string())
    }
}

impl From<u128> for BigInt {
    fn from(v: u128) -> Self {
        Self(v.to_string())
    }
}

/// Type tag persisted next to every local record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeTag {
    String,
    Number,
    Boolean,
    Object,
    #[serde(rename = "bigint")]
    BigInt,
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeTag::String => write!(f, "string"),
            TypeTag::Number => write!(f, "number"),
            TypeTag::Boolean => write!(f, "boolean"),
            TypeTag::Object => write!(f, "object"),
            TypeTag::BigInt => write!(f, "bigint"),
        }
    }
}

/// A value stored under a key.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// No value. Loading a missing key yields this; saving it removes the record.
    #[default]
    Undefined,
    String(String),
    Number(Number),
    Boolean(bool),
    /// `null`, arrays and maps.
    ///
    /// Build it through `Value::from(serde_json::Value)`, which moves scalars
    /// into their own variants. An `Object` wrapping a scalar never equals
    /// the matching scalar variant.
    Object(serde_json::Value),
    BigInt(BigInt),
    /// A handle that has no serialized form (callables, opaque symbols).
    /// Saves of this kind are ignored.
    Unsupported(String),
}

impl Value {
    /// Returns the persisted type tag, or `None` for kinds that are never stored.
    pub fn type_tag(&self) -> Option<TypeTag> {
        match self {
            Value::String(_) => Some(TypeTag::String),
            Value::Number(_) => Some(TypeTag::Number),
            Value::Boolean(_) => Some(TypeTag::Boolean),
            Value::Object(_) => Some(TypeTag::Object),
            Value::BigInt(_) => Some(TypeTag::BigInt),
            Value::Undefined | Value::Unsupported(_) => None,
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, Value::Unsupported(_))
    }

    /// Returns the JSON form of JSON-shaped kinds.
    pub fn to_json(&self) -> Option<serde_json::Value> {
        match self {
            Value::String(s) => Some(serde_json::Value::String(s.clone())),
            Value::Number(n) => Some(serde_json::Value::Number(n.clone())),
            Value::Boolean(b) => Some(serde_json::Value::Bool(*b)),
            Value::Object(serde_json::Value::Object(map)) if looks_like_envelope(map) => {
                let mut envelope = serde_json::Map::new();
                envelope.insert(
                    OBJECT_ENVELOPE_KEY.to_string(),
                    serde_json::Value::Object(map.clone()),
                );
                Some(serde_json::Value::Object(envelope))
            }
            Value::Object(v) => Some(v.clone()),
            Value::BigInt(b) => {
                let mut envelope = serde_json::Map::new();
                envelope.insert(
                    BIGINT_ENVELOPE_KEY.to_string(),
                    serde_json::Value::String(b.to_string()),
                );
                Some(serde_json::Value::Object(envelope))
            }
            Value::Undefined | Value::Unsupported(_) => None,
        }
    }

    /// Canonical text used for remote content files and content digests.
    ///
    /// JSON kinds serialize with sorted object keys. `Undefined` is the empty
    /// string. `Unsupported` has no canonical form.
    pub fn to_canonical(&self) -> StorageResult<Option<String>> {
        match self {
            Value::Undefined => Ok(Some(String::new())),
            Value::Unsupported(_) => Ok(None),
            other => match other.to_json() {
                Some(json) => Ok(Some(serde_json::to_string(&json)?)),
                None => Ok(None),
            },
        }
    }

    /// Parses canonical text produced by [`Value::to_canonical`].
    pub fn from_canonical(text: &str) -> StorageResult<Self> {
        if text.trim().is_empty() {
            return Ok(Value::Undefined);
        }
        let json: serde_json::Value = serde_json::from_str(text)?;
        Ok(Value::from(json))
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Number(n) => Value::Number(n),
            serde_json::Value::Bool(b) => Value::Boolean(b),
            serde_json::Value::Object(map) => {
                if map.len() == 1 {
                    if let Some(serde_json::Value::String(digits)) = map.get(BIGINT_ENVELOPE_KEY) {
                        if let Ok(big) = digits.parse::<BigInt>() {
                            return Value::BigInt(big);
                        }
                    }
                    if let Some(serde_json::Value::Object(inner)) = map.get(OBJECT_ENVELOPE_KEY) {
                        return Value::Object(serde_json::Value::Object(inner.clone()));
                    }
                }
                Value::Object(serde_json::Value::Object(map))
            }
            other => Value::Object(other),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(Number::from(n))
    }
}

impl From<BigInt> for Value {
    fn from(b: BigInt) -> Self {
        Value::BigInt(b)
    }
}
