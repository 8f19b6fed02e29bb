//! Conflict policy: how a value fetched from remote meets the local record.
//!
//! `LastRemoteWins` is the default: whatever the remote store returns
//! replaces the local record, pending local edits included. The other
//! policies plug in here without touching the engine.

use serde::{Deserialize, Serialize};
use shelfsync_storage::Value;
use std::fmt;

/// Selected reconciliation rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Remote value overwrites the local record.
    #[default]
    LastRemoteWins,
    /// A key with unpushed local edits keeps its local value.
    LastLocalWins,
    /// A caller-supplied [`ConflictResolver`] decides.
    Manual,
}

impl fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictPolicy::LastRemoteWins => write!(f, "last-remote-wins"),
            ConflictPolicy::LastLocalWins => write!(f, "last-local-wins"),
            ConflictPolicy::Manual => write!(f, "manual"),
        }
    }
}

/// What a remote read looks like for one key.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub key: &'a str,
    pub local: &'a Value,
    pub remote: &'a Value,
    /// The key has local edits that were never pushed.
    pub dirty: bool,
}

/// Outcome for one key.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Keep the local record as is.
    KeepLocal,
    /// Replace the local record with this value.
    Replace(Value),
}

/// Application hook for [`ConflictPolicy::Manual`].
pub trait ConflictResolver: Send + Sync {
    fn resolve(&self, candidate: Candidate<'_>) -> Resolution;
}

impl ConflictPolicy {
    /// Applies the policy. Returns `None` for `Manual`, which needs a resolver.
    pub fn resolve(&self, candidate: Candidate<'_>) -> Option<Resolution> {
        if candidate.local == candidate.remote {
            return Some(Resolution::KeepLocal);
        }
        match self {
            ConflictPolicy::LastRemoteWins => Some(Resolution::Replace(candidate.remote.clone())),
            ConflictPolicy::LastLocalWins if candidate.dirty => Some(Resolution::KeepLocal),
            ConflictPolicy::LastLocalWins => Some(Resolution::Replace(candidate.remote.clone())),
            ConflictPolicy::Manual => None,
        }
    }
}
