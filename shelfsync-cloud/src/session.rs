//! Readiness gate for remote operations.
//!
//! The authentication layer lives outside this crate; it only reports two
//! flags. Every remote operation checks them first and fails fast.

use crate::error::{CloudError, CloudResult};
use std::sync::atomic::{AtomicBool, Ordering};

/// Source of the two readiness flags.
pub trait SessionGate: Send + Sync {
    /// The remote client library has been initialized.
    fn library_ready(&self) -> bool;

    /// An authenticated session is established.
    fn session_ready(&self) -> bool;

    /// Returns the precondition error for the current state, if any.
    fn check(&self) -> CloudResult<()> {
        if !self.library_ready() {
            return Err(CloudError::NotInitialized);
        }
        if !self.session_ready() {
            return Err(CloudError::NotReady);
        }
        Ok(())
    }
}

/// Flag pair updated by the application's auth callbacks.
#[derive(Debug, Default)]
pub struct SessionState {
    initialized: AtomicBool,
    ready: AtomicBool,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// A state that is already initialized and signed in.
    pub fn ready() -> Self {
        let state = Self::new();
        state.mark_initialized();
        state.mark_ready();
        state
    }

    pub fn mark_initialized(&self) {
        self.initialized.store(true, Ordering::SeqCst);
    }

    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);
    }

    /// Drops the session (logout or token expiry). The library stays initialized.
    pub fn mark_logged_out(&self) {
        self.ready.store(false, Ordering::SeqCst);
    }
}

impl SessionGate for SessionState {
    fn library_ready(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    fn session_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}
