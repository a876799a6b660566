//! Engine state flags
//!
//! Concurrency control is a handful of orthogonal boolean flags checked
//! from asynchronous continuations, plus a diagnostic phase channel.
//! The flags are atomics because the engine is cloned into scheduled
//! tasks and the event loop.

use std::sync::atomic::{AtomicBool, Ordering};

/// Auth lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    /// No credential has been seen this session
    Unauthenticated,
    /// A valid credential initialized the cache
    Authenticated,
    /// A forced-logout signal arrived; all fetch/mutation effects are
    /// refused until a new credential releases the block
    ForcedLogout,
}

/// Where the refresh machinery currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshPhase {
    /// Nothing scheduled or running
    Idle,
    /// A coalescing window is open; one deferred refresh is scheduled
    Debouncing,
    /// A list-fetch is outstanding
    Refreshing,
}

/// Orthogonal flags shared across the engine's tasks
#[derive(Debug)]
pub(crate) struct SyncFlags {
    /// True while exactly one list-fetch is outstanding
    pub refresh_in_flight: AtomicBool,
    /// True after a forced-logout signal; cleared by a valid credential
    pub auth_blocked: AtomicBool,
    /// Re-entrancy guard for the create path
    pub upload_in_flight: AtomicBool,
    /// Set by the first valid credential; guards the one-time initial refresh
    pub initialized: AtomicBool,
}

impl SyncFlags {
    pub fn new() -> Self {
        Self {
            refresh_in_flight: AtomicBool::new(false),
            auth_blocked: AtomicBool::new(false),
            upload_in_flight: AtomicBool::new(false),
            initialized: AtomicBool::new(false),
        }
    }

    pub fn auth_state(&self) -> AuthState {
        if self.auth_blocked.load(Ordering::Acquire) {
            AuthState::ForcedLogout
        } else if self.initialized.load(Ordering::Acquire) {
            AuthState::Authenticated
        } else {
            AuthState::Unauthenticated
        }
    }
}
