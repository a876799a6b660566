//! Sync engine error type
//!
//! Wraps the remote taxonomy with the failures the engine itself can
//! raise before a remote call is made.

use thiserror::Error;

use crate::api::ApiError;

/// Errors returned by sync engine operations
#[derive(Error, Debug)]
pub enum SyncError {
    /// The upload quota gate refused the create before the mutation
    /// endpoint was contacted
    #[error("upload limit reached ({used}/{max})")]
    QuotaExceeded { used: u32, max: u32 },

    /// Another upload holds the re-entrancy guard
    #[error("an upload is already in progress")]
    UploadInProgress,

    /// The engine is blocked (forced logout) or has no credential
    #[error("not signed in")]
    AuthRequired,

    /// Classified remote service failure
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl SyncError {
    /// True when the caller should send the user back through login
    pub fn is_auth(&self) -> bool {
        match self {
            SyncError::AuthRequired => true,
            SyncError::Api(e) => e.is_auth(),
            _ => false,
        }
    }

    /// True when a manual retry may succeed without any state change
    pub fn is_transient(&self) -> bool {
        matches!(self, SyncError::Api(e) if e.is_transient())
    }
}
