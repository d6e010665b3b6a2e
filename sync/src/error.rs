//! Error and status types for the sync boundary.
//!
//! Nothing in this crate panics the host or surfaces an exception to the
//! end user: remote failures become a [`SyncStatus`] the UI may render as a
//! non-blocking indicator.

use thiserror::Error;

/// Failures reported by a [`crate::RemoteStore`] implementation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// Network loss, timeouts, auth expiry mid-call; worth one retry
    #[error("transient backend failure: {0}")]
    Transient(String),

    /// The backend rejected the call outright; retrying will not help
    #[error("backend rejected request: {0}")]
    Rejected(String),
}

/// Outcome of one sync request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStatus {
    /// Merge completed and the local cache reflects it
    Synced,
    /// Folded into a sync already in flight; that sync will re-run once
    Coalesced,
    /// No user identity available; nothing to reconcile
    NotApplicable,
    /// Backend unreachable after the retry; local data stays authoritative
    Failed(String),
}

impl SyncStatus {
    /// Whether the request left the cache consistent with the remote.
    pub fn is_synced(&self) -> bool {
        matches!(self, SyncStatus::Synced)
    }
}
