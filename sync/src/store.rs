//! Storage traits the coordinator reconciles between.

use crate::error::RemoteError;
use async_trait::async_trait;
use shepherd_engine::Envelope;

/// Synchronous key-value cache on the local device.
///
/// Keys are record names; values are the JSON-encoded record. Reads may
/// happen at any time, but writes during a sync come only from the
/// reconciler's completed merge result.
pub trait LocalCache: Send + Sync {
    /// Get the stored JSON for a key, if any.
    fn get(&self, key: &str) -> Option<String>;

    /// Store JSON under a key, replacing any previous value.
    fn set(&self, key: &str, value: &str);
}

/// Asynchronous per-user document store on the backend.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetch the user's envelope, or `None` if the user has never synced.
    async fn get(&self, user_id: &str) -> Result<Option<Envelope>, RemoteError>;

    /// Write the user's envelope with merge semantics: document keys absent
    /// from `envelope` must survive on the backend.
    async fn set(&self, user_id: &str, envelope: &Envelope) -> Result<(), RemoteError>;
}
