//! Coordinator configuration.

use std::time::Duration;

/// What the coordinator syncs and how it retries.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Names of progress records reconciled on every sync
    pub records: Vec<String>,
    /// Names of note collections reconciled on every sync
    pub notes: Vec<String>,
    /// Delay before the single retry after a transient failure
    pub retry_backoff: Duration,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            notes: Vec::new(),
            retry_backoff: Duration::from_secs(2),
        }
    }
}

impl SyncOptions {
    /// Create options with no records and the default backoff.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a progress record name, builder style.
    pub fn with_record(mut self, name: impl Into<String>) -> Self {
        self.records.push(name.into());
        self
    }

    /// Add a note collection name, builder style.
    pub fn with_notes(mut self, name: impl Into<String>) -> Self {
        self.notes.push(name.into());
        self
    }

    /// Set the retry backoff, builder style.
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }
}
