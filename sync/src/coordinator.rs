//! The sync coordinator: decides when reconciliation runs.
//!
//! One coordinator instance owns its state; there are no module-level
//! flags, so independent sessions (and tests) never share scheduling
//! state.
//!
//! # State machine
//!
//! `Idle -> Syncing -> (re-enter Syncing if a coalesced request is
//! pending, else Idle)`. At most one sync is in flight; any number of
//! requests arriving during the in-flight window collapse into a single
//! follow-up run. A transient failure earns exactly one retry after a
//! fixed backoff, unless a coalesced request supersedes it first.

use crate::config::SyncOptions;
use crate::error::{RemoteError, SyncStatus};
use crate::store::{LocalCache, RemoteStore};
use shepherd_engine::{Clock, Envelope, NoteCollection, ProgressRecord, Reconciler, SystemClock};
use std::sync::{Arc, Mutex};

type RefreshHook = Box<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Syncing { pending: bool },
}

/// Serializes reconciliation attempts between a local cache and a remote
/// store for one user session.
pub struct SyncCoordinator {
    cache: Arc<dyn LocalCache>,
    remote: Arc<dyn RemoteStore>,
    clock: Arc<dyn Clock>,
    reconciler: Reconciler,
    options: SyncOptions,
    state: Mutex<State>,
    refresh: Option<RefreshHook>,
}

impl SyncCoordinator {
    /// Create a coordinator using the system clock.
    pub fn new(
        cache: Arc<dyn LocalCache>,
        remote: Arc<dyn RemoteStore>,
        reconciler: Reconciler,
        options: SyncOptions,
    ) -> Self {
        Self {
            cache,
            remote,
            clock: Arc::new(SystemClock),
            reconciler,
            options,
            state: Mutex::new(State::Idle),
            refresh: None,
        }
    }

    /// Replace the clock, builder style. Tests pin it.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Install the UI refresh hook, builder style. Fired once after each
    /// successful sync so the UI re-reads the local cache. Optional.
    pub fn with_refresh(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.refresh = Some(Box::new(hook));
        self
    }

    /// Whether no sync is currently in flight.
    pub fn is_idle(&self) -> bool {
        *self.state.lock().unwrap() == State::Idle
    }

    /// Run (or coalesce into) a sync for the given user.
    ///
    /// Never returns an error: every failure is folded into the returned
    /// [`SyncStatus`] and the local cache remains authoritative.
    pub async fn sync(&self, user_id: Option<&str>) -> SyncStatus {
        let Some(user_id) = user_id else {
            tracing::debug!("sync skipped: no user identity");
            return SyncStatus::NotApplicable;
        };

        {
            let mut state = self.state.lock().unwrap();
            if let State::Syncing { .. } = *state {
                *state = State::Syncing { pending: true };
                tracing::debug!("sync in flight, coalescing request");
                return SyncStatus::Coalesced;
            }
            *state = State::Syncing { pending: false };
        }

        let mut retried = false;
        let status = loop {
            let attempt = self.attempt(user_id).await;

            match attempt {
                Ok(()) => {
                    // A request that arrived mid-flight supersedes this
                    // attempt's result; otherwise go idle in the same
                    // critical section so no coalescer slips in between.
                    if self.settle() {
                        retried = false;
                        continue;
                    }
                    break SyncStatus::Synced;
                }
                Err(err @ RemoteError::Transient(_)) if !retried => {
                    // A request during the attempt replaces the retry.
                    if self.take_pending() {
                        retried = false;
                        continue;
                    }
                    tracing::warn!(error = %err, "sync attempt failed, retrying once");
                    retried = true;
                    tokio::time::sleep(self.options.retry_backoff).await;
                    // So does one during the backoff.
                    if self.take_pending() {
                        retried = false;
                    }
                    continue;
                }
                Err(err) => {
                    if self.settle() {
                        retried = false;
                        continue;
                    }
                    tracing::warn!(error = %err, "sync failed, local cache stays authoritative");
                    break SyncStatus::Failed(err.to_string());
                }
            }
        };

        if status.is_synced() {
            if let Some(hook) = &self.refresh {
                hook();
            }
        }
        status
    }

    /// One fetch-merge-write pass. The merge itself is synchronous and
    /// complete before any cache write, so a concurrent reader never sees
    /// a half-applied record.
    async fn attempt(&self, user_id: &str) -> Result<(), RemoteError> {
        let remote_envelope = self.remote.get(user_id).await?;
        let local_envelope = self.read_cache();
        let now = self.clock.now();

        let outcome = self
            .reconciler
            .merge_envelope(&local_envelope, remote_envelope.as_ref(), &now);

        for name in &outcome.dirty {
            if let Some(record) = outcome.envelope.records.get(name) {
                match record.to_json() {
                    Ok(json) => self.cache.set(name, &json),
                    Err(err) => tracing::error!(record = %name, error = %err, "skipping cache write"),
                }
            } else if let Some(notes) = outcome.envelope.notes.get(name) {
                match notes.to_json() {
                    Ok(json) => self.cache.set(name, &json),
                    Err(err) => tracing::error!(record = %name, error = %err, "skipping cache write"),
                }
            }
        }

        if outcome.push_remote {
            let mut push = outcome.envelope.clone();
            push.last_updated = Some(now);
            self.remote.set(user_id, &push).await?;
            tracing::debug!(user = user_id, "pushed merged envelope to backend");
        }

        Ok(())
    }

    /// Assemble the local envelope from the cache. Malformed entries are
    /// logged and treated as absent rather than failing the sync.
    fn read_cache(&self) -> Envelope {
        let mut envelope = Envelope::new();

        for name in &self.options.records {
            let Some(json) = self.cache.get(name) else {
                continue;
            };
            match ProgressRecord::from_json(&json) {
                Ok(record) => {
                    envelope.records.insert(name.clone(), record);
                }
                Err(err) => {
                    tracing::warn!(record = %name, error = %err, "malformed cached record, treating as absent")
                }
            }
        }

        for name in &self.options.notes {
            let Some(json) = self.cache.get(name) else {
                continue;
            };
            match NoteCollection::from_json(&json) {
                Ok(notes) => {
                    envelope.notes.insert(name.clone(), notes);
                }
                Err(err) => {
                    tracing::warn!(record = %name, error = %err, "malformed cached notes, treating as absent")
                }
            }
        }

        envelope
    }

    fn take_pending(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        if *state == (State::Syncing { pending: true }) {
            *state = State::Syncing { pending: false };
            true
        } else {
            false
        }
    }

    /// Terminal transition for a finished round: consume a pending request
    /// and stay in `Syncing`, or go `Idle`. Checking and transitioning under
    /// one lock keeps a request that coalesced after the last attempt from
    /// being dropped.
    fn settle(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        if *state == (State::Syncing { pending: true }) {
            *state = State::Syncing { pending: false };
            true
        } else {
            *state = State::Idle;
            false
        }
    }
}
