//! In-process store implementations.
//!
//! Used by the test suite and for development against no backend. The
//! remote side can be scripted to fail or stall to exercise the
//! coordinator's retry and coalescing paths.

use crate::error::RemoteError;
use crate::store::{LocalCache, RemoteStore};
use async_trait::async_trait;
use shepherd_engine::Envelope;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// A [`LocalCache`] backed by a hash map.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// Whether the cache holds nothing.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LocalCache for MemoryCache {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }
}

/// A [`RemoteStore`] backed by a hash map, with scriptable failures.
#[derive(Debug, Default)]
pub struct MemoryRemote {
    docs: Mutex<HashMap<String, Envelope>>,
    /// Calls left to fail before the store recovers
    fail_remaining: AtomicUsize,
    /// Artificial latency per call, for in-flight window tests
    delay: Mutex<Duration>,
    gets: AtomicUsize,
    sets: AtomicUsize,
}

impl MemoryRemote {
    /// Create an empty remote store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a user's envelope.
    pub fn insert(&self, user_id: impl Into<String>, envelope: Envelope) {
        self.docs.lock().unwrap().insert(user_id.into(), envelope);
    }

    /// Read back a user's envelope.
    pub fn envelope(&self, user_id: &str) -> Option<Envelope> {
        self.docs.lock().unwrap().get(user_id).cloned()
    }

    /// Fail the next `n` calls with a transient error.
    pub fn fail_next(&self, n: usize) {
        self.fail_remaining.store(n, Ordering::SeqCst);
    }

    /// Stall every call by `delay`.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    /// How many fetches the store has served (including failed ones).
    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    /// How many writes the store has served (including failed ones).
    pub fn set_count(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }

    async fn simulate_call(&self) -> Result<(), RemoteError> {
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut remaining = self.fail_remaining.load(Ordering::SeqCst);
        while remaining > 0 {
            match self.fail_remaining.compare_exchange(
                remaining,
                remaining - 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return Err(RemoteError::Transient("scripted failure".into())),
                Err(actual) => remaining = actual,
            }
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn get(&self, user_id: &str) -> Result<Option<Envelope>, RemoteError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.simulate_call().await?;
        Ok(self.docs.lock().unwrap().get(user_id).cloned())
    }

    async fn set(&self, user_id: &str, envelope: &Envelope) -> Result<(), RemoteError> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.simulate_call().await?;

        let mut docs = self.docs.lock().unwrap();
        let entry = docs.entry(user_id.to_string()).or_default();
        // Merge-write: incoming keys replace, absent keys survive.
        entry.last_updated = envelope.last_updated.clone();
        for (name, record) in &envelope.records {
            entry.records.insert(name.clone(), record.clone());
        }
        for (name, notes) in &envelope.notes {
            entry.notes.insert(name.clone(), notes.clone());
        }
        for (key, value) in &envelope.extra {
            entry.extra.insert(key.clone(), value.clone());
        }
        Ok(())
    }
}
