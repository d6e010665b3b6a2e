//! Integration tests for the sync coordinator.
//!
//! These drive full sync rounds against the in-memory stores: scheduling
//! under concurrent requests, retry behavior, and multi-device data flow
//! through a shared backend.

use serde_json::json;
use shepherd_engine::{
    Envelope, FixedClock, MergePolicy, Note, NoteCollection, ProgressRecord, Reconciler,
};
use shepherd_sync::{
    LocalCache, MemoryCache, MemoryRemote, SyncCoordinator, SyncOptions, SyncStatus,
};
use std::sync::Arc;
use std::time::Duration;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn coordinator_at(
    cache: Arc<MemoryCache>,
    remote: Arc<MemoryRemote>,
    now: &str,
) -> SyncCoordinator {
    let reconciler = Reconciler::new(MergePolicy::new().with_accumulative("completionStatus"));
    let options = SyncOptions::new()
        .with_record("session1Progress")
        .with_notes("session1Notes")
        .with_retry_backoff(Duration::from_millis(50));
    SyncCoordinator::new(cache, remote, reconciler, options)
        .with_clock(Arc::new(FixedClock::new(now)))
}

// ============================================================
// Scheduling: coalescing and retries
// ============================================================

#[tokio::test]
async fn requests_during_flight_coalesce_into_one_follow_up() {
    init_tracing();
    let cache = Arc::new(MemoryCache::new());
    let remote = Arc::new(MemoryRemote::new());
    remote.set_delay(Duration::from_millis(100));

    let coordinator = Arc::new(coordinator_at(cache, remote.clone(), "2024-03-01T00:00:00Z"));

    let in_flight = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.sync(Some("u1")).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    // Three requests arrive while the first sync is still fetching.
    assert_eq!(coordinator.sync(Some("u1")).await, SyncStatus::Coalesced);
    assert_eq!(coordinator.sync(Some("u1")).await, SyncStatus::Coalesced);
    assert_eq!(coordinator.sync(Some("u1")).await, SyncStatus::Coalesced);

    assert_eq!(in_flight.await.unwrap(), SyncStatus::Synced);
    assert!(coordinator.is_idle());

    // The original attempt plus exactly one follow-up for all three.
    assert_eq!(remote.get_count(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn coalesced_request_survives_the_idle_transition() {
    init_tracing();
    // Two callers racing the end of a round: either the second runs its
    // own round or it folds into a follow-up, two backend attempts
    // either way. A coalesced request acknowledged right as the holder
    // goes idle must still get its follow-up.
    for _ in 0..200 {
        let remote = Arc::new(MemoryRemote::new());
        remote.set_delay(Duration::from_millis(1));
        let coordinator = Arc::new(coordinator_at(
            Arc::new(MemoryCache::new()),
            remote.clone(),
            "2024-03-01T00:00:00Z",
        ));

        let first = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.sync(Some("u1")).await })
        };
        let second = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.sync(Some("u1")).await })
        };

        let statuses = [first.await.unwrap(), second.await.unwrap()];
        assert!(statuses
            .iter()
            .all(|s| matches!(s, SyncStatus::Synced | SyncStatus::Coalesced)));
        assert_eq!(remote.get_count(), 2);
        assert!(coordinator.is_idle());
    }
}

#[tokio::test]
async fn transient_failure_recovers_within_one_round() {
    init_tracing();
    let cache = Arc::new(MemoryCache::new());
    let remote = Arc::new(MemoryRemote::new());
    remote.insert(
        "u1",
        Envelope::new()
            .with_record(
                "session1Progress",
                ProgressRecord::new().with_field("completionStatus", json!({"t1": true})),
            )
            .with_updated("2024-01-02T00:00:00Z"),
    );
    remote.fail_next(1);

    let coordinator = coordinator_at(cache.clone(), remote, "2024-03-01T00:00:00Z");
    assert_eq!(coordinator.sync(Some("u1")).await, SyncStatus::Synced);

    // The retry completed the pull despite the failed first fetch.
    let cached = ProgressRecord::from_json(&cache.get("session1Progress").unwrap()).unwrap();
    assert_eq!(cached.field("completionStatus"), Some(&json!({"t1": true})));
}

#[tokio::test]
async fn request_during_backoff_supersedes_the_retry() {
    init_tracing();
    let cache = Arc::new(MemoryCache::new());
    let remote = Arc::new(MemoryRemote::new());
    // Two failures would exhaust the single retry on their own.
    remote.fail_next(2);

    let coordinator = Arc::new(coordinator_at(cache, remote.clone(), "2024-03-01T00:00:00Z"));

    let in_flight = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.sync(Some("u1")).await })
    };
    // Land a request inside the backoff window after the first failure.
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(coordinator.sync(Some("u1")).await, SyncStatus::Coalesced);

    // The coalesced request resets the retry allowance, so the third
    // attempt still happens and succeeds.
    assert_eq!(in_flight.await.unwrap(), SyncStatus::Synced);
    assert_eq!(remote.get_count(), 3);
}

#[tokio::test]
async fn unreachable_backend_leaves_cache_untouched() {
    init_tracing();
    let cache = Arc::new(MemoryCache::new());
    cache.set(
        "session1Progress",
        &ProgressRecord::new()
            .with_field("reflections", json!({"r1": "still here"}))
            .with_updated("2024-01-01T00:00:00Z")
            .to_json()
            .unwrap(),
    );
    let remote = Arc::new(MemoryRemote::new());
    remote.fail_next(usize::MAX);

    let coordinator = coordinator_at(cache.clone(), remote, "2024-03-01T00:00:00Z");
    let status = coordinator.sync(Some("u1")).await;
    assert!(matches!(status, SyncStatus::Failed(_)));

    // Local data remains readable and unmodified.
    let cached = ProgressRecord::from_json(&cache.get("session1Progress").unwrap()).unwrap();
    assert_eq!(cached.field("reflections"), Some(&json!({"r1": "still here"})));
    assert!(cached.last_synced.is_none());
}

#[tokio::test]
async fn synced_state_makes_the_next_round_a_no_op() {
    let cache = Arc::new(MemoryCache::new());
    cache.set(
        "session1Progress",
        &ProgressRecord::new()
            .with_field("completionStatus", json!({"t1": true}))
            .with_updated("2024-01-01T00:00:00Z")
            .to_json()
            .unwrap(),
    );
    let remote = Arc::new(MemoryRemote::new());

    let coordinator = coordinator_at(cache, remote.clone(), "2024-03-01T00:00:00Z");
    assert_eq!(coordinator.sync(Some("u1")).await, SyncStatus::Synced);
    let sets_after_first = remote.set_count();
    assert_eq!(sets_after_first, 1);

    // Nothing changed locally, so the second round pushes nothing.
    assert_eq!(coordinator.sync(Some("u1")).await, SyncStatus::Synced);
    assert_eq!(remote.set_count(), sets_after_first);
}

// ============================================================
// Multi-device flow through a shared backend
// ============================================================

#[tokio::test]
async fn completion_flags_from_two_devices_accumulate() {
    init_tracing();
    let remote = Arc::new(MemoryRemote::new());

    // Device A completes topic one and syncs.
    let cache_a = Arc::new(MemoryCache::new());
    cache_a.set(
        "session1Progress",
        &ProgressRecord::new()
            .with_field("completionStatus", json!({"topic1": true}))
            .with_updated("2024-01-01T00:00:00Z")
            .to_json()
            .unwrap(),
    );
    let device_a = coordinator_at(cache_a.clone(), remote.clone(), "2024-01-01T10:00:00Z");
    assert_eq!(device_a.sync(Some("u1")).await, SyncStatus::Synced);

    // Device B completes topic two later, then syncs.
    let cache_b = Arc::new(MemoryCache::new());
    cache_b.set(
        "session1Progress",
        &ProgressRecord::new()
            .with_field("completionStatus", json!({"topic2": true}))
            .with_updated("2024-01-02T00:00:00Z")
            .to_json()
            .unwrap(),
    );
    let device_b = coordinator_at(cache_b.clone(), remote.clone(), "2024-01-02T10:00:00Z");
    assert_eq!(device_b.sync(Some("u1")).await, SyncStatus::Synced);

    let on_b = ProgressRecord::from_json(&cache_b.get("session1Progress").unwrap()).unwrap();
    assert_eq!(
        on_b.field("completionStatus"),
        Some(&json!({"topic1": true, "topic2": true}))
    );

    // Device A syncs again and sees both flags.
    assert_eq!(device_a.sync(Some("u1")).await, SyncStatus::Synced);
    let on_a = ProgressRecord::from_json(&cache_a.get("session1Progress").unwrap()).unwrap();
    assert_eq!(
        on_a.field("completionStatus"),
        Some(&json!({"topic1": true, "topic2": true}))
    );
}

#[tokio::test]
async fn shared_note_content_is_not_duplicated_across_devices() {
    let remote = Arc::new(MemoryRemote::new());

    let cache_a = Arc::new(MemoryCache::new());
    cache_a.set(
        "session1Notes",
        &NoteCollection::new()
            .with_group(
                "topic1",
                vec![
                    Note::new("shared reflection"),
                    Note::new("only on device a"),
                ],
            )
            .to_json()
            .unwrap(),
    );
    let device_a = coordinator_at(cache_a, remote.clone(), "2024-01-01T10:00:00Z");
    assert_eq!(device_a.sync(Some("u1")).await, SyncStatus::Synced);

    let cache_b = Arc::new(MemoryCache::new());
    cache_b.set(
        "session1Notes",
        &NoteCollection::new()
            .with_group(
                "topic1",
                vec![
                    Note::new("shared reflection"),
                    Note::new("only on device b"),
                ],
            )
            .to_json()
            .unwrap(),
    );
    let device_b = coordinator_at(cache_b.clone(), remote.clone(), "2024-01-02T10:00:00Z");
    assert_eq!(device_b.sync(Some("u1")).await, SyncStatus::Synced);

    let merged = NoteCollection::from_json(&cache_b.get("session1Notes").unwrap()).unwrap();
    let contents: Vec<&str> = merged
        .group("topic1")
        .unwrap()
        .iter()
        .map(|note| note.content.as_str())
        .collect();
    assert_eq!(
        contents,
        vec!["shared reflection", "only on device a", "only on device b"]
    );
}

#[tokio::test]
async fn first_sync_for_a_new_user_uploads_everything() {
    let cache = Arc::new(MemoryCache::new());
    cache.set(
        "session1Progress",
        &ProgressRecord::new()
            .with_field("completionStatus", json!({"topic1": true}))
            .with_updated("2024-01-01T00:00:00Z")
            .to_json()
            .unwrap(),
    );
    cache.set(
        "session1Notes",
        &NoteCollection::new()
            .with_group("topic1", vec![Note::new("first note")])
            .to_json()
            .unwrap(),
    );
    let remote = Arc::new(MemoryRemote::new());

    let coordinator = coordinator_at(cache, remote.clone(), "2024-03-01T00:00:00Z");
    assert_eq!(coordinator.sync(Some("new-user")).await, SyncStatus::Synced);

    let stored = remote.envelope("new-user").unwrap();
    assert!(stored.record("session1Progress").is_some());
    assert!(stored.notes.contains_key("session1Notes"));
    assert_eq!(stored.last_updated.as_deref(), Some("2024-03-01T00:00:00Z"));
}
