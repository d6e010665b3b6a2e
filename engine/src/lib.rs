//! # Shepherd Engine
//!
//! A deterministic reconciliation engine for local-first progress tracking.
//!
//! This crate provides the core logic for merging a locally cached copy of a
//! user's progress with the copy held by a remote backend. Records are small
//! named JSON documents carrying last-write-wins timestamps; notes are grouped
//! free-form entries de-duplicated by content. The same inputs always produce
//! the same merged output.
//!
//! ## Design Principles
//!
//! - **No IO**: Engine has no knowledge of caches, network, or platform
//! - **Deterministic**: Same inputs always produce same outputs
//! - **Testable**: Pure logic, no mocks needed
//! - **Additive**: Unknown fields pass through a merge unmodified
//!
//! ## Core Concepts
//!
//! ### Progress Records
//!
//! A [`ProgressRecord`] is a named JSON document with:
//! - A flat mapping from field key to arbitrary JSON value
//! - `lastUpdated`, stamped by whichever side wrote last
//! - `lastSynced`, stamped only by the reconciler
//!
//! ### Notes
//!
//! A [`NoteCollection`] maps group identifiers to ordered [`Note`] entries.
//! Two notes with identical `content` are the same note, even when created
//! independently on two devices.
//!
//! ### Merge Policy
//!
//! The [`MergePolicy`] declares, per field key, how a collision is resolved:
//! - [`FieldPolicy::Replace`] - the newer side's value wins wholesale (default)
//! - [`FieldPolicy::Accumulate`] - sub-keys from both sides are unioned
//!
//! ### Reconciliation
//!
//! The [`Reconciler`] merges a local and a remote record using the remote
//! envelope timestamp for the last-write-wins comparison. Ties favor the
//! local side. Re-merging a merged result against either input is a no-op.
//!
//! ## Quick Start
//!
//! ```rust
//! use shepherd_engine::{MergePolicy, ProgressRecord, Reconciler};
//! use serde_json::json;
//!
//! let policy = MergePolicy::new().with_accumulative("completionStatus");
//! let reconciler = Reconciler::new(policy);
//!
//! let local = ProgressRecord::new()
//!     .with_field("completionStatus", json!({"topic1": true}))
//!     .with_updated("2024-01-01T00:00:00Z");
//! let remote = ProgressRecord::new()
//!     .with_field("completionStatus", json!({"topic2": true}));
//!
//! // Remote envelope is newer, but the accumulative field is still unioned.
//! let outcome = reconciler.merge_record(
//!     Some(&local),
//!     Some(&remote),
//!     Some("2024-01-02T00:00:00Z"),
//!     "2024-01-03T00:00:00Z",
//! );
//!
//! assert_eq!(
//!     outcome.record.field("completionStatus"),
//!     Some(&json!({"topic1": true, "topic2": true})),
//! );
//! assert_eq!(
//!     outcome.record.last_updated.as_deref(),
//!     Some("2024-01-02T00:00:00Z"),
//! );
//! assert!(outcome.cache_dirty);
//! ```

pub mod clock;
pub mod error;
pub mod note;
pub mod policy;
pub mod reconcile;
pub mod record;

// Re-export main types at crate root
pub use clock::{parse_timestamp, Clock, FixedClock, SystemClock};
pub use error::Error;
pub use note::{merge_notes, Note, NoteCollection};
pub use policy::{FieldPolicy, MergePolicy};
pub use reconcile::{EnvelopeOutcome, MergeOutcome, Reconciler, Resolution};
pub use record::{Envelope, ProgressRecord};

/// Type aliases for clarity
pub type RecordName = String;
pub type FieldKey = String;
pub type GroupId = String;
