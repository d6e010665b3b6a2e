//! # Shepherd Sync
//!
//! The sync coordinator for Shepherd's local-first progress data.
//!
//! Where [`shepherd_engine`] decides *what* the merged state is, this crate
//! decides *when* reconciliation happens and against *which* stores. The
//! [`SyncCoordinator`] keeps at most one sync in flight per instance,
//! coalesces requests that arrive mid-flight into a single follow-up run,
//! retries a transiently failed attempt once after a fixed backoff, and
//! reports every outcome as a [`SyncStatus`] value instead of an error the
//! host has to catch. The local cache stays authoritative and usable when
//! the backend is unreachable indefinitely.
//!
//! Backends plug in through two small traits: [`LocalCache`] (synchronous
//! key-value, e.g. browser local storage or a file) and [`RemoteStore`]
//! (async per-user document store, e.g. a hosted document database).
//! [`MemoryCache`] and [`MemoryRemote`] are in-process implementations used
//! by the tests and handy for development.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod memory;
pub mod store;

pub use config::SyncOptions;
pub use coordinator::SyncCoordinator;
pub use error::{RemoteError, SyncStatus};
pub use memory::{MemoryCache, MemoryRemote};
pub use store::{LocalCache, RemoteStore};
