//! Error types for the Shepherd engine.

use thiserror::Error;

/// All possible errors from the Shepherd engine.
///
/// The merge itself is infallible; errors only arise when decoding stored
/// JSON at the engine boundary. Callers are expected to treat a malformed
/// document as absent data rather than a fatal condition.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("malformed progress record: {0}")]
    MalformedRecord(String),

    #[error("malformed note collection: {0}")]
    MalformedNotes(String),

    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
