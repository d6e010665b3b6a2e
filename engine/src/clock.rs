//! Wall-clock timestamps and their ordering.
//!
//! Timestamps travel as ISO-8601 strings so precision and offsets round-trip
//! unmodified. For comparison they are parsed with chrono; a side with no
//! timestamp, or one that does not parse, falls back to the Unix epoch and
//! therefore always loses to a side with a real timestamp.

use chrono::{DateTime, SecondsFormat, Utc};

/// Parse an optional ISO-8601 timestamp, defaulting to the Unix epoch.
///
/// Malformed input is indistinguishable from missing input: both mean
/// "older than anything real".
pub fn parse_timestamp(value: Option<&str>) -> DateTime<Utc> {
    value
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH)
}

/// Source of the current time as an ISO-8601 string.
///
/// The reconciler stamps `lastSynced` through this trait so tests can pin
/// the clock.
pub trait Clock: Send + Sync {
    /// Current time, ISO-8601 formatted.
    fn now(&self) -> String;
}

/// System clock backed by [`chrono::Utc`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> String {
        Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

/// A clock pinned to a fixed instant, for tests.
#[derive(Debug, Clone)]
pub struct FixedClock(String);

impl FixedClock {
    /// Create a clock that always reports the given timestamp.
    pub fn new(timestamp: impl Into<String>) -> Self {
        Self(timestamp.into())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> String {
        self.0.clone()
    }
}
