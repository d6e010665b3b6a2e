//! Record types for stored progress data.

use crate::error::{Error, Result};
use crate::note::NoteCollection;
use crate::RecordName;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A named, versioned progress document.
///
/// Fields are flattened so the wire shape is the document itself with the
/// two timestamps alongside: `{"completionStatus": {...}, "reflections":
/// {...}, "lastUpdated": "...", "lastSynced": "..."}`. Keys the engine does
/// not know about survive a round trip untouched.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    /// When either side last wrote this record (ISO-8601)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
    /// When the reconciler last merged this record (ISO-8601)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_synced: Option<String>,
    /// The document body: field key to arbitrary JSON value
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl ProgressRecord {
    /// Create an empty record with no timestamps.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, builder style.
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    /// Set `lastUpdated`, builder style.
    pub fn with_updated(mut self, timestamp: impl Into<String>) -> Self {
        self.last_updated = Some(timestamp.into());
        self
    }

    /// Get a field value by key.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Set a field and stamp `lastUpdated` with the given time.
    pub fn set_field(&mut self, key: impl Into<String>, value: Value, timestamp: &str) {
        self.fields.insert(key.into(), value);
        self.last_updated = Some(timestamp.to_string());
    }

    /// Whether the record carries no fields and no timestamps.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.last_updated.is_none() && self.last_synced.is_none()
    }

    /// Equality ignoring `lastSynced`, which the reconciler restamps on
    /// every merge.
    pub fn eq_ignoring_sync(&self, other: &Self) -> bool {
        self.fields == other.fields && self.last_updated == other.last_updated
    }

    /// Decode a record from stored JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::MalformedRecord(e.to_string()))
    }

    /// Encode the record for storage.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::MalformedRecord(e.to_string()))
    }
}

/// The per-user remote document: named progress records and note
/// collections under one outer timestamp.
///
/// The envelope's `lastUpdated` is stamped by the backend write path and is
/// distinct from any per-record timestamp; the reconciler compares it
/// against the local record's own `lastUpdated`. BTreeMap keys keep the
/// serialized form deterministic.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// Outer document timestamp, set by whichever side pushed last
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
    /// Progress records by name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub records: BTreeMap<RecordName, ProgressRecord>,
    /// Note collections by name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub notes: BTreeMap<RecordName, NoteCollection>,
    /// Document-level keys the engine does not interpret
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Envelope {
    /// Create an empty envelope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a progress record, builder style.
    pub fn with_record(mut self, name: impl Into<RecordName>, record: ProgressRecord) -> Self {
        self.records.insert(name.into(), record);
        self
    }

    /// Insert a note collection, builder style.
    pub fn with_notes(mut self, name: impl Into<RecordName>, notes: NoteCollection) -> Self {
        self.notes.insert(name.into(), notes);
        self
    }

    /// Set the outer timestamp, builder style.
    pub fn with_updated(mut self, timestamp: impl Into<String>) -> Self {
        self.last_updated = Some(timestamp.into());
        self
    }

    /// Get a progress record by name.
    pub fn record(&self, name: &str) -> Option<&ProgressRecord> {
        self.records.get(name)
    }

    /// Whether the envelope holds no records and no notes.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty() && self.notes.is_empty()
    }

    /// Decode an envelope from stored JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::MalformedEnvelope(e.to_string()))
    }

    /// Encode the envelope for storage.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::MalformedEnvelope(e.to_string()))
    }
}
