//! Note storage and content-keyed de-duplication.
//!
//! Notes are free-form entries grouped under stable identifiers. Identity is
//! the `content` string, not any id: two notes with identical text written on
//! two devices are the same note.

use crate::error::{Error, Result};
use crate::GroupId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// A single note entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    /// Note text; the de-duplication key
    pub content: String,
    /// When the note was written (ISO-8601)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Free-form metadata carried alongside the note
    #[serde(flatten)]
    pub meta: Map<String, Value>,
}

impl Note {
    /// Create a note with content only.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            created_at: None,
            meta: Map::new(),
        }
    }

    /// Set the creation timestamp, builder style.
    pub fn with_created_at(mut self, timestamp: impl Into<String>) -> Self {
        self.created_at = Some(timestamp.into());
        self
    }

    /// Attach a metadata key, builder style.
    pub fn with_meta(mut self, key: impl Into<String>, value: Value) -> Self {
        self.meta.insert(key.into(), value);
        self
    }
}

/// Ordered note entries keyed by group identifier.
///
/// Flattened on the wire: `{"topic1": [{"content": "..."}], "topic2": [...]}`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NoteCollection {
    #[serde(flatten)]
    pub groups: BTreeMap<GroupId, Vec<Note>>,
}

impl NoteCollection {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a group of notes, builder style.
    pub fn with_group(mut self, id: impl Into<GroupId>, notes: Vec<Note>) -> Self {
        self.groups.insert(id.into(), notes);
        self
    }

    /// Get the notes of a group.
    pub fn group(&self, id: &str) -> Option<&[Note]> {
        self.groups.get(id).map(Vec::as_slice)
    }

    /// Whether the collection has no groups.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Decode a collection from stored JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::MalformedNotes(e.to_string()))
    }

    /// Encode the collection for storage.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::MalformedNotes(e.to_string()))
    }
}

/// Merge two note collections, cloud side first.
///
/// For each group present in either side, cloud notes are concatenated
/// before local notes and the first occurrence of each distinct `content`
/// is kept. The operand order is part of the contract: swapping it keeps
/// the same contents but retains the other instance's metadata for any
/// duplicate, so callers must consistently pass cloud first.
pub fn merge_notes(cloud: &NoteCollection, local: &NoteCollection) -> NoteCollection {
    let group_ids: BTreeSet<&GroupId> = cloud.groups.keys().chain(local.groups.keys()).collect();

    let mut merged = NoteCollection::new();
    for id in group_ids {
        let cloud_notes = cloud.groups.get(id).map(Vec::as_slice).unwrap_or(&[]);
        let local_notes = local.groups.get(id).map(Vec::as_slice).unwrap_or(&[]);
        merged.groups.insert(
            id.clone(),
            dedupe(cloud_notes.iter().chain(local_notes.iter())),
        );
    }
    merged
}

/// Keep the first occurrence of each distinct note content, in input order.
pub fn dedupe<'a>(notes: impl Iterator<Item = &'a Note>) -> Vec<Note> {
    let mut seen = HashSet::new();
    let mut kept = Vec::new();
    for note in notes {
        if seen.insert(note.content.clone()) {
            kept.push(note.clone());
        }
    }
    kept
}
