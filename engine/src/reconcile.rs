//! Reconciliation logic for syncing local and remote progress state.
//!
//! This is the core of determinism. Given a locally cached record and the
//! remote copy, this module produces one merged record and reports which
//! side's writes need to propagate.
//!
//! # Algorithm
//!
//! 1. If one side is absent, the other side is the result
//! 2. Otherwise compare the remote envelope timestamp against the local
//!    record's own `lastUpdated` (strict `>`, missing means epoch)
//! 3. The newer side becomes the base; the other side contributes only the
//!    keys the base is missing
//! 4. Accumulative fields are unioned sub-key by sub-key in either branch
//! 5. `lastSynced` is restamped with the reconciliation time

use crate::clock::parse_timestamp;
use crate::note::merge_notes;
use crate::policy::MergePolicy;
use crate::record::{Envelope, ProgressRecord};
use crate::RecordName;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

/// Which side supplied the merged record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Resolution {
    /// Neither side had data
    Empty,
    /// Only the local side had data; remote needs the push
    LocalOnly,
    /// Only the remote side had data; cache needs the write
    RemoteOnly,
    /// Both present, local was at least as new and formed the base
    LocalWins,
    /// Both present, remote was strictly newer and formed the base
    RemoteWins,
}

/// Result of merging one record pair.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    /// The fully computed merged record
    pub record: ProgressRecord,
    /// Which side won the last-write-wins comparison
    pub resolution: Resolution,
    /// Whether the local cache must be rewritten with `record`
    pub cache_dirty: bool,
}

/// Result of merging a whole user envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvelopeOutcome {
    /// Merged envelope, complete before any storage write happens
    pub envelope: Envelope,
    /// Per-record resolution, by record name
    pub resolutions: BTreeMap<RecordName, Resolution>,
    /// Record and note-collection names whose cached copy is stale
    pub dirty: BTreeSet<RecordName>,
    /// Whether the local side contributed data the remote lacks
    pub push_remote: bool,
}

impl EnvelopeOutcome {
    /// Whether any cached entry needs rewriting.
    pub fn cache_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }
}

/// The reconciler merges record pairs under a per-field policy.
#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    policy: MergePolicy,
}

impl Reconciler {
    /// Create a reconciler with the given merge policy.
    pub fn new(policy: MergePolicy) -> Self {
        Self { policy }
    }

    /// Get the merge policy.
    pub fn policy(&self) -> &MergePolicy {
        &self.policy
    }

    /// Merge one local/remote record pair.
    ///
    /// `remote_envelope_updated_at` is the outer document timestamp from the
    /// backend, not the remote record's own `lastUpdated`. `now` stamps
    /// `lastSynced` whenever remote data flows into the result.
    pub fn merge_record(
        &self,
        local: Option<&ProgressRecord>,
        remote: Option<&ProgressRecord>,
        remote_envelope_updated_at: Option<&str>,
        now: &str,
    ) -> MergeOutcome {
        match (local, remote) {
            (None, None) => MergeOutcome {
                record: ProgressRecord::new(),
                resolution: Resolution::Empty,
                cache_dirty: false,
            },
            (Some(local), None) => MergeOutcome {
                record: local.clone(),
                resolution: Resolution::LocalOnly,
                cache_dirty: false,
            },
            (None, Some(remote)) => {
                let mut record = remote.clone();
                record.last_synced = Some(now.to_string());
                MergeOutcome {
                    record,
                    resolution: Resolution::RemoteOnly,
                    cache_dirty: true,
                }
            }
            (Some(local), Some(remote)) => {
                // Strict comparison: a tie keeps the local branch, which is
                // what makes repeated merges under equal timestamps stable.
                let remote_newer = parse_timestamp(remote_envelope_updated_at)
                    > parse_timestamp(local.last_updated.as_deref());

                let (base, overlay) = if remote_newer {
                    (remote, local)
                } else {
                    (local, remote)
                };

                let fields = self.merge_fields(&base.fields, &overlay.fields);
                let last_updated = if remote_newer {
                    remote_envelope_updated_at.map(str::to_string)
                } else {
                    local.last_updated.clone()
                };

                let record = ProgressRecord {
                    last_updated,
                    last_synced: Some(now.to_string()),
                    fields,
                };
                let cache_dirty = record.fields != local.fields
                    || record.last_updated != local.last_updated;

                MergeOutcome {
                    record,
                    resolution: if remote_newer {
                        Resolution::RemoteWins
                    } else {
                        Resolution::LocalWins
                    },
                    cache_dirty,
                }
            }
        }
    }

    /// Merge every named record and note collection in a user envelope.
    ///
    /// The local envelope is assembled from the cache; the remote one may be
    /// absent entirely (first sync for this user).
    pub fn merge_envelope(
        &self,
        local: &Envelope,
        remote: Option<&Envelope>,
        now: &str,
    ) -> EnvelopeOutcome {
        let remote_updated_at = remote.and_then(|r| r.last_updated.as_deref());

        let mut envelope = Envelope::new();
        let mut resolutions = BTreeMap::new();
        let mut dirty = BTreeSet::new();
        let mut push_remote = false;

        let record_names: BTreeSet<&RecordName> = local
            .records
            .keys()
            .chain(remote.into_iter().flat_map(|r| r.records.keys()))
            .collect();

        for name in record_names {
            let outcome = self.merge_record(
                local.records.get(name),
                remote.and_then(|r| r.records.get(name)),
                remote_updated_at,
                now,
            );
            if outcome.cache_dirty {
                dirty.insert(name.clone());
            }
            push_remote |= matches!(
                outcome.resolution,
                Resolution::LocalOnly | Resolution::LocalWins
            );
            resolutions.insert(name.clone(), outcome.resolution);
            envelope.records.insert(name.clone(), outcome.record);
        }

        let note_names: BTreeSet<&RecordName> = local
            .notes
            .keys()
            .chain(remote.into_iter().flat_map(|r| r.notes.keys()))
            .collect();

        let no_notes = crate::note::NoteCollection::new();
        for name in note_names {
            let cloud = remote.and_then(|r| r.notes.get(name));
            let merged = merge_notes(
                cloud.unwrap_or(&no_notes),
                local.notes.get(name).unwrap_or(&no_notes),
            );
            if local.notes.get(name) != Some(&merged) {
                dirty.insert(name.clone());
            }
            if cloud != Some(&merged) {
                push_remote = true;
            }
            envelope.notes.insert(name.clone(), merged);
        }

        envelope.extra = self.merge_document_extra(local, remote, remote_updated_at);
        envelope.last_updated = if parse_timestamp(remote_updated_at)
            > parse_timestamp(local.last_updated.as_deref())
        {
            remote_updated_at.map(str::to_string)
        } else {
            local.last_updated.clone()
        };

        EnvelopeOutcome {
            envelope,
            resolutions,
            dirty,
            push_remote,
        }
    }

    /// Union of base and overlay fields. Overlay contributes keys the base
    /// is missing; accumulative fields additionally union their sub-keys,
    /// base side winning collisions.
    fn merge_fields(
        &self,
        base: &Map<String, Value>,
        overlay: &Map<String, Value>,
    ) -> Map<String, Value> {
        let mut merged = base.clone();
        for (key, value) in overlay {
            match merged.get_mut(key) {
                None => {
                    merged.insert(key.clone(), value.clone());
                }
                Some(existing) => {
                    if self.policy.is_accumulative(key) {
                        if let (Value::Object(base_map), Value::Object(overlay_map)) =
                            (existing, value)
                        {
                            for (sub_key, sub_value) in overlay_map {
                                base_map
                                    .entry(sub_key.clone())
                                    .or_insert_with(|| sub_value.clone());
                            }
                        }
                    }
                }
            }
        }
        merged
    }

    /// Document-level unknown keys follow the same newer-side-as-base rule.
    fn merge_document_extra(
        &self,
        local: &Envelope,
        remote: Option<&Envelope>,
        remote_updated_at: Option<&str>,
    ) -> Map<String, Value> {
        let remote_extra = remote.map(|r| &r.extra);
        let remote_newer = parse_timestamp(remote_updated_at)
            > parse_timestamp(local.last_updated.as_deref());

        let (base, overlay) = match remote_extra {
            Some(remote_extra) if remote_newer => (remote_extra, &local.extra),
            Some(remote_extra) => (&local.extra, remote_extra),
            None => return local.extra.clone(),
        };

        let mut merged = base.clone();
        for (key, value) in overlay {
            merged.entry(key.clone()).or_insert_with(|| value.clone());
        }
        merged
    }
}
