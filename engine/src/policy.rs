//! Per-field merge policy configuration.
//!
//! One reconciler, parameterized, instead of a merge routine per record
//! shape. Every field defaults to [`FieldPolicy::Replace`]; callers declare
//! the exceptions.

use crate::FieldKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How a field key present on both sides is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldPolicy {
    /// The winning side's value is kept wholesale (default)
    #[default]
    Replace,
    /// Sub-keys from both sides are unioned; the winning side's value is
    /// kept when a sub-key collides
    Accumulate,
}

/// Policy table consulted by the reconciler.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergePolicy {
    /// Fields with a non-default policy
    overrides: BTreeMap<FieldKey, FieldPolicy>,
}

impl MergePolicy {
    /// Create a policy table where every field replaces.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a field accumulative, builder style.
    pub fn with_accumulative(mut self, field: impl Into<FieldKey>) -> Self {
        self.overrides.insert(field.into(), FieldPolicy::Accumulate);
        self
    }

    /// Set the policy for a field.
    pub fn set(&mut self, field: impl Into<FieldKey>, policy: FieldPolicy) {
        self.overrides.insert(field.into(), policy);
    }

    /// Look up the policy for a field.
    pub fn policy_for(&self, field: &str) -> FieldPolicy {
        self.overrides.get(field).copied().unwrap_or_default()
    }

    /// Whether a field is merged key-by-key rather than replaced.
    pub fn is_accumulative(&self, field: &str) -> bool {
        self.policy_for(field) == FieldPolicy::Accumulate
    }
}
