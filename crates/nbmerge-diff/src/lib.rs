//! Structural diff model for JSON-shaped documents.
//!
//! Defines the diff algebra shared by the differ and the merge engine:
//! range inserts and removes plus per-element replace/patch for sequences,
//! and add/remove/replace/patch keyed by name for mappings. Also provides
//! validating diff builders and the patch primitive that re-applies a diff
//! to a document value.

pub mod builder;
pub mod patch;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use builder::{MappingDiffBuilder, SequenceDiffBuilder};
pub use patch::patch;

/// A single edit against a sequence (JSON array or string).
///
/// Ops are keyed on indices into the *base* sequence; an insert is keyed on
/// the base index it lands before, so an append uses `index == base.len()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum SeqOp {
    /// Insert `values` before base index `index`.
    AddRange { index: usize, values: Vec<Value> },
    /// Remove `length` elements starting at base index `index`.
    RemoveRange { index: usize, length: usize },
    /// Replace the element at `index` with `value`.
    Replace { index: usize, value: Value },
    /// Apply a nested diff to the element at `index`.
    Patch { index: usize, diff: Diff },
}

impl SeqOp {
    /// The base index this op is keyed on.
    pub fn index(&self) -> usize {
        match self {
            Self::AddRange { index, .. }
            | Self::RemoveRange { index, .. }
            | Self::Replace { index, .. }
            | Self::Patch { index, .. } => *index,
        }
    }

    /// Half-open span of base indices this op consumes.
    ///
    /// An insert consumes nothing (`[index, index)`).
    pub fn span(&self) -> (usize, usize) {
        match self {
            Self::AddRange { index, .. } => (*index, *index),
            Self::RemoveRange { index, length } => (*index, *index + *length),
            Self::Replace { index, .. } | Self::Patch { index, .. } => (*index, *index + 1),
        }
    }

    /// A copy of this op re-keyed by a signed offset.
    ///
    /// Used when re-emitting residual ops against a sequence whose length
    /// has drifted from the base it was diffed against.
    #[must_use]
    pub fn with_offset(&self, delta: isize) -> Self {
        let index = (self.index() as isize + delta) as usize;
        match self {
            Self::AddRange { values, .. } => Self::AddRange {
                index,
                values: values.clone(),
            },
            Self::RemoveRange { length, .. } => Self::RemoveRange {
                index,
                length: *length,
            },
            Self::Replace { value, .. } => Self::Replace {
                index,
                value: value.clone(),
            },
            Self::Patch { diff, .. } => Self::Patch {
                index,
                diff: diff.clone(),
            },
        }
    }

    /// The serialized name of this op kind.
    pub fn op_name(&self) -> &'static str {
        match self {
            Self::AddRange { .. } => "add-range",
            Self::RemoveRange { .. } => "remove-range",
            Self::Replace { .. } => "replace",
            Self::Patch { .. } => "patch",
        }
    }
}

/// A single edit against a mapping, keyed by entry name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum MapOp {
    /// Add a new entry (the key must not exist in the base).
    Add { key: String, value: Value },
    /// Remove an existing entry.
    Remove { key: String },
    /// Replace an existing entry's value.
    Replace { key: String, value: Value },
    /// Apply a nested diff to an existing entry's value.
    Patch { key: String, diff: Diff },
}

impl MapOp {
    /// The mapping key this op addresses.
    pub fn key(&self) -> &str {
        match self {
            Self::Add { key, .. }
            | Self::Remove { key }
            | Self::Replace { key, .. }
            | Self::Patch { key, .. } => key,
        }
    }

    /// The serialized name of this op kind.
    pub fn op_name(&self) -> &'static str {
        match self {
            Self::Add { .. } => "add",
            Self::Remove { .. } => "remove",
            Self::Replace { .. } => "replace",
            Self::Patch { .. } => "patch",
        }
    }
}

/// A diff: an ordered list of ops sharing a target shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Diff {
    /// Ops against a sequence (array or string), ascending by index.
    Sequence(Vec<SeqOp>),
    /// Ops against a mapping, at most one per key.
    Mapping(Vec<MapOp>),
}

impl Diff {
    /// An empty sequence diff.
    pub fn empty_sequence() -> Self {
        Self::Sequence(Vec::new())
    }

    /// An empty mapping diff.
    pub fn empty_mapping() -> Self {
        Self::Mapping(Vec::new())
    }

    /// True when the diff carries no ops.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Sequence(ops) => ops.is_empty(),
            Self::Mapping(ops) => ops.is_empty(),
        }
    }

    /// Key-indexed view of a mapping diff (at most one op per key).
    ///
    /// Accepts the list form handed in by callers and normalizes it; a
    /// repeated key is malformed.
    pub fn as_key_map(&self) -> Result<BTreeMap<&str, &MapOp>, DiffError> {
        let Self::Mapping(ops) = self else {
            return Err(DiffError::IncompatibleTarget { kind: "object" });
        };
        let mut view = BTreeMap::new();
        for op in ops {
            if view.insert(op.key(), op).is_some() {
                return Err(DiffError::MalformedMappingDiff {
                    key: op.key().to_string(),
                });
            }
        }
        Ok(view)
    }
}

/// Name of a JSON value's kind, for diagnostics.
pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Error types for diff handling.
#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    #[error("diff does not apply to {kind} value")]
    IncompatibleTarget { kind: &'static str },

    #[error("mapping diff adds key {key:?} which already exists")]
    DuplicateKey { key: String },

    #[error("mapping diff addresses missing key {key:?}")]
    MissingKey { key: String },

    #[error("sequence diff index {index} out of bounds for length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("malformed sequence diff at op {at}: {reason}")]
    MalformedSequenceDiff { at: usize, reason: &'static str },

    #[error("malformed mapping diff: duplicate key {key:?}")]
    MalformedMappingDiff { key: String },
}
