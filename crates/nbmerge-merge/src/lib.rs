//! Merge engine: strategy-driven autoresolution of structural merge
//! conflicts.
//!
//! Takes the pre-merged document produced by an upstream structural merge
//! pass together with the two conflict diffs (the local and remote edits
//! that pass could not unify) and a per-path strategy table, and resolves
//! as many conflicts as the strategies allow. Returns the resolved
//! document plus two residual conflict diffs describing whatever remains,
//! rebased so they apply cleanly to the resolved value.

pub mod autoresolve;
pub mod chunks;
pub mod inline;
pub mod strategies;

use std::collections::BTreeMap;
use std::fmt;

use nbmerge_diff::{Diff, DiffError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use autoresolve::autoresolve;

/// A named conflict-resolution policy for a document path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Reset the value to an empty value of the same kind.
    Clear,
    /// Keep the base value, discarding both edits.
    UseBase,
    /// Apply the local edit, discarding the remote one.
    UseLocal,
    /// Apply the remote edit, discarding the local one.
    UseRemote,
    /// Concatenate the base, local, and remote sequences.
    Join,
    /// Replace conflicting source text with a marker-fenced block.
    InlineSource,
    /// Join output lists with marker records between the segments.
    InlineOutputs,
    /// Keep the base value and record both edits inside the mapping.
    RecordConflict,
    /// Leave the conflict for an external merge tool.
    Mergetool,
    /// Treat any conflict at this path as an error.
    Fail,
}

impl Strategy {
    /// Parse a strategy from its canonical hyphenated name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "clear" => Some(Self::Clear),
            "use-base" => Some(Self::UseBase),
            "use-local" => Some(Self::UseLocal),
            "use-remote" => Some(Self::UseRemote),
            "join" => Some(Self::Join),
            "inline-source" => Some(Self::InlineSource),
            "inline-outputs" => Some(Self::InlineOutputs),
            "record-conflict" => Some(Self::RecordConflict),
            "mergetool" => Some(Self::Mergetool),
            "fail" => Some(Self::Fail),
            _ => None,
        }
    }

    /// Return the canonical name for this strategy.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Clear => "clear",
            Self::UseBase => "use-base",
            Self::UseLocal => "use-local",
            Self::UseRemote => "use-remote",
            Self::Join => "join",
            Self::InlineSource => "inline-source",
            Self::InlineOutputs => "inline-outputs",
            Self::RecordConflict => "record-conflict",
            Self::Mergetool => "mergetool",
            Self::Fail => "fail",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Conflict-resolution strategies keyed by absolute document path.
///
/// Paths are slash-delimited and rooted at `""`; sequence elements are
/// addressed with a `*` component (e.g. `/cells/*/outputs`). Lookup is
/// exact-match only; the differ is expected to rewrite element paths to
/// `*` so one rule covers every element.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Strategies {
    entries: BTreeMap<String, Strategy>,
}

impl Strategies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the strategy for a path, replacing any previous rule.
    pub fn insert(&mut self, path: impl Into<String>, strategy: Strategy) {
        self.entries.insert(path.into(), strategy);
    }

    /// The strategy configured for exactly `path`, if any.
    pub fn lookup(&self, path: &str) -> Option<Strategy> {
        self.entries.get(path).copied()
    }

    /// True when no rules are configured.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Join a parent path and a child component.
pub(crate) fn join_path(path: &str, key: &str) -> String {
    format!("{path}/{key}")
}

/// Outcome of resolving one document node.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// The document with all strategy decisions applied.
    pub value: Value,
    /// Local edits that remain unresolved, rebased onto `value`.
    pub local_diff: Diff,
    /// Remote edits that remain unresolved, rebased onto `value`.
    pub remote_diff: Diff,
}

impl Resolution {
    /// True when no conflicts remain.
    pub fn is_clean(&self) -> bool {
        self.local_diff.is_empty() && self.remote_diff.is_empty()
    }
}

/// Error types for autoresolution.
///
/// All are fatal to the current resolution and carry the document path of
/// the offending node; no partial result is returned.
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    #[error("cannot autoresolve {kind} node at {path:?}")]
    InvalidNode { path: String, kind: &'static str },

    #[error("invalid item patch op {op:?} at {path:?}")]
    InvalidOp { path: String, op: &'static str },

    #[error("not expecting a conflict at {path:?}")]
    UnexpectedConflict { path: String },

    #[error("strategy {strategy} is not valid at {path:?}")]
    InvalidStrategy { path: String, strategy: Strategy },

    #[error("residual diff at {path:?} is malformed")]
    MalformedDiff {
        path: String,
        #[source]
        source: DiffError,
    },

    #[error("cannot encode conflict record at {path:?}")]
    RecordEncode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Diff(#[from] DiffError),
}
