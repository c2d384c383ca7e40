//! Validating builders for sequence and mapping diffs.
//!
//! Resolvers accumulate residual conflict ops incrementally; the builders
//! check on completion that the accumulated ops form a well-formed diff:
//! unique keys for mappings, ascending non-overlapping ranges for
//! sequences, with an insert allowed directly before a same-index op.

use crate::{Diff, DiffError, MapOp, SeqOp};

/// Accumulates ops against a sequence and validates them on completion.
#[derive(Debug, Default)]
pub struct SequenceDiffBuilder {
    ops: Vec<SeqOp>,
}

impl SequenceDiffBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no ops have been accumulated.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Append an op.
    pub fn push(&mut self, op: SeqOp) {
        self.ops.push(op);
    }

    /// Append a nested patch at `index`. Empty sub-diffs are dropped.
    pub fn push_patch(&mut self, index: usize, diff: Diff) {
        if !diff.is_empty() {
            self.ops.push(SeqOp::Patch { index, diff });
        }
    }

    /// Finish and validate the accumulated ops.
    ///
    /// Requires ascending indices, non-overlapping spans, and at most one
    /// insert plus one non-insert per index, insert first. Degenerate ops
    /// (empty insert payloads, zero-length removes) are rejected.
    pub fn into_validated(self) -> Result<Diff, DiffError> {
        let mut prev: Option<&SeqOp> = None;
        let mut covered = 0usize;
        for (at, op) in self.ops.iter().enumerate() {
            match op {
                SeqOp::AddRange { values, .. } if values.is_empty() => {
                    return Err(DiffError::MalformedSequenceDiff {
                        at,
                        reason: "empty insert payload",
                    });
                }
                SeqOp::RemoveRange { length: 0, .. } => {
                    return Err(DiffError::MalformedSequenceDiff {
                        at,
                        reason: "zero-length remove",
                    });
                }
                _ => {}
            }

            let (start, end) = op.span();
            if start < covered {
                return Err(DiffError::MalformedSequenceDiff {
                    at,
                    reason: "ops out of order or overlapping",
                });
            }
            if let Some(previous) = prev {
                let same_index = previous.index() == op.index();
                let insert_then_edit = matches!(previous, SeqOp::AddRange { .. })
                    && !matches!(op, SeqOp::AddRange { .. });
                if same_index && !insert_then_edit {
                    return Err(DiffError::MalformedSequenceDiff {
                        at,
                        reason: "conflicting ops at the same index",
                    });
                }
            }
            covered = covered.max(end);
            prev = Some(op);
        }
        Ok(Diff::Sequence(self.ops))
    }
}

/// Accumulates ops against a mapping and validates them on completion.
#[derive(Debug, Default)]
pub struct MappingDiffBuilder {
    ops: Vec<MapOp>,
}

impl MappingDiffBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no ops have been accumulated.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Append an op.
    pub fn push(&mut self, op: MapOp) {
        self.ops.push(op);
    }

    /// Append a nested patch under `key`. Empty sub-diffs are dropped.
    pub fn push_patch(&mut self, key: String, diff: Diff) {
        if !diff.is_empty() {
            self.ops.push(MapOp::Patch { key, diff });
        }
    }

    /// Finish and validate the accumulated ops.
    ///
    /// Keys must be unique; the output is sorted by key so residual diffs
    /// are reproducible across runs.
    pub fn into_validated(mut self) -> Result<Diff, DiffError> {
        self.ops.sort_by(|a, b| a.key().cmp(b.key()));
        for pair in self.ops.windows(2) {
            if pair[0].key() == pair[1].key() {
                return Err(DiffError::MalformedMappingDiff {
                    key: pair[0].key().to_string(),
                });
            }
        }
        Ok(Diff::Mapping(self.ops))
    }
}
