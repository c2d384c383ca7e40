//! Strategy interpretation for single conflicts.
//!
//! Implements the value-producing strategies for one mapping-item conflict
//! and the reduced strategy set that applies when a whole sequence is
//! addressed by a `.../*` rule.

use nbmerge_diff::{patch, Diff, MapOp, SeqOp};
use serde_json::{Map, Value};
use tracing::debug;

use crate::inline::{as_text_lines, marker_output, merge_display_lines, MARKER_WIDTH};
use crate::{MergeError, Resolution, Strategy};

/// Result of applying one side's edit to a single item.
///
/// `Deleted` must never be stored in an output container; the resolvers
/// interpret it as "omit this slot".
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Patched {
    Value(Value),
    Deleted,
}

/// Apply one side's op to a single mapping item.
///
/// `None` leaves the value untouched; a remove yields [`Patched::Deleted`].
/// Adds are not item patches; there is no base item to patch.
pub(crate) fn patch_item(
    value: &Value,
    op: Option<&MapOp>,
    path: &str,
) -> Result<Patched, MergeError> {
    match op {
        None => Ok(Patched::Value(value.clone())),
        Some(MapOp::Replace { value: new, .. }) => Ok(Patched::Value(new.clone())),
        Some(MapOp::Patch { diff, .. }) => Ok(Patched::Value(patch(value, diff)?)),
        Some(MapOp::Remove { .. }) => Ok(Patched::Deleted),
        Some(other @ MapOp::Add { .. }) => Err(MergeError::InvalidOp {
            path: path.to_string(),
            op: other.op_name(),
        }),
    }
}

/// An empty value of the same kind: `[]`, `{}`, `""`, or null.
pub(crate) fn cleared_value(value: &Value) -> Value {
    match value {
        Value::Array(_) => Value::Array(Vec::new()),
        Value::Object(_) => Value::Object(Map::new()),
        Value::String(_) => Value::String(String::new()),
        _ => Value::Null,
    }
}

/// One side's post-patch sequence items, treating a removal as empty.
fn sequence_items(
    value: &Value,
    op: Option<&MapOp>,
    strategy: Strategy,
    path: &str,
) -> Result<Vec<Value>, MergeError> {
    match patch_item(value, op, path)? {
        Patched::Deleted => Ok(Vec::new()),
        Patched::Value(Value::Array(items)) => Ok(items),
        Patched::Value(_) => Err(MergeError::InvalidStrategy {
            path: path.to_string(),
            strategy,
        }),
    }
}

/// Concatenate the base sequence with both sides' versions of it.
fn join_value(
    value: &Value,
    le: Option<&MapOp>,
    re: Option<&MapOp>,
    path: &str,
) -> Result<Value, MergeError> {
    let Value::Array(base) = value else {
        return Err(MergeError::InvalidStrategy {
            path: path.to_string(),
            strategy: Strategy::Join,
        });
    };
    let local = sequence_items(value, le, Strategy::Join, path)?;
    let remote = sequence_items(value, re, Strategy::Join, path)?;

    let mut joined = base.clone();
    joined.extend(local);
    joined.extend(remote);
    Ok(Value::Array(joined))
}

/// Join two output lists with stream records marking the segments.
fn inline_outputs_value(
    value: &Value,
    le: Option<&MapOp>,
    re: Option<&MapOp>,
    path: &str,
) -> Result<Value, MergeError> {
    let Value::Array(base) = value else {
        return Err(MergeError::InvalidStrategy {
            path: path.to_string(),
            strategy: Strategy::InlineOutputs,
        });
    };
    let local = sequence_items(value, le, Strategy::InlineOutputs, path)?;
    let remote = sequence_items(value, re, Strategy::InlineOutputs, path)?;

    let mut joined = base.clone();
    joined.push(marker_output(format!("{}local", "<".repeat(MARKER_WIDTH))));
    joined.extend(local);
    joined.push(marker_output("=".repeat(MARKER_WIDTH)));
    joined.extend(remote);
    joined.push(marker_output(format!("{}remote", "<".repeat(MARKER_WIDTH))));
    Ok(Value::Array(joined))
}

/// One side's post-patch text, treating a removal as empty text.
fn side_text_lines(
    base: &Value,
    op: &MapOp,
    path: &str,
) -> Result<Vec<String>, MergeError> {
    match patch_item(base, Some(op), path)? {
        Patched::Deleted => Ok(Vec::new()),
        Patched::Value(patched) => as_text_lines(&patched).ok_or_else(|| {
            MergeError::InvalidStrategy {
                path: path.to_string(),
                strategy: Strategy::InlineSource,
            }
        }),
    }
}

/// Replace conflicting source text with a marker-fenced three-way block.
fn inline_source_value(
    value: &Value,
    le: &MapOp,
    re: &MapOp,
    path: &str,
) -> Result<Value, MergeError> {
    let base = as_text_lines(value).ok_or_else(|| MergeError::InvalidStrategy {
        path: path.to_string(),
        strategy: Strategy::InlineSource,
    })?;
    let local = side_text_lines(value, le, path)?;
    let remote = side_text_lines(value, re, path)?;

    let lines = merge_display_lines(&base, &local, &remote);
    Ok(Value::Array(lines.into_iter().map(Value::String).collect()))
}

/// Record both sides' unresolved ops inside the mapping itself, under an
/// `nbdime-conflicts` entry, for later mergetool inspection.
fn conflicts_record(
    value: &Value,
    le: Option<&MapOp>,
    re: Option<&MapOp>,
    path: &str,
) -> Result<Value, MergeError> {
    let Value::Object(entries) = value else {
        return Err(MergeError::InvalidStrategy {
            path: path.to_string(),
            strategy: Strategy::RecordConflict,
        });
    };
    let encode = |op: &MapOp| {
        serde_json::to_value(op).map_err(|source| MergeError::RecordEncode {
            path: path.to_string(),
            source,
        })
    };

    let mut record = Map::new();
    if let Some(op) = le {
        record.insert("local".to_string(), encode(op)?);
    }
    if let Some(op) = re {
        record.insert("remote".to_string(), encode(op)?);
    }

    let mut out = entries.clone();
    out.insert("nbdime-conflicts".to_string(), Value::Object(record));
    Ok(Value::Object(out))
}

/// Resolve a single mapping-item conflict under `strategy`.
///
/// Returns the new value plus whatever each side still wants; every
/// strategy except `mergetool` consumes both edits. At most one of `le`,
/// `re` may be absent.
pub(crate) fn resolve_item_conflict(
    value: &Value,
    le: Option<&MapOp>,
    re: Option<&MapOp>,
    strategy: Strategy,
    path: &str,
) -> Result<(Patched, Option<MapOp>, Option<MapOp>), MergeError> {
    debug!(path, %strategy, "autoresolving conflict");

    let patched = match strategy {
        Strategy::Clear => Patched::Value(cleared_value(value)),
        Strategy::UseBase => Patched::Value(value.clone()),
        Strategy::UseLocal => patch_item(value, le, path)?,
        Strategy::UseRemote => patch_item(value, re, path)?,
        _ => {
            if le.is_none() || re.is_none() || le == re {
                // One-sided or identical edits are not a real conflict;
                // apply the edit before consulting two-sided strategies.
                debug!(path, "no actual conflict");
                let chosen = if le.is_none() { re } else { le };
                patch_item(value, chosen, path)?
            } else {
                match strategy {
                    Strategy::InlineSource => {
                        // Both present: the one-sided case returned above.
                        let (Some(le), Some(re)) = (le, re) else {
                            unreachable!()
                        };
                        Patched::Value(inline_source_value(value, le, re, path)?)
                    }
                    Strategy::InlineOutputs => {
                        Patched::Value(inline_outputs_value(value, le, re, path)?)
                    }
                    Strategy::Join => Patched::Value(join_value(value, le, re, path)?),
                    Strategy::RecordConflict => {
                        Patched::Value(conflicts_record(value, le, re, path)?)
                    }
                    Strategy::Mergetool => {
                        // Leave this conflict for an external tool.
                        return Ok((
                            Patched::Value(value.clone()),
                            le.cloned(),
                            re.cloned(),
                        ));
                    }
                    Strategy::Fail => {
                        return Err(MergeError::UnexpectedConflict {
                            path: path.to_string(),
                        });
                    }
                    Strategy::Clear
                    | Strategy::UseBase
                    | Strategy::UseLocal
                    | Strategy::UseRemote => unreachable!(),
                }
            }
        }
    };

    Ok((patched, None, None))
}

/// Resolve a conflict addressed to a whole sequence by a `.../*` rule.
///
/// Only the pass-through and pick-a-side strategies are meaningful here;
/// the value-producing strategies belong to the parent item and are
/// rejected.
pub(crate) fn resolve_sequence_conflict(
    merged: &[Value],
    local: &[SeqOp],
    remote: &[SeqOp],
    strategy: Strategy,
    path: &str,
) -> Result<Resolution, MergeError> {
    if strategy == Strategy::Mergetool {
        return Ok(Resolution {
            value: Value::Array(merged.to_vec()),
            local_diff: Diff::Sequence(local.to_vec()),
            remote_diff: Diff::Sequence(remote.to_vec()),
        });
    }

    debug!(path, %strategy, "autoresolving conflict");

    let value = match strategy {
        Strategy::UseBase => Value::Array(merged.to_vec()),
        Strategy::UseLocal => patch(
            &Value::Array(merged.to_vec()),
            &Diff::Sequence(local.to_vec()),
        )?,
        Strategy::UseRemote => patch(
            &Value::Array(merged.to_vec()),
            &Diff::Sequence(remote.to_vec()),
        )?,
        Strategy::Fail => {
            return Err(MergeError::UnexpectedConflict {
                path: path.to_string(),
            });
        }
        _ => {
            return Err(MergeError::InvalidStrategy {
                path: path.to_string(),
                strategy,
            });
        }
    };

    Ok(Resolution {
        value,
        local_diff: Diff::empty_sequence(),
        remote_diff: Diff::empty_sequence(),
    })
}
