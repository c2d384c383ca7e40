//! Patch application.
//!
//! Applies a diff to a document value, producing a new value. Inputs are
//! never mutated. Sequence diffs splice arrays element-wise and strings
//! character-wise; mapping diffs rewrite object entries by key.

use serde_json::{Map, Value};

use crate::{value_kind, Diff, DiffError, MapOp, SeqOp};

/// Apply `diff` to `value`, returning the patched value.
///
/// Total over well-formed inputs: ops must address keys/indices present in
/// the base (inserts may address one past the end), and sequence ops must
/// be ascending and non-overlapping.
pub fn patch(value: &Value, diff: &Diff) -> Result<Value, DiffError> {
    match (value, diff) {
        (Value::Object(entries), Diff::Mapping(ops)) => patch_mapping(entries, ops),
        (Value::Array(items), Diff::Sequence(ops)) => patch_sequence(items, ops),
        (Value::String(text), Diff::Sequence(ops)) => patch_string(text, ops),
        _ => Err(DiffError::IncompatibleTarget {
            kind: value_kind(value),
        }),
    }
}

fn patch_mapping(base: &Map<String, Value>, ops: &[MapOp]) -> Result<Value, DiffError> {
    let mut out = base.clone();
    for op in ops {
        match op {
            MapOp::Add { key, value } => {
                if out.contains_key(key) {
                    return Err(DiffError::DuplicateKey { key: key.clone() });
                }
                out.insert(key.clone(), value.clone());
            }
            MapOp::Remove { key } => {
                if out.remove(key).is_none() {
                    return Err(DiffError::MissingKey { key: key.clone() });
                }
            }
            MapOp::Replace { key, value } => match out.get_mut(key) {
                Some(slot) => *slot = value.clone(),
                None => return Err(DiffError::MissingKey { key: key.clone() }),
            },
            MapOp::Patch { key, diff } => {
                let target = base
                    .get(key)
                    .ok_or_else(|| DiffError::MissingKey { key: key.clone() })?;
                out.insert(key.clone(), patch(target, diff)?);
            }
        }
    }
    Ok(Value::Object(out))
}

fn patch_sequence(base: &[Value], ops: &[SeqOp]) -> Result<Value, DiffError> {
    let mut out: Vec<Value> = Vec::with_capacity(base.len());
    let mut take = 0usize;
    for (at, op) in ops.iter().enumerate() {
        let index = op.index();
        if index < take {
            return Err(DiffError::MalformedSequenceDiff {
                at,
                reason: "ops out of order or overlapping",
            });
        }
        if index > base.len() {
            return Err(DiffError::IndexOutOfBounds {
                index,
                len: base.len(),
            });
        }
        out.extend_from_slice(&base[take..index]);
        take = index;
        match op {
            SeqOp::AddRange { values, .. } => out.extend(values.iter().cloned()),
            SeqOp::RemoveRange { length, .. } => {
                let end = index + length;
                if end > base.len() {
                    return Err(DiffError::IndexOutOfBounds {
                        index: end,
                        len: base.len(),
                    });
                }
                take = end;
            }
            SeqOp::Replace { value, .. } => {
                if index >= base.len() {
                    return Err(DiffError::IndexOutOfBounds {
                        index,
                        len: base.len(),
                    });
                }
                out.push(value.clone());
                take = index + 1;
            }
            SeqOp::Patch { diff, .. } => {
                if index >= base.len() {
                    return Err(DiffError::IndexOutOfBounds {
                        index,
                        len: base.len(),
                    });
                }
                out.push(patch(&base[index], diff)?);
                take = index + 1;
            }
        }
    }
    out.extend_from_slice(&base[take..]);
    Ok(Value::Array(out))
}

/// Strings patch like sequences of characters: inserts carry string
/// fragments, removes drop character ranges. Replace/patch of a single
/// character is not part of the format.
fn patch_string(base: &str, ops: &[SeqOp]) -> Result<Value, DiffError> {
    let chars: Vec<char> = base.chars().collect();
    let mut out = String::with_capacity(base.len());
    let mut take = 0usize;
    for (at, op) in ops.iter().enumerate() {
        let index = op.index();
        if index < take {
            return Err(DiffError::MalformedSequenceDiff {
                at,
                reason: "ops out of order or overlapping",
            });
        }
        if index > chars.len() {
            return Err(DiffError::IndexOutOfBounds {
                index,
                len: chars.len(),
            });
        }
        out.extend(&chars[take..index]);
        take = index;
        match op {
            SeqOp::AddRange { values, .. } => {
                for value in values {
                    match value {
                        Value::String(fragment) => out.push_str(fragment),
                        _ => {
                            return Err(DiffError::MalformedSequenceDiff {
                                at,
                                reason: "non-string payload in string patch",
                            });
                        }
                    }
                }
            }
            SeqOp::RemoveRange { length, .. } => {
                let end = index + length;
                if end > chars.len() {
                    return Err(DiffError::IndexOutOfBounds {
                        index: end,
                        len: chars.len(),
                    });
                }
                take = end;
            }
            SeqOp::Replace { .. } | SeqOp::Patch { .. } => {
                return Err(DiffError::MalformedSequenceDiff {
                    at,
                    reason: "op not applicable inside a string",
                });
            }
        }
    }
    out.extend(&chars[take..]);
    Ok(Value::String(out))
}
