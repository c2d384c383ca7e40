//! The recursive autoresolve traversal.
//!
//! Walks the pre-merged document guided by the two conflict diffs in
//! parallel, dispatching each node to the mapping or sequence resolver.
//! Strategy rules are consulted per path; nested patch/patch conflicts
//! recurse back through [`autoresolve`].

use nbmerge_diff::{
    value_kind, Diff, DiffError, MapOp, MappingDiffBuilder, SeqOp, SequenceDiffBuilder,
};
use serde_json::{Map, Value};
use tracing::debug;

use crate::chunks::make_merge_chunks;
use crate::strategies::{patch_item, resolve_item_conflict, resolve_sequence_conflict, Patched};
use crate::{join_path, MergeError, Resolution, Strategies};

/// Resolve as many conflicts as the strategy table allows.
///
/// `merged` is the document produced by the upstream structural merge
/// pass; `local_diff` and `remote_diff` carry the edits that pass could
/// not unify. Returns the resolved document together with the residual
/// conflict diffs, which are validated diffs that apply cleanly to the
/// resolved value. Top-level callers pass `""` as the root path.
pub fn autoresolve(
    merged: &Value,
    local_diff: &Diff,
    remote_diff: &Diff,
    strategies: &Strategies,
    path: &str,
) -> Result<Resolution, MergeError> {
    match merged {
        Value::Object(entries) => {
            resolve_mapping(entries, local_diff, remote_diff, strategies, path)
        }
        Value::Array(items) => resolve_sequence(items, local_diff, remote_diff, strategies, path),
        other => Err(MergeError::InvalidNode {
            path: path.to_string(),
            kind: value_kind(other),
        }),
    }
}

fn resolve_mapping(
    merged: &Map<String, Value>,
    local_diff: &Diff,
    remote_diff: &Diff,
    strategies: &Strategies,
    path: &str,
) -> Result<Resolution, MergeError> {
    let lcd = local_diff.as_key_map()?;
    let rcd = remote_diff.as_key_map()?;

    // Unchanged keys pass straight through.
    let mut resolved: Map<String, Value> = merged
        .iter()
        .filter(|(key, _)| !lcd.contains_key(key.as_str()) && !rcd.contains_key(key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    let mut new_local = MappingDiffBuilder::new();
    let mut new_remote = MappingDiffBuilder::new();

    // Lexicographic iteration keeps residual diffs reproducible.
    let mut keys: Vec<&str> = lcd.keys().chain(rcd.keys()).copied().collect();
    keys.sort_unstable();
    keys.dedup();

    for key in keys {
        let subpath = join_path(path, key);
        let le = lcd.get(key).copied();
        let re = rcd.get(key).copied();

        let Some(value) = merged.get(key) else {
            resolve_missing_item(key, le, re, &mut resolved, &mut new_local, &mut new_remote, &subpath);
            continue;
        };

        let patched = if let Some(strategy) = strategies.lookup(&subpath) {
            let (patched, residual_le, residual_re) =
                resolve_item_conflict(value, le, re, strategy, &subpath)?;
            if let Some(op) = residual_le {
                new_local.push(op);
            }
            if let Some(op) = residual_re {
                new_remote.push(op);
            }
            patched
        } else if let (
            Some(MapOp::Patch { diff: ld, .. }),
            Some(MapOp::Patch { diff: rd, .. }),
        ) = (le, re)
        {
            // No rule here, but both sides patch the subdocument: recurse.
            let sub = autoresolve(value, ld, rd, strategies, &subpath)?;
            new_local.push_patch(key.to_string(), sub.local_diff);
            new_remote.push_patch(key.to_string(), sub.remote_diff);
            Patched::Value(sub.value)
        } else if le.is_none() || re.is_none() || le == re {
            // A one-sided or identical edit is not a real conflict.
            debug!(path = subpath.as_str(), "no actual conflict");
            let chosen = if le.is_none() { re } else { le };
            patch_item(value, chosen, &subpath)?
        } else {
            // Replace/replace, remove/patch and friends are not resolved
            // without an explicit rule; keep the conflict as-is.
            if let Some(op) = le {
                new_local.push(op.clone());
            }
            if let Some(op) = re {
                new_remote.push(op.clone());
            }
            Patched::Value(value.clone())
        };

        match patched {
            Patched::Value(new_value) => {
                resolved.insert(key.to_string(), new_value);
            }
            Patched::Deleted => {}
        }
    }

    Ok(Resolution {
        value: Value::Object(resolved),
        local_diff: new_local
            .into_validated()
            .map_err(|source| malformed(path, source))?,
        remote_diff: new_remote
            .into_validated()
            .map_err(|source| malformed(path, source))?,
    })
}

/// Handle a conflicted key with no base item (both sides added it).
///
/// Identical or one-sided adds go through; anything else has no base
/// value to resolve against and passes through as residuals.
fn resolve_missing_item(
    key: &str,
    le: Option<&MapOp>,
    re: Option<&MapOp>,
    resolved: &mut Map<String, Value>,
    new_local: &mut MappingDiffBuilder,
    new_remote: &mut MappingDiffBuilder,
    subpath: &str,
) {
    if le.is_none() || re.is_none() || le == re {
        let chosen = if le.is_none() { re } else { le };
        if let Some(MapOp::Add { value, .. }) = chosen {
            debug!(path = subpath, "no actual conflict");
            resolved.insert(key.to_string(), value.clone());
            return;
        }
    }
    if let Some(op) = le {
        new_local.push(op.clone());
    }
    if let Some(op) = re {
        new_remote.push(op.clone());
    }
}

fn resolve_sequence(
    merged: &[Value],
    local_diff: &Diff,
    remote_diff: &Diff,
    strategies: &Strategies,
    path: &str,
) -> Result<Resolution, MergeError> {
    let local_ops = sequence_ops(local_diff)?;
    let remote_ops = sequence_ops(remote_diff)?;

    // A rule addressing the elements overrides per-chunk handling.
    let subpath = join_path(path, "*");
    if let Some(strategy) = strategies.lookup(&subpath) {
        return resolve_sequence_conflict(merged, local_ops, remote_ops, strategy, path);
    }

    let mut resolved: Vec<Value> = Vec::with_capacity(merged.len());
    let mut new_local = SequenceDiffBuilder::new();
    let mut new_remote = SequenceDiffBuilder::new();

    // Index drift between `merged` and `resolved` accumulated so far,
    // applied to residual ops re-emitted against `resolved`.
    let mut merged_offset: isize = 0;

    for chunk in make_merge_chunks(merged.len(), local_ops, remote_ops) {
        // Clamp against ops addressing past the end of the base
        // (malformed input) rather than panicking.
        let end = chunk.end.min(merged.len());
        let base_slice = &merged[chunk.begin.min(end)..end];

        if chunk.is_untouched() {
            resolved.extend_from_slice(base_slice);
            continue;
        }

        match (
            side_patch(&chunk.local),
            side_patch(&chunk.remote),
            merged.get(chunk.begin),
        ) {
            (
                Some((local_sub, local_inserts)),
                Some((remote_sub, remote_inserts)),
                Some(element),
            ) => {
                // Both sides patch the same element; recurse into it. The
                // chunk aligner guarantees this chunk covers exactly one
                // base element.
                let sub = autoresolve(element, local_sub, remote_sub, strategies, &subpath)?;

                if sub.is_clean() {
                    // The element resolved fully; accept inserts from both
                    // sides, local first.
                    for op in local_inserts.iter().chain(&remote_inserts) {
                        if let SeqOp::AddRange { values, .. } = op {
                            resolved.extend(values.iter().cloned());
                            merged_offset += values.len() as isize;
                        }
                    }
                    resolved.push(sub.value);
                } else {
                    // Unresolved inserts stay conflicts at their original
                    // base index; `resolved` has not grown by them.
                    for op in local_inserts {
                        new_local.push(op.clone());
                    }
                    for op in remote_inserts {
                        new_remote.push(op.clone());
                    }
                    resolved.push(sub.value);
                    let final_index = resolved.len() - 1;
                    new_local.push_patch(final_index, sub.local_diff);
                    new_remote.push_patch(final_index, sub.remote_diff);
                }
            }
            _ => {
                // Any other mix of edits is kept as a conflict: keep the
                // base slice and re-emit both sides' ops against the
                // drifted indices.
                resolved.extend_from_slice(base_slice);
                for op in &chunk.local {
                    new_local.push(op.with_offset(merged_offset));
                }
                for op in &chunk.remote {
                    new_remote.push(op.with_offset(merged_offset));
                }
            }
        }
    }

    Ok(Resolution {
        value: Value::Array(resolved),
        local_diff: new_local
            .into_validated()
            .map_err(|source| malformed(path, source))?,
        remote_diff: new_remote
            .into_validated()
            .map_err(|source| malformed(path, source))?,
    })
}

/// Split a chunk side into its single patch op's diff and the insert ops
/// around it, when the side has exactly that shape.
fn side_patch(ops: &[SeqOp]) -> Option<(&Diff, Vec<&SeqOp>)> {
    let mut sub_diff = None;
    let mut inserts = Vec::new();
    for op in ops {
        match op {
            SeqOp::Patch { diff, .. } => {
                if sub_diff.replace(diff).is_some() {
                    return None;
                }
            }
            SeqOp::AddRange { .. } => inserts.push(op),
            SeqOp::RemoveRange { .. } | SeqOp::Replace { .. } => return None,
        }
    }
    sub_diff.map(|diff| (diff, inserts))
}

fn sequence_ops(diff: &Diff) -> Result<&[SeqOp], MergeError> {
    match diff {
        Diff::Sequence(ops) => Ok(ops),
        Diff::Mapping(_) => Err(MergeError::Diff(DiffError::IncompatibleTarget {
            kind: "array",
        })),
    }
}

fn malformed(path: &str, source: DiffError) -> MergeError {
    MergeError::MalformedDiff {
        path: path.to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Strategy;
    use serde_json::json;

    fn no_strategies() -> Strategies {
        Strategies::new()
    }

    fn empty_map_diff() -> Diff {
        Diff::empty_mapping()
    }

    #[test]
    fn scalar_nodes_are_rejected() {
        let result = autoresolve(
            &json!(42),
            &empty_map_diff(),
            &empty_map_diff(),
            &no_strategies(),
            "/a",
        );
        assert!(matches!(
            result,
            Err(MergeError::InvalidNode { path, kind: "number" }) if path == "/a"
        ));
    }

    #[test]
    fn clean_inputs_pass_through() {
        let merged = json!({"a": 1, "b": [1, 2]});
        let resolution = autoresolve(
            &merged,
            &empty_map_diff(),
            &empty_map_diff(),
            &no_strategies(),
            "",
        )
        .unwrap();
        assert_eq!(resolution.value, merged);
        assert!(resolution.is_clean());
    }

    #[test]
    fn nested_patch_recursion_resolves_with_strategy() {
        let merged = json!({"outer": {"inner": "base"}});
        let local = Diff::Mapping(vec![MapOp::Patch {
            key: "outer".into(),
            diff: Diff::Mapping(vec![MapOp::Replace {
                key: "inner".into(),
                value: json!("L"),
            }]),
        }]);
        let remote = Diff::Mapping(vec![MapOp::Patch {
            key: "outer".into(),
            diff: Diff::Mapping(vec![MapOp::Replace {
                key: "inner".into(),
                value: json!("R"),
            }]),
        }]);
        let mut strategies = Strategies::new();
        strategies.insert("/outer/inner", Strategy::UseRemote);

        let resolution = autoresolve(&merged, &local, &remote, &strategies, "").unwrap();
        assert_eq!(resolution.value, json!({"outer": {"inner": "R"}}));
        assert!(resolution.is_clean());
    }

    #[test]
    fn nested_patch_recursion_keeps_residuals_wrapped() {
        let merged = json!({"outer": {"inner": "base"}});
        let local = Diff::Mapping(vec![MapOp::Patch {
            key: "outer".into(),
            diff: Diff::Mapping(vec![MapOp::Replace {
                key: "inner".into(),
                value: json!("L"),
            }]),
        }]);
        let remote = Diff::Mapping(vec![MapOp::Patch {
            key: "outer".into(),
            diff: Diff::Mapping(vec![MapOp::Replace {
                key: "inner".into(),
                value: json!("R"),
            }]),
        }]);

        let resolution = autoresolve(&merged, &local, &remote, &no_strategies(), "").unwrap();
        // Unresolvable replace/replace stays below the outer patch.
        assert_eq!(resolution.value, merged);
        let Diff::Mapping(ops) = &resolution.local_diff else {
            panic!("expected mapping diff");
        };
        assert!(
            matches!(&ops[0], MapOp::Patch { key, diff: Diff::Mapping(inner) }
                if key == "outer" && matches!(&inner[0], MapOp::Replace { key, .. } if key == "inner"))
        );
    }

    #[test]
    fn missing_base_item_with_equal_adds_resolves() {
        let merged = json!({});
        let add = MapOp::Add {
            key: "new".into(),
            value: json!(7),
        };
        let local = Diff::Mapping(vec![add.clone()]);
        let remote = Diff::Mapping(vec![add]);
        let resolution = autoresolve(&merged, &local, &remote, &no_strategies(), "").unwrap();
        assert_eq!(resolution.value, json!({"new": 7}));
        assert!(resolution.is_clean());
    }

    #[test]
    fn missing_base_item_with_differing_adds_passes_through() {
        let merged = json!({});
        let local = Diff::Mapping(vec![MapOp::Add {
            key: "new".into(),
            value: json!(1),
        }]);
        let remote = Diff::Mapping(vec![MapOp::Add {
            key: "new".into(),
            value: json!(2),
        }]);
        let resolution = autoresolve(&merged, &local, &remote, &no_strategies(), "").unwrap();
        assert_eq!(resolution.value, json!({}));
        assert_eq!(resolution.local_diff, local);
        assert_eq!(resolution.remote_diff, remote);
    }

    #[test]
    fn sequence_other_case_offsets_residual_ops() {
        // First chunk accepts inserts (growing the resolved sequence),
        // second chunk keeps its conflict; its residual ops must shift by
        // the growth.
        let merged = json!([{"v": 1}, "keep", "fought-over"]);
        let sub_replace = |value: Value| {
            Diff::Mapping(vec![MapOp::Replace {
                key: "v".into(),
                value,
            }])
        };
        let local = Diff::Sequence(vec![
            SeqOp::AddRange {
                index: 0,
                values: vec![json!("li")],
            },
            SeqOp::Patch {
                index: 0,
                diff: sub_replace(json!(2)),
            },
            SeqOp::Replace {
                index: 2,
                value: json!("L"),
            },
        ]);
        let remote = Diff::Sequence(vec![
            SeqOp::Patch {
                index: 0,
                diff: sub_replace(json!(2)),
            },
            SeqOp::Replace {
                index: 2,
                value: json!("R"),
            },
        ]);

        let resolution = autoresolve(&merged, &local, &remote, &no_strategies(), "").unwrap();
        assert_eq!(
            resolution.value,
            json!(["li", {"v": 2}, "keep", "fought-over"])
        );
        // The replace/replace conflict shifted from index 2 to 3.
        assert_eq!(
            resolution.local_diff,
            Diff::Sequence(vec![SeqOp::Replace {
                index: 3,
                value: json!("L"),
            }])
        );
        assert_eq!(
            resolution.remote_diff,
            Diff::Sequence(vec![SeqOp::Replace {
                index: 3,
                value: json!("R"),
            }])
        );
    }

    #[test]
    fn sequence_star_strategy_overrides_chunk_handling() {
        let merged = json!([1, 2]);
        let local = Diff::Sequence(vec![SeqOp::Replace {
            index: 0,
            value: json!(10),
        }]);
        let remote = Diff::Sequence(vec![SeqOp::Replace {
            index: 0,
            value: json!(20),
        }]);
        let mut strategies = Strategies::new();
        strategies.insert("/*", Strategy::UseRemote);

        let resolution = autoresolve(&merged, &local, &remote, &strategies, "").unwrap();
        assert_eq!(resolution.value, json!([20, 2]));
        assert!(resolution.is_clean());
    }

    #[test]
    fn residuals_apply_cleanly_to_resolved_value() {
        let merged = json!({"a": 1, "b": {"x": "base"}});
        let local = Diff::Mapping(vec![
            MapOp::Replace {
                key: "a".into(),
                value: json!(2),
            },
            MapOp::Patch {
                key: "b".into(),
                diff: Diff::Mapping(vec![MapOp::Replace {
                    key: "x".into(),
                    value: json!("L"),
                }]),
            },
        ]);
        let remote = Diff::Mapping(vec![
            MapOp::Replace {
                key: "a".into(),
                value: json!(3),
            },
            MapOp::Patch {
                key: "b".into(),
                diff: Diff::Mapping(vec![MapOp::Replace {
                    key: "x".into(),
                    value: json!("R"),
                }]),
            },
        ]);

        let resolution = autoresolve(&merged, &local, &remote, &no_strategies(), "").unwrap();
        assert_eq!(resolution.value, merged);
        // Each residual is a valid diff against the resolved value.
        assert!(nbmerge_diff::patch(&resolution.value, &resolution.local_diff).is_ok());
        assert!(nbmerge_diff::patch(&resolution.value, &resolution.remote_diff).is_ok());
    }
}
