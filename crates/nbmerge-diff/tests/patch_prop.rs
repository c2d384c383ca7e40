//! Property-based tests for patch application.

use nbmerge_diff::{patch, Diff, MapOp, SeqOp, SequenceDiffBuilder};
use proptest::prelude::*;
use serde_json::{json, Map, Value};

fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i32>().prop_map(|n| json!(n)),
        "[a-z]{0,6}".prop_map(Value::String),
    ]
}

/// A base sequence plus a well-formed diff against it, built by walking the
/// base left to right: before each position optionally insert, at each
/// position keep, remove, or replace.
fn base_and_seq_diff() -> impl Strategy<Value = (Vec<Value>, Vec<SeqOp>)> {
    prop::collection::vec(scalar(), 0..8).prop_flat_map(|base| {
        let len = base.len();
        let steps = prop::collection::vec(
            (
                0..3u8,
                prop::option::of(prop::collection::vec(scalar(), 1..3)),
            ),
            len + 1,
        );
        (Just(base), steps).prop_map(|(base, steps)| {
            let mut ops = Vec::new();
            for (i, (edit, insert)) in steps.iter().enumerate() {
                if let Some(values) = insert {
                    ops.push(SeqOp::AddRange {
                        index: i,
                        values: values.clone(),
                    });
                }
                if i < base.len() {
                    match edit {
                        1 => ops.push(SeqOp::RemoveRange { index: i, length: 1 }),
                        2 => ops.push(SeqOp::Replace {
                            index: i,
                            value: json!("replacement"),
                        }),
                        _ => {}
                    }
                }
            }
            (base, ops)
        })
    })
}

proptest! {
    /// Generated diffs are accepted by the validating builder.
    #[test]
    fn generated_seq_diffs_validate((_, ops) in base_and_seq_diff()) {
        let mut builder = SequenceDiffBuilder::new();
        for op in ops {
            builder.push(op);
        }
        prop_assert!(builder.into_validated().is_ok());
    }

    /// Patching succeeds and the output length matches the insert/remove
    /// arithmetic of the diff.
    #[test]
    fn seq_patch_length_arithmetic((base, ops) in base_and_seq_diff()) {
        let mut expected = base.len() as i64;
        for op in &ops {
            match op {
                SeqOp::AddRange { values, .. } => expected += values.len() as i64,
                SeqOp::RemoveRange { length, .. } => expected -= *length as i64,
                SeqOp::Replace { .. } | SeqOp::Patch { .. } => {}
            }
        }

        let patched = patch(&Value::Array(base), &Diff::Sequence(ops)).unwrap();
        let Value::Array(items) = patched else {
            panic!("sequence patch must yield an array");
        };
        prop_assert_eq!(items.len() as i64, expected);
    }

    /// The empty diff is the identity on any array.
    #[test]
    fn empty_seq_diff_is_identity(base in prop::collection::vec(scalar(), 0..8)) {
        let value = Value::Array(base);
        prop_assert_eq!(patch(&value, &Diff::empty_sequence()).unwrap(), value);
    }

    /// Removing every key added by the same diff round-trips the object.
    #[test]
    fn map_add_then_remove_is_identity(
        entries in prop::collection::btree_map("[a-f]{1,3}", scalar(), 0..5),
        added in prop::collection::btree_map("[g-k]{1,3}", scalar(), 0..5),
    ) {
        let base = Value::Object(entries.into_iter().collect::<Map<_, _>>());

        let add_ops: Vec<MapOp> = added
            .iter()
            .map(|(key, value)| MapOp::Add { key: key.clone(), value: value.clone() })
            .collect();
        let remove_ops: Vec<MapOp> = added
            .keys()
            .map(|key| MapOp::Remove { key: key.clone() })
            .collect();

        let grown = patch(&base, &Diff::Mapping(add_ops)).unwrap();
        prop_assert_eq!(patch(&grown, &Diff::Mapping(remove_ops)).unwrap(), base);
    }
}
