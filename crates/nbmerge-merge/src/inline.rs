//! Inline rendering of conflicts into the document itself.
//!
//! Produces git-style marker blocks for conflicting source text and
//! stream-output marker records for conflicting notebook output lists, so
//! a conflict can survive inside the resolved document instead of a
//! residual diff.

use serde_json::{json, Value};

/// Marker fence width; the same seven characters git uses.
pub(crate) const MARKER_WIDTH: usize = 7;

/// Split a text value into lines, keeping line terminators.
///
/// Source text is stored either as one string or as a list of
/// terminator-preserving line strings; both normalize to the latter.
/// Returns `None` for values that are not text.
pub fn as_text_lines(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::String(text) => Some(split_keep_terminators(text)),
        Value::Array(items) => items
            .iter()
            .map(|item| item.as_str().map(str::to_owned))
            .collect(),
        _ => None,
    }
}

fn split_keep_terminators(text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut rest = text;
    while let Some(pos) = rest.find('\n') {
        lines.push(rest[..=pos].to_string());
        rest = &rest[pos + 1..];
    }
    if !rest.is_empty() {
        lines.push(rest.to_string());
    }
    lines
}

/// Render a three-way text conflict as a line sequence fenced by
/// seven-character markers labelling the local, base, and remote segments.
pub fn merge_display_lines(base: &[String], local: &[String], remote: &[String]) -> Vec<String> {
    let mut out = Vec::with_capacity(base.len() + local.len() + remote.len() + 4);
    out.push(format!("{} local\n", "<".repeat(MARKER_WIDTH)));
    out.extend(local.iter().cloned());
    out.push(format!("{} base\n", "=".repeat(MARKER_WIDTH)));
    out.extend(base.iter().cloned());
    out.push(format!("{} remote\n", "=".repeat(MARKER_WIDTH)));
    out.extend(remote.iter().cloned());
    out.push(format!("{}\n", ">".repeat(MARKER_WIDTH)));
    out
}

/// A stream output record carrying a conflict marker line, for splicing
/// between segments of a joined outputs list.
pub(crate) fn marker_output(text: String) -> Value {
    json!({
        "output_type": "stream",
        "name": "stderr",
        "text": [text],
    })
}
