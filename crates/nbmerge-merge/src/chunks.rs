//! Alignment of two sequence diffs into merge chunks.
//!
//! A chunk is an indivisible half-open range `[begin, end)` of base
//! indices together with the ops each side holds against that range.
//! Overlapping edit spans coalesce into a single chunk; an insert binds to
//! the chunk starting at its index; untouched stretches become chunks with
//! no ops.

use nbmerge_diff::SeqOp;

/// An aligned segment of two sequence diffs.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeChunk {
    /// First base index covered.
    pub begin: usize,
    /// One past the last base index covered (`begin == end` for pure
    /// inserts).
    pub end: usize,
    /// Ops the local side holds against this range.
    pub local: Vec<SeqOp>,
    /// Ops the remote side holds against this range.
    pub remote: Vec<SeqOp>,
}

impl MergeChunk {
    /// True when neither side edits this range.
    pub fn is_untouched(&self) -> bool {
        self.local.is_empty() && self.remote.is_empty()
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Side {
    Local,
    Remote,
}

/// Partition two sequence diffs over the same base into aligned chunks.
///
/// Chunks cover `[0, base_len)` in ascending order and every op lands in
/// exactly one chunk's side list. A trailing zero-width chunk carries
/// inserts at `base_len`.
pub fn make_merge_chunks(base_len: usize, local: &[SeqOp], remote: &[SeqOp]) -> Vec<MergeChunk> {
    let mut tagged: Vec<(Side, &SeqOp)> = Vec::with_capacity(local.len() + remote.len());
    tagged.extend(local.iter().map(|op| (Side::Local, op)));
    tagged.extend(remote.iter().map(|op| (Side::Remote, op)));
    // Stable sort keeps each side's op order within a shared start index.
    tagged.sort_by_key(|(_, op)| op.span().0);

    let mut chunks = Vec::new();
    let mut pos = 0;
    let mut i = 0;
    while i < tagged.len() {
        let (start, mut end) = tagged[i].1.span();
        // Grow the cluster while spans overlap or share the start index
        // (the insert-binding rule).
        let mut j = i + 1;
        while j < tagged.len() {
            let (next_start, next_end) = tagged[j].1.span();
            if next_start < end || next_start == start {
                end = end.max(next_end);
                j += 1;
            } else {
                break;
            }
        }

        if pos < start {
            chunks.push(MergeChunk {
                begin: pos,
                end: start,
                local: Vec::new(),
                remote: Vec::new(),
            });
        }

        let mut local_ops = Vec::new();
        let mut remote_ops = Vec::new();
        for (side, op) in &tagged[i..j] {
            match side {
                Side::Local => local_ops.push((*op).clone()),
                Side::Remote => remote_ops.push((*op).clone()),
            }
        }
        chunks.push(MergeChunk {
            begin: start,
            end,
            local: local_ops,
            remote: remote_ops,
        });

        pos = end;
        i = j;
    }

    if pos < base_len {
        chunks.push(MergeChunk {
            begin: pos,
            end: base_len,
            local: Vec::new(),
            remote: Vec::new(),
        });
    }

    chunks
}
