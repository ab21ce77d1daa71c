//! Line-level diffing between two versions of a file.
//!
//! Alignment is a minimal edit script (Myers), so unchanged lines always
//! line up as a longest common subsequence; the aligned operations are then
//! grouped into unified-diff hunks padded with [`DIFF_CONTEXT_LINES`] lines
//! of context.

use serde::{Deserialize, Serialize};
use similar::{Algorithm, DiffTag, capture_diff_slices};

/// Lines of unchanged context kept around each change.
pub const DIFF_CONTEXT_LINES: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum DiffOpKind {
    Equal,
    Add,
    Remove,
}

/// One aligned line. Line numbers are 1-based positions in each side; for an
/// added line `old_line_no` is the old line it is inserted before, and for a
/// removed line `new_line_no` is the new line that follows the removal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct DiffOp<'a> {
    pub(crate) kind: DiffOpKind,
    pub(crate) line: &'a str,
    pub(crate) old_line_no: usize,
    pub(crate) new_line_no: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffHunk {
    pub old_start: usize,
    pub old_count: usize,
    pub new_start: usize,
    pub new_count: usize,
    pub lines: Vec<String>,
}

impl DiffHunk {
    pub fn header(&self) -> String {
        format!(
            "@@ -{},{} +{},{} @@",
            self.old_start, self.old_count, self.new_start, self.new_count
        )
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffStat {
    pub added: usize,
    pub removed: usize,
}

impl std::fmt::Display for DiffStat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "+{} -{}", self.added, self.removed)
    }
}

/// Converts CRLF and lone CR line endings to LF.
pub fn normalize_line_endings(content: &str) -> String {
    content.replace("\r\n", "\n").replace('\r', "\n")
}

/// Computes the unified-diff hunks that turn `old_content` into `new_content`.
///
/// Identical contents (after line-ending normalization) always yield no hunks.
pub fn compute_hunks(old_content: &str, new_content: &str) -> Vec<DiffHunk> {
    let old_content = normalize_line_endings(old_content);
    let new_content = normalize_line_endings(new_content);
    if old_content == new_content {
        return Vec::new();
    }

    let old_lines = split_lines(&old_content);
    let new_lines = split_lines(&new_content);
    let ops = align_lines(&old_lines, &new_lines);
    group_hunks(&ops, DIFF_CONTEXT_LINES)
}

/// Renders hunks as `@@` headers followed by their prefixed lines.
pub fn render_hunks(hunks: &[DiffHunk]) -> String {
    let mut output = String::new();
    for hunk in hunks {
        output.push_str(&hunk.header());
        output.push('\n');
        for line in &hunk.lines {
            output.push_str(line);
            output.push('\n');
        }
    }
    output
}

/// Renders a complete unified diff for one file, or an empty string when
/// nothing changed.
pub fn render_unified(path: &str, old_content: &str, new_content: &str) -> String {
    let hunks = compute_hunks(old_content, new_content);
    if hunks.is_empty() {
        return String::new();
    }
    format!("--- a/{path}\n+++ b/{path}\n{}", render_hunks(&hunks))
}

pub fn diff_stat(hunks: &[DiffHunk]) -> DiffStat {
    let mut stat = DiffStat::default();
    for line in hunks.iter().flat_map(|hunk| hunk.lines.iter()) {
        if line.starts_with('+') {
            stat.added += 1;
        } else if line.starts_with('-') {
            stat.removed += 1;
        }
    }
    stat
}

fn split_lines(content: &str) -> Vec<&str> {
    if content.is_empty() {
        return Vec::new();
    }
    content.split('\n').collect()
}

pub(crate) fn align_lines<'a>(old_lines: &[&'a str], new_lines: &[&'a str]) -> Vec<DiffOp<'a>> {
    let mut ops = Vec::with_capacity(old_lines.len().max(new_lines.len()));
    for op in capture_diff_slices(Algorithm::Myers, old_lines, new_lines) {
        let (tag, old_range, new_range) = op.as_tag_tuple();
        match tag {
            DiffTag::Equal => {
                for (old_idx, new_idx) in old_range.zip(new_range) {
                    ops.push(DiffOp {
                        kind: DiffOpKind::Equal,
                        line: old_lines[old_idx],
                        old_line_no: old_idx + 1,
                        new_line_no: new_idx + 1,
                    });
                }
            }
            DiffTag::Delete => push_removed(&mut ops, old_lines, old_range, new_range.start),
            DiffTag::Insert => push_added(&mut ops, new_lines, new_range, old_range.start),
            DiffTag::Replace => {
                push_removed(&mut ops, old_lines, old_range.clone(), new_range.start);
                push_added(&mut ops, new_lines, new_range, old_range.end);
            }
        }
    }
    ops
}

fn push_removed<'a>(
    ops: &mut Vec<DiffOp<'a>>,
    old_lines: &[&'a str],
    old_range: std::ops::Range<usize>,
    new_position: usize,
) {
    for old_idx in old_range {
        ops.push(DiffOp {
            kind: DiffOpKind::Remove,
            line: old_lines[old_idx],
            old_line_no: old_idx + 1,
            new_line_no: new_position + 1,
        });
    }
}

fn push_added<'a>(
    ops: &mut Vec<DiffOp<'a>>,
    new_lines: &[&'a str],
    new_range: std::ops::Range<usize>,
    old_position: usize,
) {
    for new_idx in new_range {
        ops.push(DiffOp {
            kind: DiffOpKind::Add,
            line: new_lines[new_idx],
            old_line_no: old_position + 1,
            new_line_no: new_idx + 1,
        });
    }
}

pub(crate) fn group_hunks(ops: &[DiffOp<'_>], context: usize) -> Vec<DiffHunk> {
    let mut hunks = Vec::new();
    let mut cursor = 0usize;

    while let Some(first_change) = next_change(ops, cursor) {
        let mut last_change = first_change;
        while let Some(candidate) = next_change(ops, last_change + 1) {
            let gap = candidate - last_change - 1;
            if gap > context * 2 {
                break;
            }
            last_change = candidate;
        }

        let start = first_change.saturating_sub(context);
        let end = (last_change + context).min(ops.len() - 1);
        hunks.push(build_hunk(&ops[start..=end]));
        cursor = end + 1;
    }

    hunks
}

fn next_change(ops: &[DiffOp<'_>], from: usize) -> Option<usize> {
    ops.iter()
        .skip(from)
        .position(|op| op.kind != DiffOpKind::Equal)
        .map(|offset| from + offset)
}

fn build_hunk(ops: &[DiffOp<'_>]) -> DiffHunk {
    let mut old_count = 0usize;
    let mut new_count = 0usize;
    let mut lines = Vec::with_capacity(ops.len());
    for op in ops {
        let prefix = match op.kind {
            DiffOpKind::Equal => {
                old_count += 1;
                new_count += 1;
                ' '
            }
            DiffOpKind::Remove => {
                old_count += 1;
                '-'
            }
            DiffOpKind::Add => {
                new_count += 1;
                '+'
            }
        };
        lines.push(format!("{prefix}{}", op.line));
    }

    // An empty side is anchored on the line before the change, so
    // insertion into an empty file renders as `-0,0`.
    let first = &ops[0];
    let old_start = if old_count == 0 {
        first.old_line_no - 1
    } else {
        first.old_line_no
    };
    let new_start = if new_count == 0 {
        first.new_line_no - 1
    } else {
        first.new_line_no
    };

    DiffHunk {
        old_start,
        old_count,
        new_start,
        new_count,
        lines,
    }
}
