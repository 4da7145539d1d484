//! Block resolution
//!
//! Blocks are resolved with a depth counter over a line cursor rather than
//! a syntax tree. Every block opener (`repeat`, `if`, snippet headers)
//! increments the depth and every `end` at depth zero closes the block being
//! resolved. A snippet header opens a block like any other; its fenced body
//! is opaque to the scan, so foreign `end`/`if` lines never count.

use tracing::trace;

use super::ScriptError;
use super::source::{END_FENCE, LineKind, Source, classify};

/// The branch kind of an `if` chain
#[derive(Debug, Clone, PartialEq)]
pub enum BranchKind {
    Condition(String),
    Else,
}

/// One arm of an `if` chain; `start..end` is its body
#[derive(Debug, Clone, PartialEq)]
pub struct Branch {
    pub kind: BranchKind,
    /// Line index of the `if`/`elif`/`else` header
    pub header: usize,
    pub start: usize,
    pub end: usize,
}

/// A partitioned `if` chain
#[derive(Debug, Clone, PartialEq)]
pub struct IfChain {
    pub branches: Vec<Branch>,
    /// Line index of the closing `end`
    pub end: usize,
}

/// Index just past the end fence of a snippet opened at `header`,
/// or `None` when the fence never appears
fn skip_snippet(source: &Source, header: usize) -> Option<usize> {
    (header + 1..source.len())
        .find(|&idx| source.trimmed(idx) == END_FENCE)
        .map(|idx| idx + 1)
}

/// Where a depth-tracked scan stopped
enum Stop {
    End(usize),
    Branch(usize),
    Exhausted,
}

fn scan(source: &Source, start: usize, stop_at_branch: bool) -> Stop {
    let mut depth = 0usize;
    let mut idx = start;
    while idx < source.len() {
        let line = source.trimmed(idx);
        let kind = classify(&line);
        match kind {
            LineKind::Blank | LineKind::Comment => {}
            LineKind::Snippet(_) => match skip_snippet(source, idx) {
                Some(next) => {
                    depth += 1;
                    idx = next;
                    continue;
                }
                None => return Stop::Exhausted,
            },
            LineKind::Repeat(_) | LineKind::If(_) => depth += 1,
            LineKind::End => {
                if depth == 0 {
                    return Stop::End(idx);
                }
                depth -= 1;
            }
            LineKind::Elif(_) | LineKind::Else if stop_at_branch && depth == 0 => {
                return Stop::Branch(idx);
            }
            _ => {}
        }
        idx += 1;
    }
    Stop::Exhausted
}

/// Find the `end` closing the block whose body starts at `start`.
///
/// `opened_at` is the header line index, used for the failure report.
pub fn find_block_end(source: &Source, start: usize, opened_at: usize) -> Result<usize, ScriptError> {
    match scan(source, start, false) {
        Stop::End(idx) => {
            trace!(open = opened_at + 1, close = idx + 1, "resolved block");
            Ok(idx)
        }
        _ => Err(ScriptError::MissingTerminator {
            construct: format!("`{}`", source.trimmed(opened_at)),
            terminator: "end",
            line: opened_at + 1,
        }),
    }
}

/// Like [`find_block_end`], but a depth-zero `elif`/`else` also ends the scan.
///
/// Returns the source length when neither appears.
pub fn find_branch_or_end(source: &Source, start: usize) -> usize {
    match scan(source, start, true) {
        Stop::End(idx) | Stop::Branch(idx) => idx,
        Stop::Exhausted => source.len(),
    }
}

/// The `end` closing a snippet block, when it is the first significant line
/// after the end fence (`after_fence`) and before `limit`
pub fn snippet_end(source: &Source, after_fence: usize, limit: usize) -> Option<usize> {
    (after_fence..limit.min(source.len()))
        .find(|&idx| !matches!(classify(&source.trimmed(idx)), LineKind::Blank | LineKind::Comment))
        .filter(|&idx| matches!(classify(&source.trimmed(idx)), LineKind::End))
}

/// Split the `if` chain headed at `header` into its branches, in source order
pub fn partition_if(source: &Source, header: usize) -> Result<IfChain, ScriptError> {
    let end = find_block_end(source, header + 1, header)?;

    let mut branches = Vec::new();
    let mut idx = header;
    while idx < end {
        let line = source.trimmed(idx);
        match classify(&line) {
            LineKind::If(cond) | LineKind::Elif(cond) => {
                let body_end = find_branch_or_end(source, idx + 1).min(end);
                branches.push(Branch {
                    kind: BranchKind::Condition(cond.to_string()),
                    header: idx,
                    start: idx + 1,
                    end: body_end,
                });
                idx = body_end;
            }
            LineKind::Else => {
                branches.push(Branch {
                    kind: BranchKind::Else,
                    header: idx,
                    start: idx + 1,
                    end,
                });
                break;
            }
            _ => idx += 1,
        }
    }

    Ok(IfChain { branches, end })
}
