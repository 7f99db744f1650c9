//! Per-hunk and per-file outcome records.
//!
//! These types are the diagnostics surface: they are what the CLI prints and
//! what a benchmark harness consumes (all of them serialize to JSON).

use crate::error::{format_starts, LocateError};
use crate::text::LineEnding;
use serde::Serialize;
use similar::udiff::unified_diff;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Which search produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    /// Every before-block line was compared.
    FullBlock,
    /// Only the context lines were compared; removals were ignored.
    ContextOnly,
    /// Only the first and last non-blank lines were matched.
    AnchorOnly,
    /// Verbatim match at the hinted line (strict strategy).
    LineNumber,
}

impl fmt::Display for MatchTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MatchTier::FullBlock => "full-block",
            MatchTier::ContextOnly => "context-only",
            MatchTier::AnchorOnly => "anchor-only",
            MatchTier::LineNumber => "line-number",
        };
        f.write_str(name)
    }
}

/// A location in the working buffer where a hunk's before-block was found.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MatchCandidate {
    /// 0-based index into the working buffer at the time of the search.
    pub start_line: usize,
    /// Number of buffer lines the hunk replaces.
    pub length: usize,
    /// Similarity in `[0, 1]`.
    pub score: f64,
    /// Number of before-block lines that took part in the comparison.
    pub matched_lines: usize,
    /// A fallback tier weaker than full-block comparison was used.
    pub degraded: bool,
    pub tier: MatchTier,
    /// The search had to widen beyond the radius around the hint.
    pub widened: bool,
}

impl MatchCandidate {
    /// End of the replaced span, exclusive.
    pub fn end_line(&self) -> usize {
        self.start_line + self.length
    }
}

/// A `[start_line, end_line)` range already rewritten by an earlier hunk,
/// in current buffer coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AppliedSpan {
    pub start_line: usize,
    pub end_line: usize,
}

impl AppliedSpan {
    /// Whether `[start, end)` touches this span. An empty span (left by a
    /// pure deletion) conflicts with any range strictly straddling it.
    pub fn intersects(&self, start: usize, end: usize) -> bool {
        if self.start_line == self.end_line {
            start < self.start_line && self.start_line < end
        } else {
            start < self.end_line && self.start_line < end
        }
    }
}

/// Why a hunk failed to apply.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    #[error("no confident match")]
    NoConfidentMatch { best_score: Option<f64> },
    #[error("ambiguous match at lines {}", format_starts(.candidates))]
    Ambiguous { candidates: Vec<MatchCandidate> },
    #[error("overlaps prior edit at lines {}-{}", .start_line + 1, .end_line)]
    Overlap { start_line: usize, end_line: usize },
    #[error("hunk already applied at line {}", .start_line + 1)]
    AlreadyApplied { start_line: usize },
    #[error("search budget exceeded")]
    BudgetExceeded,
}

impl From<LocateError> for FailureReason {
    fn from(e: LocateError) -> Self {
        match e {
            LocateError::NoConfidentMatch { best } => FailureReason::NoConfidentMatch {
                best_score: best.map(|c| c.score),
            },
            LocateError::Ambiguous { candidates } => FailureReason::Ambiguous { candidates },
            LocateError::AlreadyApplied { start_line } => {
                FailureReason::AlreadyApplied { start_line }
            }
            LocateError::BudgetExceeded => FailureReason::BudgetExceeded,
        }
    }
}

/// Why a hunk was passed over without a search.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    #[error("hunk contains no changes")]
    NoChanges,
    /// Strict mode undid this hunk after a later one failed.
    #[error("rolled back after a later hunk failed in strict mode")]
    RolledBack,
    /// Strict mode stopped before reaching this hunk.
    #[error("not attempted: strict mode aborted the file")]
    StrictAbort,
}

/// The outcome of one hunk.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum HunkOutcome {
    Applied(MatchCandidate),
    Skipped(SkipReason),
    Failed(FailureReason),
}

impl HunkOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, HunkOutcome::Failed(_))
    }
}

/// Aggregate outcome counts for a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct OutcomeCounts {
    pub applied: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl OutcomeCounts {
    pub fn tally(outcomes: &[HunkOutcome]) -> Self {
        outcomes.iter().fold(Self::default(), |mut counts, o| {
            match o {
                HunkOutcome::Applied(_) => counts.applied += 1,
                HunkOutcome::Skipped(_) => counts.skipped += 1,
                HunkOutcome::Failed(_) => counts.failed += 1,
            }
            counts
        })
    }
}

/// Details about a hunk that failed to apply.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HunkFailure {
    /// The 1-based index of the hunk that failed.
    pub hunk_index: usize,
    pub reason: FailureReason,
}

/// The result of running every hunk of one [`FileDiff`](crate::FileDiff).
///
/// Always complete: one outcome per hunk, in diff order, whether or not the
/// hunks applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileResult {
    pub path: PathBuf,
    /// The patched text. Equal to the original when nothing applied or the
    /// file was aborted in strict mode.
    #[serde(skip)]
    pub text: String,
    #[serde(skip)]
    pub original: String,
    pub outcomes: Vec<HunkOutcome>,
    pub counts: OutcomeCounts,
    /// Strict mode discarded all edits to this file.
    pub aborted: bool,
    pub line_ending: LineEnding,
}

impl FileResult {
    /// No hunk failed. Skipped hunks do not count as failures.
    ///
    /// # Example
    ///
    /// ```
    /// # use driftpatch::{apply_file_diff, parse_diff, ApplyOptions};
    /// let diff = &parse_diff("--- a/x\n+++ b/x\n@@ -1 +1 @@\n-old\n+new\n").unwrap()[0];
    /// let result = apply_file_diff(diff, "old\n", &ApplyOptions::default());
    /// assert!(result.all_applied());
    /// assert_eq!(result.text, "new\n");
    /// ```
    pub fn all_applied(&self) -> bool {
        self.counts.failed == 0 && !self.aborted
    }

    /// Whether the patched text differs from the original.
    pub fn is_changed(&self) -> bool {
        self.text != self.original
    }

    /// Every failed hunk with its 1-based index.
    pub fn failures(&self) -> Vec<HunkFailure> {
        self.outcomes
            .iter()
            .enumerate()
            .filter_map(|(i, outcome)| match outcome {
                HunkOutcome::Failed(reason) => Some(HunkFailure {
                    hunk_index: i + 1,
                    reason: reason.clone(),
                }),
                _ => None,
            })
            .collect()
    }

    /// A unified diff from the original to the patched text, or `None` when
    /// nothing changed.
    pub fn unified_diff(&self) -> Option<String> {
        if !self.is_changed() {
            return None;
        }
        Some(
            unified_diff(
                similar::Algorithm::default(),
                &self.original,
                &self.text,
                3,
                Some(("a", "b")),
            ),
        )
    }
}
