//! Applying a [`FileDiff`]'s hunks, in order, to one file's text.

use crate::diff::{FileDiff, Hunk};
use crate::locate::{HunkLocator, Locator, SearchBudget};
use crate::options::ApplyOptions;
use crate::report::{
    AppliedSpan, FailureReason, FileResult, HunkOutcome, OutcomeCounts, SkipReason,
};
use crate::text::{join_lines, split_lines, LineEnding};
use log::{debug, info, trace, warn};

/// Where a [`HunkApplier`] is in its run over a file.
///
/// Hunk indices are 0-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplierState {
    Pending,
    Locating(usize),
    Applying(usize),
    Done,
}

/// An iterator that applies a diff's hunks one at a time.
///
/// Each call to `next` locates the next hunk in the *current* buffer, which
/// already reflects every earlier hunk, and yields its [`HunkOutcome`]. The
/// buffer, the running line offset and the spans rewritten so far can be
/// inspected between steps.
///
/// ```
/// # use driftpatch::{parse_diff, ApplyOptions, HunkApplier, HunkOutcome, Locator};
/// let diff = &parse_diff("--- a/x\n+++ b/x\n@@ -1 +1,2 @@\n a\n+b\n@@ -3 +4 @@\n-c\n+C\n").unwrap()[0];
/// let options = ApplyOptions::default();
/// let locator = Locator::for_options(&options);
/// let mut applier = HunkApplier::new(diff, "a\nx\nc\n", &locator, &options);
///
/// assert!(matches!(applier.next(), Some(HunkOutcome::Applied(_))));
/// assert_eq!(applier.offset(), 1);
/// assert!(matches!(applier.next(), Some(HunkOutcome::Applied(_))));
/// assert_eq!(applier.current_lines(), ["a", "b", "x", "C"]);
/// assert!(applier.next().is_none());
/// ```
pub struct HunkApplier<'a> {
    hunks: std::iter::Enumerate<std::slice::Iter<'a, Hunk>>,
    locator: &'a dyn HunkLocator,
    buffer: Vec<String>,
    offset: isize,
    spans: Vec<AppliedSpan>,
    budget: SearchBudget,
    ending: LineEnding,
    trailing_newline: bool,
    state: ApplierState,
}

impl<'a> HunkApplier<'a> {
    pub fn new(
        diff: &'a FileDiff,
        original: &str,
        locator: &'a dyn HunkLocator,
        options: &ApplyOptions,
    ) -> Self {
        let split = split_lines(original);
        trace!(
            "  Split original text into {} lines ({:?} endings).",
            split.lines.len(),
            split.ending
        );
        Self {
            hunks: diff.hunks.iter().enumerate(),
            locator,
            buffer: split.lines,
            offset: 0,
            spans: Vec::new(),
            budget: SearchBudget::from_options(options),
            ending: split.ending,
            trailing_newline: split.trailing_newline,
            state: ApplierState::Pending,
        }
    }

    /// The buffer with every hunk applied so far.
    pub fn current_lines(&self) -> &[String] {
        &self.buffer
    }

    /// Net lines added minus lines removed by the hunks applied so far.
    pub fn offset(&self) -> isize {
        self.offset
    }

    pub fn applied_spans(&self) -> &[AppliedSpan] {
        &self.spans
    }

    pub fn state(&self) -> ApplierState {
        self.state
    }

    pub fn line_ending(&self) -> LineEnding {
        self.ending
    }

    /// Consumes the applier and joins the buffer using the original file's
    /// line endings.
    pub fn into_text(self) -> String {
        join_lines(&self.buffer, self.ending, self.trailing_newline)
    }

    fn apply_hunk(&mut self, index: usize, hunk: &Hunk) -> HunkOutcome {
        if self.budget.is_exhausted() {
            debug!("  Search budget already exhausted; not locating hunk.");
            return HunkOutcome::Failed(FailureReason::BudgetExceeded);
        }
        if !hunk.has_changes() {
            debug!("  Skipping hunk (no changes).");
            return HunkOutcome::Skipped(SkipReason::NoChanges);
        }

        self.state = ApplierState::Locating(index);
        let n = self.buffer.len();
        let hint = (hunk.origin_old_start as isize + self.offset).clamp(0, n as isize) as usize;
        trace!(
            "  Hint for hunk: header index {} + offset {} = {}",
            hunk.origin_old_start,
            self.offset,
            hint
        );

        let candidate = match self
            .locator
            .locate(hunk, &self.buffer, hint, &mut self.budget)
        {
            Ok(c) => c,
            Err(e) => return HunkOutcome::Failed(e.into()),
        };

        let (start, end) = (candidate.start_line, candidate.end_line());
        if self.spans.iter().any(|s| s.intersects(start, end)) {
            debug!(
                "  Location {}..{} intersects an earlier edit in this file.",
                start, end
            );
            return HunkOutcome::Failed(FailureReason::Overlap {
                start_line: start,
                end_line: end,
            });
        }

        self.state = ApplierState::Applying(index);
        let after: Vec<String> = hunk.after_block().into_iter().map(String::from).collect();
        let new_len = after.len();
        let reached_end = end == n;
        let was_empty = n == 0;
        self.buffer.splice(start..end, after);

        let delta = new_len as isize - candidate.length as isize;
        for span in self.spans.iter_mut().filter(|s| s.start_line >= end) {
            span.start_line = span.start_line.saturating_add_signed(delta);
            span.end_line = span.end_line.saturating_add_signed(delta);
        }
        self.spans.push(AppliedSpan {
            start_line: start,
            end_line: start + new_len,
        });
        self.offset += delta;

        if reached_end {
            if hunk.new_missing_newline {
                self.trailing_newline = false;
            } else if hunk.old_missing_newline || was_empty {
                self.trailing_newline = true;
            }
        }

        trace!(
            "  Replaced {} lines at index {} with {} lines; offset is now {}.",
            candidate.length,
            start,
            new_len,
            self.offset
        );
        HunkOutcome::Applied(candidate)
    }
}

impl Iterator for HunkApplier<'_> {
    type Item = HunkOutcome;

    fn next(&mut self) -> Option<Self::Item> {
        let Some((index, hunk)) = self.hunks.next() else {
            self.state = ApplierState::Done;
            return None;
        };
        Some(self.apply_hunk(index, hunk))
    }
}

/// Applies `diff` to `original` with the locator selected by the options.
///
/// This never fails: every hunk gets an outcome, and the patched text holds
/// whatever applied. With `options.strict`, the first failure discards all
/// edits instead.
///
/// ```
/// # use driftpatch::{apply_file_diff, parse_diff, ApplyOptions, HunkOutcome};
/// let original = "def f():\n    return 1\n\ndef g():\n    return 2\n";
/// let diff = &parse_diff("--- a/m.py\n+++ b/m.py\n@@ -51 +51 @@\n-    return 2\n+    return 20\n").unwrap()[0];
///
/// let result = apply_file_diff(diff, original, &ApplyOptions::default());
/// assert_eq!(result.text, "def f():\n    return 1\n\ndef g():\n    return 20\n");
/// let HunkOutcome::Applied(m) = &result.outcomes[0] else { panic!() };
/// assert_eq!(m.start_line, 4);
/// assert!(!m.degraded);
/// ```
pub fn apply_file_diff(diff: &FileDiff, original: &str, options: &ApplyOptions) -> FileResult {
    let locator = Locator::for_options(options);
    apply_with_locator(&locator, diff, original, options)
}

/// [`apply_file_diff`] with a caller-supplied locator.
pub fn apply_with_locator(
    locator: &dyn HunkLocator,
    diff: &FileDiff,
    original: &str,
    options: &ApplyOptions,
) -> FileResult {
    let path = diff.target_path();
    info!("Applying diff to: {}", path.display());

    let total_hunks = diff.hunks.len();
    let mut applier = HunkApplier::new(diff, original, locator, options);
    let mut outcomes = Vec::with_capacity(total_hunks);
    let mut aborted = false;

    for (i, outcome) in applier.by_ref().enumerate() {
        let hunk_index = i + 1;
        info!("  Applying Hunk {}/{}...", hunk_index, total_hunks);
        match &outcome {
            HunkOutcome::Applied(m) => debug!(
                "  Hunk {} applied at line {} ({}, score {:.3}).",
                hunk_index,
                m.start_line + 1,
                m.tier,
                m.score
            ),
            HunkOutcome::Skipped(reason) => debug!("  Skipped Hunk {}: {}", hunk_index, reason),
            HunkOutcome::Failed(reason) => {
                warn!("  Failed to apply Hunk {}. {}", hunk_index, reason)
            }
        }
        let failed = outcome.is_failed();
        outcomes.push(outcome);
        if failed && options.strict {
            aborted = true;
            break;
        }
    }

    let line_ending = applier.line_ending();
    let text = if aborted {
        warn!(
            "  Strict mode: discarding all changes to '{}'.",
            path.display()
        );
        for outcome in outcomes.iter_mut() {
            if matches!(outcome, HunkOutcome::Applied(_)) {
                *outcome = HunkOutcome::Skipped(SkipReason::RolledBack);
            }
        }
        outcomes.resize(total_hunks, HunkOutcome::Skipped(SkipReason::StrictAbort));
        original.to_string()
    } else {
        applier.into_text()
    };

    let counts = OutcomeCounts::tally(&outcomes);
    debug!(
        "  {} applied, {} skipped, {} failed.",
        counts.applied, counts.skipped, counts.failed
    );
    FileResult {
        path,
        text,
        original: original.to_string(),
        outcomes,
        counts,
        aborted,
        line_ending,
    }
}
