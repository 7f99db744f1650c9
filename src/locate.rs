//! Finding where a hunk belongs in the current buffer.
//!
//! The [`HunkLocator`] trait is the seam between the applier's state machine
//! and a search strategy. Two strategies ship with the crate:
//!
//! - [`TieredLocator`]: similarity search that tolerates line drift,
//!   whitespace changes and reworded lines. It tries, in order:
//!   1. **Full block.** Slide a window the size of the before-block around
//!      the hint (then, once, across the whole buffer) and score every window
//!      with anchor-weighted line similarity.
//!   2. **Context only.** Same search, comparing only the context lines.
//!      Removal lines are the ones most likely to have drifted already.
//!   3. **Anchor only.** Find the first and last non-blank before-block lines
//!      independently and accept them as a pair if they appear in order close
//!      to each other.
//! - [`StrictLocator`]: what a conventional patch tool does, a verbatim match
//!   at the hinted line or nothing.

use crate::diff::{Hunk, LineKind};
use crate::error::LocateError;
use crate::normalize::{normalize, NormalizedLine};
use crate::options::{ApplyOptions, Strategy, Thresholds};
use crate::report::{MatchCandidate, MatchTier};
use crate::score::{score_normalized, score_window, WindowScore};
use log::{debug, trace};
use std::cmp::Ordering;
use std::ops::RangeInclusive;
use std::time::{Duration, Instant};

/// Guards threshold comparisons against float rounding in weighted means.
const EPSILON: f64 = 1e-9;

/// Limits the work one file's hunk searches may do.
///
/// One budget is created per file and shared by all of that file's hunks.
/// Once exhausted it stays exhausted.
#[derive(Debug, Clone)]
pub struct SearchBudget {
    comparisons_left: Option<u64>,
    deadline: Option<Instant>,
    exhausted: bool,
}

impl SearchBudget {
    pub fn unlimited() -> Self {
        Self::new(None, None)
    }

    /// A budget of at most `max_comparisons` line comparisons and `time`
    /// of wall clock, starting now.
    pub fn new(max_comparisons: Option<u64>, time: Option<Duration>) -> Self {
        Self {
            comparisons_left: max_comparisons,
            deadline: time.map(|t| Instant::now() + t),
            exhausted: false,
        }
    }

    pub fn from_options(options: &ApplyOptions) -> Self {
        Self::new(options.max_comparisons, options.time_budget)
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Accounts for `comparisons` line comparisons about to be made.
    pub fn charge(&mut self, comparisons: u64) -> Result<(), LocateError> {
        if self.exhausted {
            return Err(LocateError::BudgetExceeded);
        }
        if let Some(left) = self.comparisons_left.as_mut() {
            if *left < comparisons {
                *left = 0;
                self.exhausted = true;
                return Err(LocateError::BudgetExceeded);
            }
            *left -= comparisons;
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            self.exhausted = true;
            return Err(LocateError::BudgetExceeded);
        }
        Ok(())
    }
}

/// A strategy for finding where a hunk's before-block sits in a buffer.
pub trait HunkLocator {
    /// Finds the span of `buffer` the hunk should replace.
    ///
    /// `hint_line` is a 0-based guess (usually the header line number plus
    /// the drift from earlier hunks) and may lie outside the buffer.
    fn locate(
        &self,
        hunk: &Hunk,
        buffer: &[String],
        hint_line: usize,
        budget: &mut SearchBudget,
    ) -> Result<MatchCandidate, LocateError>;
}

/// The similarity-based, three-tier locator.
#[derive(Debug, Clone, Copy)]
pub struct TieredLocator {
    options: ApplyOptions,
}

/// The inputs of one block search, normalized once per `locate` call.
struct SearchSpace<'s> {
    expected: &'s [NormalizedLine],
    actual: &'s [NormalizedLine],
    /// Which expected positions take part in scoring.
    mask: &'s [bool],
    hint: usize,
}

/// A window that cleared the tier's thresholds.
#[derive(Debug, Clone, Copy)]
struct Scored {
    start: usize,
    score: WindowScore,
}

enum BlockSearch {
    Found(MatchCandidate),
    NotFound { best: Option<MatchCandidate> },
}

fn compare_candidates(a: &Scored, b: &Scored, hint: usize) -> Ordering {
    b.score
        .score
        .total_cmp(&a.score.score)
        .then_with(|| a.start.abs_diff(hint).cmp(&b.start.abs_diff(hint)))
        .then_with(|| a.start.cmp(&b.start))
}

impl TieredLocator {
    pub fn new(options: ApplyOptions) -> Self {
        Self { options }
    }

    fn thresholds(&self) -> Thresholds {
        self.options.thresholds
    }

    /// Start positions for the one-time widened pass: the whole buffer, or a
    /// window of `max_search_lines` starts centred on the hint when the
    /// buffer is larger than that.
    fn widened_range(&self, hint: usize, max_start: usize) -> Option<RangeInclusive<usize>> {
        let cap = self.options.max_search_lines;
        if cap == 0 {
            return None;
        }
        let count = max_start + 1;
        if count <= cap {
            return Some(0..=max_start);
        }
        let from = hint.min(max_start).saturating_sub(cap / 2).min(count - cap);
        Some(from..=from + cap - 1)
    }

    /// Scores every window starting in `starts`, skipping those in `skip`.
    #[allow(clippy::too_many_arguments)]
    fn scan(
        &self,
        space: &SearchSpace<'_>,
        starts: RangeInclusive<usize>,
        skip: Option<&RangeInclusive<usize>>,
        accept: &dyn Fn(&WindowScore) -> bool,
        budget: &mut SearchBudget,
        best_rejected: &mut Option<Scored>,
        accepted: &mut Vec<Scored>,
    ) -> Result<(), LocateError> {
        let m = space.expected.len();
        let per_window = space.mask.iter().filter(|&&on| on).count() as u64;

        for start in starts {
            if skip.is_some_and(|s| s.contains(&start)) {
                continue;
            }
            budget.charge(per_window)?;
            let score = score_window(
                space.expected,
                &space.actual[start..start + m],
                space.mask,
            );
            let scored = Scored { start, score };
            if accept(&score) {
                trace!(
                    "        Accepted window at index {} (score {:.3}, weakest anchor {:.3})",
                    start,
                    score.score,
                    score.anchor_min
                );
                accepted.push(scored);
            } else if best_rejected
                .is_none_or(|b| compare_candidates(&scored, &b, space.hint) == Ordering::Less)
            {
                *best_rejected = Some(scored);
            }
        }
        Ok(())
    }

    /// Runs the windowed search for one tier.
    fn search_block(
        &self,
        tier: MatchTier,
        space: &SearchSpace<'_>,
        min_score: f64,
        min_anchor: Option<f64>,
        budget: &mut SearchBudget,
    ) -> Result<BlockSearch, LocateError> {
        let m = space.expected.len();
        let n = space.actual.len();
        if m == 0 || m > n {
            trace!("      {} search skipped: block of {} lines, buffer of {}.", tier, m, n);
            return Ok(BlockSearch::NotFound { best: None });
        }

        let radius = self.options.effective_radius();
        let max_start = n - m;
        let accept = |s: &WindowScore| {
            s.compared > 0
                && s.score + EPSILON >= min_score
                && min_anchor.is_none_or(|a| s.anchor_min + EPSILON >= a)
        };

        let mut accepted = Vec::new();
        let mut best_rejected = None;

        let lo = space.hint.saturating_sub(radius);
        let hi = space.hint.saturating_add(radius).min(max_start);
        let local = (lo <= hi).then_some(lo..=hi);
        if let Some(range) = &local {
            trace!("      {} search around hint {}: starts {:?}", tier, space.hint, range);
            self.scan(
                space,
                range.clone(),
                None,
                &accept,
                budget,
                &mut best_rejected,
                &mut accepted,
            )?;
        }

        let mut widened = false;
        if accepted.is_empty() {
            if let Some(range) = self.widened_range(space.hint, max_start) {
                debug!(
                    "      {} search found nothing near hint {}; widening to starts {:?}.",
                    tier, space.hint, range
                );
                widened = true;
                self.scan(
                    space,
                    range,
                    local.as_ref(),
                    &accept,
                    budget,
                    &mut best_rejected,
                    &mut accepted,
                )?;
            }
        } else if !accepted.iter().any(|s| s.score.score + EPSILON >= 1.0) {
            // A near copy close to the hint must not hide a verbatim copy
            // further away.
            if let Some(range) = self.widened_range(space.hint, max_start) {
                let exact = |s: &WindowScore| accept(s) && s.score + EPSILON >= 1.0;
                let mut far = Vec::new();
                let mut ignored = None;
                self.scan(
                    space,
                    range,
                    local.as_ref(),
                    &exact,
                    budget,
                    &mut ignored,
                    &mut far,
                )?;
                if let [only] = far.as_slice() {
                    debug!(
                        "      {} search prefers exact window at {} over inexact local matches.",
                        tier, only.start
                    );
                    widened = true;
                    accepted = vec![*only];
                }
            }
        }

        let to_candidate = |s: Scored, widened: bool| MatchCandidate {
            start_line: s.start,
            length: m,
            score: s.score.score,
            matched_lines: s.score.compared,
            degraded: tier != MatchTier::FullBlock,
            tier,
            widened,
        };

        if accepted.is_empty() {
            return Ok(BlockSearch::NotFound {
                best: best_rejected.map(|s| to_candidate(s, widened)),
            });
        }

        accepted.sort_by(|a, b| compare_candidates(a, b, space.hint));
        let best = accepted[0];
        let margin = self.thresholds().ambiguity_margin;
        let half_radius = radius as f64 / 2.0;
        let best_distance = best.start.abs_diff(space.hint) as f64;

        let contenders: Vec<Scored> = accepted[1..]
            .iter()
            .filter(|c| best.score.score - c.score.score <= margin + EPSILON)
            .filter(|c| (c.start.abs_diff(space.hint) as f64 - best_distance).abs() <= half_radius)
            .copied()
            .collect();

        if !contenders.is_empty() {
            let mut candidates: Vec<MatchCandidate> = std::iter::once(best)
                .chain(contenders)
                .map(|s| to_candidate(s, widened))
                .collect();
            candidates.sort_by_key(|c| c.start_line);
            debug!(
                "    {} search is ambiguous between {} locations near hint {}.",
                tier,
                candidates.len(),
                space.hint
            );
            return Err(LocateError::Ambiguous { candidates });
        }

        let candidate = to_candidate(best, widened);
        debug!(
            "    {} match at index {} (score {:.3}{}).",
            tier,
            candidate.start_line,
            candidate.score,
            if widened { ", widened search" } else { "" }
        );
        Ok(BlockSearch::Found(candidate))
    }

    /// Positions in `range` where `line` scores at least `min_score`.
    fn anchor_hits(
        &self,
        line: &NormalizedLine,
        actual: &[NormalizedLine],
        range: RangeInclusive<usize>,
        min_score: f64,
        budget: &mut SearchBudget,
    ) -> Result<Vec<(usize, f64)>, LocateError> {
        let mut hits = Vec::new();
        for pos in range {
            budget.charge(1)?;
            let s = score_normalized(line, &actual[pos]);
            if s + EPSILON >= min_score {
                hits.push((pos, s));
            }
        }
        Ok(hits)
    }

    /// Tier 3: match the first and last non-blank lines as an ordered pair.
    fn search_anchor_pair(
        &self,
        expected: &[NormalizedLine],
        actual: &[NormalizedLine],
        hint: usize,
        budget: &mut SearchBudget,
    ) -> Result<Option<MatchCandidate>, LocateError> {
        let n = actual.len();
        let m = expected.len();
        let (Some(first), Some(last)) = (
            expected.iter().position(|l| !l.is_blank()),
            expected.iter().rposition(|l| !l.is_blank()),
        ) else {
            return Ok(None);
        };
        if n == 0 {
            return Ok(None);
        }

        let min_score = self.thresholds().anchor_only;
        let radius = self.options.effective_radius();
        let expected_first = hint.saturating_add(first);
        let span = last - first;
        // Anchors must sit within twice the radius of each other, or within
        // the block's own extent when that is larger.
        let max_gap = (2 * radius).max(span);

        let lo = expected_first.saturating_sub(radius);
        let hi = expected_first.saturating_add(radius).min(n - 1);
        let local = (lo <= hi).then_some(lo..=hi);
        let mut firsts = match &local {
            Some(range) => {
                self.anchor_hits(&expected[first], actual, range.clone(), min_score, budget)?
            }
            None => Vec::new(),
        };
        let mut widened = false;
        if firsts.is_empty() {
            if let Some(range) = self.widened_range(expected_first, n - 1) {
                widened = true;
                firsts = self
                    .anchor_hits(&expected[first], actual, range, min_score, budget)?
                    .into_iter()
                    .filter(|(p, _)| !local.as_ref().is_some_and(|r| r.contains(p)))
                    .collect();
            }
        }

        firsts.sort_by(|a, b| {
            b.1.total_cmp(&a.1)
                .then_with(|| a.0.abs_diff(expected_first).cmp(&b.0.abs_diff(expected_first)))
                .then_with(|| a.0.cmp(&b.0))
        });

        for (p, first_score) in firsts {
            if p < first {
                continue;
            }
            let (q, last_score) = if first == last {
                (p, first_score)
            } else {
                if p + 1 >= n {
                    continue;
                }
                let q_hi = p.saturating_add(max_gap).min(n - 1);
                let target = p + span;
                let mut lasts =
                    self.anchor_hits(&expected[last], actual, p + 1..=q_hi, min_score, budget)?;
                lasts.sort_by(|a, b| {
                    b.1.total_cmp(&a.1)
                        .then_with(|| a.0.abs_diff(target).cmp(&b.0.abs_diff(target)))
                        .then_with(|| a.0.cmp(&b.0))
                });
                match lasts.first() {
                    Some(&hit) => hit,
                    None => continue,
                }
            };

            let start = p - first;
            let end = q + (m - last);
            if end > n {
                continue;
            }
            let candidate = MatchCandidate {
                start_line: start,
                length: end - start,
                score: (first_score + last_score) / 2.0,
                matched_lines: if first == last { 1 } else { 2 },
                degraded: true,
                tier: MatchTier::AnchorOnly,
                widened,
            };
            debug!(
                "    anchor-only match: lines {}..{} (anchors at {} and {}, score {:.3}).",
                candidate.start_line,
                candidate.end_line(),
                p,
                q,
                candidate.score
            );
            return Ok(Some(candidate));
        }

        Ok(None)
    }

    /// Rejects a candidate whose region already reads as the hunk's
    /// after-block, so that re-running a diff never applies it twice.
    fn check_not_applied(
        &self,
        hunk: &Hunk,
        candidate: MatchCandidate,
        expected: &[NormalizedLine],
        actual: &[NormalizedLine],
    ) -> Result<MatchCandidate, LocateError> {
        let after: Vec<NormalizedLine> = hunk.after_block().into_iter().map(normalize).collect();
        let start = candidate.start_line;
        if after.is_empty() || start + after.len() > actual.len() {
            return Ok(candidate);
        }

        let full = vec![true; after.len()];
        let after_score = score_window(&after, &actual[start..start + after.len()], &full);
        if after_score.compared == 0 {
            return Ok(candidate);
        }
        let before_score = if candidate.length == expected.len() {
            let full = vec![true; expected.len()];
            score_window(expected, &actual[start..start + expected.len()], &full).score
        } else {
            candidate.score
        };

        let reads_as_after = after_score.score + EPSILON >= self.thresholds().full_block
            && if candidate.tier == MatchTier::FullBlock {
                after_score.score > before_score + EPSILON
            } else {
                after_score.score + EPSILON >= before_score
            };
        if reads_as_after {
            debug!(
                "    Region at index {} matches the after-block better ({:.3} vs {:.3}); hunk already applied.",
                start, after_score.score, before_score
            );
            return Err(LocateError::AlreadyApplied { start_line: start });
        }
        Ok(candidate)
    }
}

impl HunkLocator for TieredLocator {
    fn locate(
        &self,
        hunk: &Hunk,
        buffer: &[String],
        hint_line: usize,
        budget: &mut SearchBudget,
    ) -> Result<MatchCandidate, LocateError> {
        let before = hunk.before_block();
        trace!(
            "  Locating hunk with {} before-block lines in {} buffer lines (hint {}).",
            before.len(),
            buffer.len(),
            hint_line
        );

        if before.is_empty() {
            // Pure additions without context can only go into an empty buffer.
            return if buffer.is_empty() {
                Ok(MatchCandidate {
                    start_line: 0,
                    length: 0,
                    score: 1.0,
                    matched_lines: 0,
                    degraded: false,
                    tier: MatchTier::FullBlock,
                    widened: false,
                })
            } else {
                debug!("    Hunk has no before-block and the buffer is not empty.");
                Err(LocateError::NoConfidentMatch { best: None })
            };
        }

        let expected: Vec<NormalizedLine> = before.into_iter().map(normalize).collect();
        if expected.iter().all(NormalizedLine::is_blank) {
            debug!("    Before-block is entirely blank; refusing to guess a location.");
            return Err(LocateError::NoConfidentMatch { best: None });
        }
        let actual: Vec<NormalizedLine> = buffer.iter().map(|l| normalize(l)).collect();
        let thresholds = self.thresholds();

        // --- Tier 1: full block ---
        let full_mask = vec![true; expected.len()];
        let space = SearchSpace {
            expected: &expected,
            actual: &actual,
            mask: &full_mask,
            hint: hint_line,
        };
        let best_rejected = match self.search_block(
            MatchTier::FullBlock,
            &space,
            thresholds.full_block,
            Some(thresholds.anchor),
            budget,
        )? {
            BlockSearch::Found(c) => return self.check_not_applied(hunk, c, &expected, &actual),
            BlockSearch::NotFound { best } => best,
        };

        // --- Tier 2: context lines only ---
        let kinds = hunk.before_kinds();
        let context_mask: Vec<bool> = kinds.iter().map(|k| *k == LineKind::Context).collect();
        let has_removals = kinds.contains(&LineKind::Removal);
        let has_context = context_mask
            .iter()
            .zip(&expected)
            .any(|(&on, line)| on && !line.is_blank());
        if has_removals && has_context {
            let space = SearchSpace {
                mask: &context_mask,
                ..space
            };
            if let BlockSearch::Found(c) = self.search_block(
                MatchTier::ContextOnly,
                &space,
                thresholds.context_only,
                None,
                budget,
            )? {
                return self.check_not_applied(hunk, c, &expected, &actual);
            }
        } else {
            trace!("    Context-only tier not applicable (no removals or no context).");
        }

        // --- Tier 3: anchor pair ---
        if let Some(c) = self.search_anchor_pair(&expected, &actual, hint_line, budget)? {
            return self.check_not_applied(hunk, c, &expected, &actual);
        }

        debug!(
            "    No tier cleared its threshold (best full-block score: {}).",
            best_rejected.map_or("none".to_string(), |c| format!("{:.3}", c.score))
        );
        Err(LocateError::NoConfidentMatch {
            best: best_rejected,
        })
    }
}

/// Verbatim match at the hinted line, as a conventional patch tool does.
#[derive(Debug, Clone, Copy, Default)]
pub struct StrictLocator;

impl HunkLocator for StrictLocator {
    fn locate(
        &self,
        hunk: &Hunk,
        buffer: &[String],
        hint_line: usize,
        budget: &mut SearchBudget,
    ) -> Result<MatchCandidate, LocateError> {
        let before = hunk.before_block();
        budget.charge(before.len() as u64)?;

        let end = hint_line.saturating_add(before.len());
        let matches = end <= buffer.len()
            && buffer[hint_line..end]
                .iter()
                .zip(&before)
                .all(|(actual, expected)| actual == expected);
        if !matches {
            debug!("    Strict match failed at index {}.", hint_line);
            return Err(LocateError::NoConfidentMatch { best: None });
        }

        Ok(MatchCandidate {
            start_line: hint_line,
            length: before.len(),
            score: 1.0,
            matched_lines: before.len(),
            degraded: false,
            tier: MatchTier::LineNumber,
            widened: false,
        })
    }
}

/// The locator selected by [`ApplyOptions::strategy`].
#[derive(Debug, Clone, Copy)]
pub enum Locator {
    Tiered(TieredLocator),
    Strict(StrictLocator),
}

impl Locator {
    pub fn for_options(options: &ApplyOptions) -> Self {
        match options.strategy {
            Strategy::Tiered => Locator::Tiered(TieredLocator::new(*options)),
            Strategy::Strict => Locator::Strict(StrictLocator),
        }
    }
}

impl HunkLocator for Locator {
    fn locate(
        &self,
        hunk: &Hunk,
        buffer: &[String],
        hint_line: usize,
        budget: &mut SearchBudget,
    ) -> Result<MatchCandidate, LocateError> {
        match self {
            Locator::Tiered(l) => l.locate(hunk, buffer, hint_line, budget),
            Locator::Strict(l) => l.locate(hunk, buffer, hint_line, budget),
        }
    }
}

/// Locates `hunk` in `buffer` with the tiered strategy, default thresholds
/// and no budget.
///
/// # Example
///
/// ```
/// # use driftpatch::{locate, parse_diff};
/// let buffer: Vec<String> = ["def f():", "    return 1", "", "def g():", "    return 2"]
///     .iter().map(|s| s.to_string()).collect();
/// let diff = &parse_diff("--- a/m.py\n+++ b/m.py\n@@ -2 +2 @@\n-    return 1\n+    return 10\n").unwrap()[0];
///
/// let candidate = locate(&diff.hunks[0], &buffer, 1, 32).unwrap();
/// assert_eq!(candidate.start_line, 1);
/// assert_eq!(candidate.score, 1.0);
/// assert!(!candidate.degraded);
/// ```
pub fn locate(
    hunk: &Hunk,
    buffer: &[String],
    hint_line: usize,
    search_radius: usize,
) -> Result<MatchCandidate, LocateError> {
    let options = ApplyOptions {
        search_radius,
        ..ApplyOptions::default()
    };
    TieredLocator::new(options).locate(hunk, buffer, hint_line, &mut SearchBudget::unlimited())
}
