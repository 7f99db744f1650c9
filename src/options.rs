use serde::Serialize;
use std::time::Duration;

/// Acceptance thresholds for each location tier.
///
/// The defaults are a starting policy; they are meant to be tuned against a
/// labelled corpus of model-generated diffs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Thresholds {
    /// Minimum anchor-weighted mean for a full-block match.
    pub full_block: f64,
    /// Minimum score each anchor line must reach individually in a
    /// full-block match.
    pub anchor: f64,
    /// Minimum anchor-weighted mean when only context lines are compared.
    pub context_only: f64,
    /// Minimum score for each anchor in the anchor-only fallback.
    pub anchor_only: f64,
    /// Candidates scoring within this distance of the best are contenders
    /// for ambiguity.
    pub ambiguity_margin: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            full_block: 0.85,
            anchor: 0.95,
            context_only: 0.80,
            anchor_only: 0.95,
            ambiguity_margin: 0.02,
        }
    }
}

impl Thresholds {
    /// Checks that every threshold lies in `[0, 1]`.
    pub fn validate(&self) -> Result<(), String> {
        let fields = [
            ("full_block", self.full_block),
            ("anchor", self.anchor),
            ("context_only", self.context_only),
            ("anchor_only", self.anchor_only),
            ("ambiguity_margin", self.ambiguity_margin),
        ];
        for (name, value) in fields {
            if !(0.0..=1.0).contains(&value) {
                return Err(format!("threshold '{}' must be between 0.0 and 1.0, got {}", name, value));
            }
        }
        Ok(())
    }
}

/// Which hunk locator to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Similarity search with full-block, context-only and anchor-only tiers.
    #[default]
    Tiered,
    /// Conventional patch behavior: the before-block must appear verbatim at
    /// the header's line number (adjusted for earlier hunks).
    Strict,
}

/// Options for configuring how a diff is applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ApplyOptions {
    pub thresholds: Thresholds,
    /// Lines either side of the hint searched before widening to the whole
    /// buffer.
    pub search_radius: usize,
    /// Cap on window start positions scanned in one pass, bounding the cost
    /// of the widened search on very large files.
    pub max_search_lines: usize,
    /// Per-file cap on line comparisons. `None` is unbounded.
    pub max_comparisons: Option<u64>,
    /// Per-file wall-clock cap. `None` is unbounded.
    pub time_budget: Option<Duration>,
    /// Abort the whole file, leaving it untouched, on the first hunk failure.
    pub strict: bool,
    pub strategy: Strategy,
    /// Only meaningful at the filesystem boundary: render a diff instead of
    /// writing files.
    pub dry_run: bool,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            search_radius: 32,
            max_search_lines: 20_000,
            max_comparisons: None,
            time_budget: None,
            strict: false,
            strategy: Strategy::Tiered,
            dry_run: false,
        }
    }
}

impl ApplyOptions {
    /// Creates a new builder for `ApplyOptions`.
    ///
    /// # Example
    ///
    /// ```
    /// # use driftpatch::ApplyOptions;
    /// let options = ApplyOptions::builder()
    ///     .strict(true)
    ///     .search_radius(10)
    ///     .build();
    ///
    /// assert!(options.strict);
    /// assert_eq!(options.search_radius, 10);
    /// assert_eq!(options.thresholds.full_block, 0.85);
    /// ```
    pub fn builder() -> ApplyOptionsBuilder {
        ApplyOptionsBuilder::default()
    }

    /// The search radius after applying the scan cap.
    pub(crate) fn effective_radius(&self) -> usize {
        self.search_radius.min(self.max_search_lines / 2)
    }
}

/// A builder for creating `ApplyOptions`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApplyOptionsBuilder {
    thresholds: Option<Thresholds>,
    search_radius: Option<usize>,
    max_search_lines: Option<usize>,
    max_comparisons: Option<u64>,
    time_budget: Option<Duration>,
    strict: Option<bool>,
    strategy: Option<Strategy>,
    dry_run: Option<bool>,
}

impl ApplyOptionsBuilder {
    pub fn thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = Some(thresholds);
        self
    }

    pub fn search_radius(mut self, radius: usize) -> Self {
        self.search_radius = Some(radius);
        self
    }

    pub fn max_search_lines(mut self, lines: usize) -> Self {
        self.max_search_lines = Some(lines);
        self
    }

    pub fn max_comparisons(mut self, comparisons: u64) -> Self {
        self.max_comparisons = Some(comparisons);
        self
    }

    pub fn time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = Some(budget);
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = Some(strict);
        self
    }

    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = Some(dry_run);
        self
    }

    /// Builds the `ApplyOptions`.
    pub fn build(self) -> ApplyOptions {
        let default = ApplyOptions::default();
        ApplyOptions {
            thresholds: self.thresholds.unwrap_or(default.thresholds),
            search_radius: self.search_radius.unwrap_or(default.search_radius),
            max_search_lines: self.max_search_lines.unwrap_or(default.max_search_lines),
            max_comparisons: self.max_comparisons.or(default.max_comparisons),
            time_budget: self.time_budget.or(default.time_budget),
            strict: self.strict.unwrap_or(default.strict),
            strategy: self.strategy.unwrap_or(default.strategy),
            dry_run: self.dry_run.unwrap_or(default.dry_run),
        }
    }
}
