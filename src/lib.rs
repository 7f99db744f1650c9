//! A patch engine for unified diffs that do not quite fit the file they target.
//!
//! Diffs written by language models are often approximately right: the line
//! numbers in the `@@` headers are off, the context lines were paraphrased,
//! indentation changed, or the file moved on since the diff was written.
//! `driftpatch` ignores the header numbers except as a starting hint and finds
//! each hunk by line similarity, falling back through progressively weaker
//! evidence, and reports exactly how (and how confidently) every hunk was
//! placed.
//!
//! ## Getting Started
//!
//! ````rust
//! use driftpatch::{apply_to_dir, parse_diff, ApplyOptions};
//! use std::fs;
//! use tempfile::tempdir;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // 1. Set up a temporary directory and a file to be patched.
//! let dir = tempdir()?;
//! let file_path = dir.path().join("src/main.rs");
//! fs::create_dir_all(dir.path().join("src"))?;
//! fs::write(&file_path, "fn main() {\n    println!(\"Hello, world!\");\n}\n")?;
//!
//! // 2. A diff as a model might emit it: wrapped in markdown, wrong line
//! //    numbers, different indentation.
//! let diff_text = r#"
//! Here is the fix:
//!
//! ```diff
//! --- a/src/main.rs
//! +++ b/src/main.rs
//! @@ -40,3 +40,3 @@
//!  fn main() {
//! -  println!("Hello, world!");
//! +    println!("Hello, driftpatch!");
//!  }
//! ```
//! "#;
//!
//! // 3. Parse, then apply.
//! let diffs = parse_diff(diff_text)?;
//! assert_eq!(diffs.len(), 1);
//! let result = apply_to_dir(&diffs[0], dir.path(), &ApplyOptions::default())?;
//!
//! assert!(result.report.all_applied());
//! let expected = "fn main() {\n    println!(\"Hello, driftpatch!\");\n}\n";
//! assert_eq!(fs::read_to_string(&file_path)?, expected);
//! # Ok(())
//! # }
//! ````
//!
//! ## Key Concepts
//!
//! - [`parse_diff`] turns diff text into one [`FileDiff`] per target file.
//!   Parsing is strict about hunk syntax and lenient about everything around
//!   it (prose, fences, git headers).
//! - [`apply_file_diff`] applies a `FileDiff` to a file's text in memory and
//!   returns a [`FileResult`]: the patched text plus one [`HunkOutcome`] per
//!   hunk. It never fails; a hunk that cannot be placed is recorded as
//!   `Failed` and the rest still apply, unless [`ApplyOptions::strict`] is set.
//! - Hunks are located by a [`HunkLocator`]. The default [`TieredLocator`]
//!   tries a full-block similarity search, then a context-only search, then an
//!   anchor-pair search, and refuses to guess between equally good locations.
//!   [`StrictLocator`] behaves like a conventional patch tool.
//! - Hunks of one file apply in order against the evolving buffer, so every
//!   search sees the edits made by the hunks before it.
//!
//! ## Partial application
//!
//! ````rust
//! use driftpatch::{apply_file_diff, parse_diff, ApplyOptions, FailureReason};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let original = "line 1\nline 2\nline 3\n\nline 5\nline 6\nline 7\n";
//! let diff_text = r#"
//! --- a/partial.txt
//! +++ b/partial.txt
//! @@ -1,3 +1,3 @@
//!  line 1
//! -line 2
//! +line two
//!  line 3
//! @@ -5,3 +5,3 @@
//!  alpha
//! -beta
//! +gamma
//!  delta
//! "#;
//! let diff = &parse_diff(diff_text)?[0];
//! let result = apply_file_diff(diff, original, &ApplyOptions::default());
//!
//! assert!(!result.all_applied());
//! let failures = result.failures();
//! assert_eq!(failures.len(), 1);
//! assert_eq!(failures[0].hunk_index, 2); // 1-based
//! assert!(matches!(failures[0].reason, FailureReason::NoConfidentMatch { .. }));
//!
//! // The first hunk still applied.
//! assert_eq!(result.text, "line 1\nline two\nline 3\n\nline 5\nline 6\nline 7\n");
//! # Ok(())
//! # }
//! ````
//!
//! ## Feature Flags
//!
//! ### `parallel`
//!
//! - **Enabled by default.**
//! - Spreads independent files (see [`apply_all`], [`apply_candidates`] and
//!   [`apply_diffs_to_dir`]) over a [`rayon`](https://crates.io/crates/rayon)
//!   thread pool. Hunks of a single file are always applied sequentially.
//! - Disable it with `default-features = false`, for example on targets
//!   without threads.

pub mod apply;
pub mod batch;
pub mod diff;
pub mod error;
pub mod fs;
pub mod locate;
pub mod normalize;
pub mod options;
pub mod parse;
pub mod report;
pub mod score;
pub mod text;

pub use apply::{apply_file_diff, apply_with_locator, ApplierState, HunkApplier};
pub use batch::{apply_all, apply_candidates};
pub use diff::{FileDiff, Hunk, HunkLine, HunkRange, LineKind};
pub use error::{LocateError, ParseError, PatchError};
pub use fs::{apply_diffs_to_dir, apply_to_dir, ensure_path_is_safe, BatchResult, PatchResult};
pub use locate::{locate, HunkLocator, Locator, SearchBudget, StrictLocator, TieredLocator};
pub use normalize::{normalize, NormalizedLine};
pub use options::{ApplyOptions, ApplyOptionsBuilder, Strategy, Thresholds};
pub use parse::parse_diff;
pub use report::{
    AppliedSpan, FailureReason, FileResult, HunkFailure, HunkOutcome, MatchCandidate, MatchTier,
    OutcomeCounts, SkipReason,
};
pub use score::{score_block, score_line};
pub use text::LineEnding;
