//! The structured form of a unified diff.

use crate::error::ParseError;
use crate::parse::parse_diff;
use serde::Serialize;
use similar::TextDiff;
use std::path::PathBuf;

/// The role a line plays inside a hunk body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LineKind {
    /// Prefixed with ' ': present both before and after the edit.
    Context,
    /// Prefixed with '-': present only before the edit.
    Removal,
    /// Prefixed with '+': present only after the edit.
    Addition,
}

/// A single tagged line of a hunk body, without its prefix character.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HunkLine {
    pub kind: LineKind,
    pub text: String,
}

impl HunkLine {
    pub fn new(kind: LineKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

/// The raw numbers from a `@@ -a,b +c,d @@` header.
///
/// These are recorded verbatim and are never trusted to locate text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct HunkRange {
    pub old_start: usize,
    pub old_len: usize,
    pub new_start: usize,
    pub new_len: usize,
}

/// One contiguous change block of a unified diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    /// 0-based line hint derived from the header's old start. Advisory only.
    pub origin_old_start: usize,
    /// The header numbers as written.
    pub range: HunkRange,
    /// Free text following the closing `@@`, usually a function signature.
    pub section: Option<String>,
    /// Body lines in diff order.
    pub lines: Vec<HunkLine>,
    /// A `\ No newline at end of file` marker followed the old side's last line.
    pub old_missing_newline: bool,
    /// A `\ No newline at end of file` marker followed the new side's last line.
    pub new_missing_newline: bool,
}

impl Hunk {
    /// Builds a hunk from a header range and body lines.
    ///
    /// The line hint is taken from `range.old_start`, converted from the
    /// header's 1-based numbering.
    ///
    /// # Example
    ///
    /// ```
    /// # use driftpatch::{Hunk, HunkLine, HunkRange, LineKind};
    /// let hunk = Hunk::new(
    ///     HunkRange { old_start: 2, old_len: 1, new_start: 2, new_len: 1 },
    ///     vec![
    ///         HunkLine::new(LineKind::Removal, "    return 1"),
    ///         HunkLine::new(LineKind::Addition, "    return 10"),
    ///     ],
    /// );
    /// assert_eq!(hunk.origin_old_start, 1);
    /// assert_eq!(hunk.before_block(), vec!["    return 1"]);
    /// assert_eq!(hunk.after_block(), vec!["    return 10"]);
    /// ```
    pub fn new(range: HunkRange, lines: Vec<HunkLine>) -> Self {
        Self {
            origin_old_start: range.old_start.saturating_sub(1),
            range,
            section: None,
            lines,
            old_missing_newline: false,
            new_missing_newline: false,
        }
    }

    /// The text this hunk expects to find: context and removal lines in order.
    pub fn before_block(&self) -> Vec<&str> {
        self.lines
            .iter()
            .filter(|l| l.kind != LineKind::Addition)
            .map(|l| l.text.as_str())
            .collect()
    }

    /// The text the matched region becomes: context and addition lines in order.
    pub fn after_block(&self) -> Vec<&str> {
        self.lines
            .iter()
            .filter(|l| l.kind != LineKind::Removal)
            .map(|l| l.text.as_str())
            .collect()
    }

    /// The kinds of the before-block's lines, aligned index for index with
    /// [`before_block`](Self::before_block).
    pub fn before_kinds(&self) -> Vec<LineKind> {
        self.lines
            .iter()
            .filter(|l| l.kind != LineKind::Addition)
            .map(|l| l.kind)
            .collect()
    }

    pub fn added_lines(&self) -> Vec<&str> {
        self.lines_of(LineKind::Addition)
    }

    pub fn removed_lines(&self) -> Vec<&str> {
        self.lines_of(LineKind::Removal)
    }

    fn lines_of(&self, kind: LineKind) -> Vec<&str> {
        self.lines
            .iter()
            .filter(|l| l.kind == kind)
            .map(|l| l.text.as_str())
            .collect()
    }

    /// Whether the hunk adds or removes anything. Context-only hunks are no-ops.
    pub fn has_changes(&self) -> bool {
        self.lines.iter().any(|l| l.kind != LineKind::Context)
    }
}

/// All hunks for one target file, in diff order.
///
/// Order matters: hunks are applied one after another against an evolving
/// buffer, not independently against the original text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDiff {
    /// Path from the `---` header, timestamps removed.
    pub old_path: String,
    /// Path from the `+++` header, timestamps removed.
    pub new_path: String,
    pub hunks: Vec<Hunk>,
}

const DEV_NULL: &str = "/dev/null";

fn strip_side_prefix<'a>(path: &'a str, prefix: &str) -> &'a str {
    path.strip_prefix(prefix).unwrap_or(path)
}

impl FileDiff {
    /// The relative path the edit targets, with `a/`/`b/` prefixes removed.
    ///
    /// The new path wins unless it is `/dev/null` (a deletion).
    ///
    /// # Example
    ///
    /// ```
    /// # use driftpatch::FileDiff;
    /// let diff = FileDiff {
    ///     old_path: "a/src/lib.rs".into(),
    ///     new_path: "b/src/lib.rs".into(),
    ///     hunks: vec![],
    /// };
    /// assert_eq!(diff.target_path().to_str(), Some("src/lib.rs"));
    /// ```
    pub fn target_path(&self) -> PathBuf {
        if self.new_path == DEV_NULL {
            PathBuf::from(strip_side_prefix(&self.old_path, "a/"))
        } else {
            PathBuf::from(strip_side_prefix(&self.new_path, "b/"))
        }
    }

    /// The diff creates its file: the old side is `/dev/null`, or the first
    /// hunk has an empty before-block.
    pub fn is_creation(&self) -> bool {
        self.old_path == DEV_NULL
            || self
                .hunks
                .first()
                .is_some_and(|h| h.before_block().is_empty())
    }

    /// The diff deletes its file.
    pub fn is_deletion(&self) -> bool {
        self.new_path == DEV_NULL
    }

    /// Builds a diff between two texts.
    ///
    /// Useful for producing well-formed fixtures and for checking that a
    /// patched result round-trips.
    ///
    /// # Example
    ///
    /// ```
    /// # use driftpatch::FileDiff;
    /// let old = "def f():\n    return 1\n";
    /// let new = "def f():\n    return 10\n";
    /// let diff = FileDiff::from_texts("f.py", old, new, 3).unwrap();
    /// assert_eq!(diff.hunks.len(), 1);
    /// assert_eq!(diff.hunks[0].removed_lines(), vec!["    return 1"]);
    /// assert_eq!(diff.hunks[0].added_lines(), vec!["    return 10"]);
    /// ```
    pub fn from_texts(
        path: &str,
        old_text: &str,
        new_text: &str,
        context_len: usize,
    ) -> Result<Self, ParseError> {
        let old_header = format!("a/{}", path);
        let new_header = format!("b/{}", path);
        let empty = FileDiff {
            old_path: old_header.clone(),
            new_path: new_header.clone(),
            hunks: vec![],
        };
        if old_text == new_text {
            return Ok(empty);
        }

        let diff = TextDiff::from_lines(old_text, new_text);
        let diff_text = format!(
            "{}",
            diff.unified_diff()
                .context_radius(context_len)
                .header(&old_header, &new_header)
        );

        if diff_text.trim().is_empty() {
            return Ok(empty);
        }

        let diffs = parse_diff(&diff_text)?;
        Ok(diffs.into_iter().next().unwrap_or(empty))
    }
}
