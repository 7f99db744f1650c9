use crate::report::MatchCandidate;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while parsing unified-diff text.
///
/// Parsing is all-or-nothing: any of these aborts the whole parse call and no
/// partial list of [`FileDiff`](crate::FileDiff)s is returned. Line numbers are
/// 1-based positions in the diff text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// A line inside a hunk body did not start with ' ', '-', '+' or '\'.
    #[error("Line {line}: unrecognized line inside hunk body: '{text}'")]
    UnrecognizedLine { line: usize, text: String },
    /// A `@@` line could not be parsed as `@@ -a[,b] +c[,d] @@`.
    #[error("Line {line}: malformed hunk header: '{text}'")]
    MalformedHunkHeader { line: usize, text: String },
    /// A `---`/`+++` file section was closed without any hunks.
    #[error("Line {line}: file section for '{path}' contains no hunks")]
    EmptyFileSection { line: usize, path: String },
    /// A hunk header appeared before any `---`/`+++` file header.
    #[error("Line {line}: hunk header found outside of a file section (missing '--- a/path' header)")]
    HunkOutsideFile { line: usize },
    /// A `---` line was not followed by a `+++` line.
    #[error("Line {line}: '---' header is not followed by a '+++' header")]
    MissingNewPath { line: usize },
}

/// Hard errors raised at the filesystem boundary.
///
/// These are separate from per-hunk outcomes: a `PatchError` means the file
/// could not be read or written at all.
#[derive(Error, Debug)]
pub enum PatchError {
    /// The diff names a path that resolves outside the target directory.
    #[error("Path '{0}' resolves outside the target directory. Aborting for security.")]
    PathTraversal(PathBuf),
    /// The target file does not exist and the diff does not create it.
    #[error("Target file not found for patching: {0}")]
    TargetNotFound(PathBuf),
    #[error("Permission denied for path: {path:?}")]
    PermissionDenied { path: PathBuf },
    #[error("Target path is a directory, not a file: {path:?}")]
    TargetIsDirectory { path: PathBuf },
    #[error("I/O error while processing {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Why a locator could not settle on a single location for a hunk.
///
/// Every variant is recoverable: the applier records it against the hunk and
/// moves on (unless strict mode is enabled).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LocateError {
    /// No tier cleared its acceptance threshold. `best` is the highest-scoring
    /// rejected full-block window, when one existed.
    #[error("no confident match")]
    NoConfidentMatch { best: Option<MatchCandidate> },
    /// Several locations scored within the ambiguity margin of the best one
    /// and the line hint could not separate them.
    #[error("ambiguous match at lines {}", format_starts(.candidates))]
    Ambiguous { candidates: Vec<MatchCandidate> },
    /// The best location already reads as the hunk's after-block.
    #[error("hunk already applied at line {}", .start_line + 1)]
    AlreadyApplied { start_line: usize },
    /// The per-file comparison or wall-clock budget ran out mid-search.
    #[error("search budget exceeded")]
    BudgetExceeded,
}

pub(crate) fn format_starts(candidates: &[MatchCandidate]) -> String {
    candidates
        .iter()
        .map(|c| (c.start_line + 1).to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
