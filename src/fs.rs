//! Reading targets from and writing results to a directory tree.
//!
//! Everything else in the crate works on in-memory text. This module is the
//! only place that touches the filesystem, and it refuses any diff path that
//! would resolve outside the target directory.

use crate::apply::apply_file_diff;
use crate::batch::{apply_all, Job};
use crate::diff::FileDiff;
use crate::error::PatchError;
use crate::options::ApplyOptions;
use crate::report::FileResult;
use log::{info, trace, warn};
use std::fs;
use std::path::{Component, Path, PathBuf};

/// The result of applying one diff to a file on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchResult {
    pub report: FileResult,
    /// The unified diff of the proposed changes. Only populated in dry-run
    /// mode.
    pub diff: Option<String>,
}

/// The result of applying several diffs to a directory.
#[derive(Debug)]
pub struct BatchResult {
    /// One entry per diff, in input order: the target path and either the
    /// per-hunk report or the hard error that stopped the file.
    pub results: Vec<(PathBuf, Result<PatchResult, PatchError>)>,
}

impl BatchResult {
    /// No file hit a hard error. Says nothing about individual hunks.
    pub fn all_succeeded(&self) -> bool {
        self.results.iter().all(|(_, res)| res.is_ok())
    }

    /// Every file whose hunks all applied.
    pub fn all_applied(&self) -> bool {
        self.results
            .iter()
            .all(|(_, res)| res.as_ref().is_ok_and(|r| r.report.all_applied()))
    }

    pub fn hard_failures(&self) -> Vec<(&PathBuf, &PatchError)> {
        self.results
            .iter()
            .filter_map(|(path, res)| res.as_ref().err().map(|e| (path, e)))
            .collect()
    }
}

fn map_io_error(path: PathBuf, e: std::io::Error) -> PatchError {
    match e.kind() {
        std::io::ErrorKind::PermissionDenied => PatchError::PermissionDenied { path },
        std::io::ErrorKind::IsADirectory => PatchError::TargetIsDirectory { path },
        _ => PatchError::Io { path, source: e },
    }
}

/// Resolves `relative_path` under `base_dir`, failing if the result escapes
/// `base_dir`.
///
/// Both sides are canonicalized, so `..` components and symlinks are
/// followed before the check. Missing parent directories are created.
///
/// # Example
///
/// ```
/// # use driftpatch::{ensure_path_is_safe, PatchError};
/// # use std::path::Path;
/// # use tempfile::tempdir;
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let dir = tempdir()?;
///
/// let resolved = ensure_path_is_safe(dir.path(), Path::new("src/main.rs"))?;
/// assert!(resolved.starts_with(std::fs::canonicalize(dir.path())?));
///
/// let escaped = ensure_path_is_safe(dir.path(), Path::new("../secret.txt"));
/// assert!(matches!(escaped, Err(PatchError::PathTraversal(_))));
/// # Ok(())
/// # }
/// ```
pub fn ensure_path_is_safe(base_dir: &Path, relative_path: &Path) -> Result<PathBuf, PatchError> {
    resolve_under(base_dir, relative_path, true)
}

/// [`ensure_path_is_safe`] that only creates missing parents when
/// `create_parents` is set. Otherwise the nearest existing ancestor is
/// canonicalized and the missing components are appended to it.
fn resolve_under(
    base_dir: &Path,
    relative_path: &Path,
    create_parents: bool,
) -> Result<PathBuf, PatchError> {
    trace!(
        "  Checking path safety for base '{}' and relative path '{}'",
        base_dir.display(),
        relative_path.display()
    );
    if escapes_lexically(relative_path) {
        return Err(PatchError::PathTraversal(relative_path.to_path_buf()));
    }
    let base_path =
        fs::canonicalize(base_dir).map_err(|e| map_io_error(base_dir.to_path_buf(), e))?;
    let target_file_path = base_dir.join(relative_path);
    let parent = target_file_path.parent().unwrap_or(Path::new(""));
    if create_parents {
        fs::create_dir_all(parent).map_err(|e| map_io_error(parent.to_path_buf(), e))?;
    }
    let (existing, missing) = split_at_existing(parent);
    let final_path = fs::canonicalize(existing)
        .map_err(|e| map_io_error(existing.to_path_buf(), e))?
        .join(missing)
        .join(target_file_path.file_name().unwrap_or_default());
    if !final_path.starts_with(&base_path) {
        return Err(PatchError::PathTraversal(relative_path.to_path_buf()));
    }
    Ok(final_path)
}

/// Splits `path` into its longest existing prefix and the components below
/// it that do not exist yet.
fn split_at_existing(path: &Path) -> (&Path, PathBuf) {
    let mut existing = path;
    let mut missing = Vec::new();
    while !existing.exists() {
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name);
                existing = parent;
            }
            _ => break,
        }
    }
    (existing, missing.into_iter().rev().collect())
}

/// Absolute paths, and `..` components that climb above the start, escape
/// before any symlink is considered.
fn escapes_lexically(path: &Path) -> bool {
    let mut depth = 0usize;
    for component in path.components() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::ParentDir => match depth.checked_sub(1) {
                Some(d) => depth = d,
                None => return true,
            },
            Component::RootDir | Component::Prefix(_) => return true,
        }
    }
    false
}

/// A target file read and ready for patching.
struct Target {
    path: PathBuf,
    original: String,
}

fn read_target(
    diff: &FileDiff,
    target_dir: &Path,
    options: &ApplyOptions,
) -> Result<Target, PatchError> {
    let relative = diff.target_path();
    // A dry run must leave the tree exactly as it found it.
    let path = resolve_under(target_dir, &relative, !options.dry_run)?;
    trace!("    Path is safe.");

    if path.is_dir() {
        return Err(PatchError::TargetIsDirectory { path });
    }
    let original = if path.is_file() {
        trace!("  Reading target file '{}'", relative.display());
        fs::read_to_string(&path).map_err(|e| map_io_error(path.clone(), e))?
    } else {
        if !diff.is_creation() {
            return Err(PatchError::TargetNotFound(target_dir.join(&relative)));
        }
        info!("  Target file does not exist. Assuming file creation.");
        String::new()
    };
    Ok(Target { path, original })
}

fn write_target(
    diff: &FileDiff,
    target: &Target,
    report: FileResult,
    options: &ApplyOptions,
) -> Result<PatchResult, PatchError> {
    let relative = diff.target_path();

    if options.dry_run {
        info!("  DRY RUN: Would write changes to '{}'", relative.display());
        let diff = report.unified_diff();
        return Ok(PatchResult { report, diff });
    }

    if !report.is_changed() {
        if report.aborted {
            warn!("  Left '{}' untouched (strict mode).", relative.display());
        } else {
            info!("  No changes to write for '{}'", relative.display());
        }
        return Ok(PatchResult { report, diff: None });
    }

    if diff.is_deletion() && report.text.is_empty() && report.all_applied() {
        fs::remove_file(&target.path).map_err(|e| map_io_error(target.path.clone(), e))?;
        info!("  Deleted '{}'", relative.display());
        return Ok(PatchResult { report, diff: None });
    }

    if let Some(parent) = target.path.parent() {
        fs::create_dir_all(parent).map_err(|e| map_io_error(parent.to_path_buf(), e))?;
    }
    fs::write(&target.path, &report.text).map_err(|e| map_io_error(target.path.clone(), e))?;
    if report.all_applied() {
        info!("  Successfully wrote changes to '{}'", relative.display());
    } else {
        warn!("  Wrote partial changes to '{}'", relative.display());
    }
    Ok(PatchResult { report, diff: None })
}

/// Applies one diff to its file under `target_dir`.
///
/// A missing file is only accepted when the diff creates it. In dry-run mode
/// nothing is written and the result carries a unified diff of what would
/// change.
///
/// ````
/// # use driftpatch::{apply_to_dir, parse_diff, ApplyOptions};
/// # use std::fs;
/// # use tempfile::tempdir;
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let dir = tempdir()?;
/// fs::write(dir.path().join("hello.txt"), "Hello, world!\n")?;
///
/// let diffs = parse_diff(r#"
/// ```diff
/// --- a/hello.txt
/// +++ b/hello.txt
/// @@ -1 +1 @@
/// -Hello, world!
/// +Hello, driftpatch!
/// ```
/// "#)?;
///
/// let result = apply_to_dir(&diffs[0], dir.path(), &ApplyOptions::default())?;
/// assert!(result.report.all_applied());
/// assert_eq!(fs::read_to_string(dir.path().join("hello.txt"))?, "Hello, driftpatch!\n");
/// # Ok(())
/// # }
/// ````
pub fn apply_to_dir(
    diff: &FileDiff,
    target_dir: &Path,
    options: &ApplyOptions,
) -> Result<PatchResult, PatchError> {
    let target = read_target(diff, target_dir, options)?;
    let report = apply_file_diff(diff, &target.original, options);
    write_target(diff, &target, report, options)
}

/// Applies every diff to its file under `target_dir`.
///
/// Files are read and written one at a time; the in-memory application in
/// between runs on up to `workers` threads. A hard error on one file does
/// not stop the others.
pub fn apply_diffs_to_dir(
    diffs: &[FileDiff],
    target_dir: &Path,
    options: &ApplyOptions,
    workers: usize,
) -> BatchResult {
    let mut slots: Vec<Option<Result<PatchResult, PatchError>>> = Vec::with_capacity(diffs.len());
    let mut ready: Vec<(usize, Target)> = Vec::new();
    for (i, diff) in diffs.iter().enumerate() {
        match read_target(diff, target_dir, options) {
            Ok(target) => {
                ready.push((i, target));
                slots.push(None);
            }
            Err(e) => {
                warn!("Skipping '{}': {}", diff.target_path().display(), e);
                slots.push(Some(Err(e)));
            }
        }
    }

    let jobs: Vec<Job<'_>> = ready
        .iter()
        .map(|(i, target)| (&diffs[*i], target.original.as_str()))
        .collect();
    let reports = apply_all(&jobs, options, workers);

    for ((i, target), report) in ready.iter().zip(reports) {
        slots[*i] = Some(write_target(&diffs[*i], target, report, options));
    }

    let results = diffs
        .iter()
        .zip(slots)
        .filter_map(|(diff, slot)| slot.map(|res| (diff.target_path(), res)))
        .collect();
    BatchResult { results }
}
