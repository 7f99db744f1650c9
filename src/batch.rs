//! Applying independent diffs side by side.
//!
//! Hunks of one file always run in order on one thread. Separate files, or
//! separate candidate diffs against the same base text, share nothing and
//! are spread over a bounded pool when the `parallel` feature is enabled.

use crate::apply::apply_file_diff;
use crate::diff::FileDiff;
use crate::options::ApplyOptions;
use crate::report::FileResult;
use log::debug;
#[cfg(feature = "parallel")]
use log::warn;
#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// One unit of work: a diff and the text it applies to.
pub type Job<'a> = (&'a FileDiff, &'a str);

/// Applies every job, returning results in job order.
///
/// `workers` bounds the pool size; `0` lets the pool pick one thread per
/// core. Without the `parallel` feature jobs run one after another.
pub fn apply_all(jobs: &[Job<'_>], options: &ApplyOptions, workers: usize) -> Vec<FileResult> {
    debug!("Applying {} file diffs with up to {} workers.", jobs.len(), workers);
    run(jobs, options, workers)
}

/// Applies each candidate diff to the same base text independently.
///
/// Useful for comparing several generated diffs for one file.
///
/// ```
/// # use driftpatch::{apply_candidates, parse_diff, ApplyOptions};
/// let base = "a\nb\nc\n";
/// let first = parse_diff("--- a/f\n+++ b/f\n@@ -2 +2 @@\n-b\n+B\n").unwrap();
/// let second = parse_diff("--- a/f\n+++ b/f\n@@ -2 +2 @@\n-nope\n+X\n").unwrap();
/// let candidates = [first[0].clone(), second[0].clone()];
///
/// let results = apply_candidates(base, &candidates, &ApplyOptions::default(), 2);
/// assert!(results[0].all_applied());
/// assert_eq!(results[0].text, "a\nB\nc\n");
/// assert!(!results[1].all_applied());
/// assert_eq!(results[1].text, base);
/// ```
pub fn apply_candidates(
    base: &str,
    diffs: &[FileDiff],
    options: &ApplyOptions,
    workers: usize,
) -> Vec<FileResult> {
    let jobs: Vec<Job<'_>> = diffs.iter().map(|d| (d, base)).collect();
    run(&jobs, options, workers)
}

#[cfg(feature = "parallel")]
fn run(jobs: &[Job<'_>], options: &ApplyOptions, workers: usize) -> Vec<FileResult> {
    match rayon::ThreadPoolBuilder::new().num_threads(workers).build() {
        Ok(pool) => pool.install(|| {
            jobs.par_iter()
                .map(|(diff, text)| apply_file_diff(diff, text, options))
                .collect()
        }),
        Err(e) => {
            warn!("Could not start worker pool ({}); applying sequentially.", e);
            run_sequential(jobs, options)
        }
    }
}

#[cfg(not(feature = "parallel"))]
fn run(jobs: &[Job<'_>], options: &ApplyOptions, _workers: usize) -> Vec<FileResult> {
    run_sequential(jobs, options)
}

fn run_sequential(jobs: &[Job<'_>], options: &ApplyOptions) -> Vec<FileResult> {
    jobs.iter()
        .map(|(diff, text)| apply_file_diff(diff, text, options))
        .collect()
}
