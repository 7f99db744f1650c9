use anyhow::{anyhow, Context, Result};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use driftpatch::{
    apply_diffs_to_dir, parse_diff, ApplyOptions, BatchResult, FileResult, HunkOutcome, Strategy,
    Thresholds,
};
use env_logger::Builder;
use log::{error, info, warn, Level, LevelFilter};
use serde_json::json;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

fn main() {
    let args = Args::parse();

    if let Err(e) = run(args) {
        // {:?} prints the whole anyhow context chain.
        eprintln!("{} {:?}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    setup_logging(args.verbose);

    if !args.target_dir.is_dir() {
        return Err(anyhow!(
            "Target directory '{}' not found or is not a directory.",
            args.target_dir.display()
        ));
    }
    let options = args.apply_options()?;

    let content = fs::read_to_string(&args.diff_file)
        .with_context(|| format!("Failed to read diff file '{}'", args.diff_file.display()))?;
    let diffs = parse_diff(&content)
        .with_context(|| format!("Failed to parse '{}'", args.diff_file.display()))?;

    if diffs.is_empty() {
        info!("No file sections found in the diff.");
        if args.json {
            println!("[]");
        }
        return Ok(());
    }

    info!("");
    info!("Found {} file(s) to patch.", diffs.len());
    info!(
        "Strategy: {:?}, search radius: {}, strict: {}",
        options.strategy, options.search_radius, options.strict
    );

    let batch = apply_diffs_to_dir(&diffs, &args.target_dir, &options, args.jobs);

    if args.json {
        print_json(&batch)?;
    } else {
        print_human(&batch);
    }

    let hard = batch.hard_failures().len();
    let partial = batch
        .results
        .iter()
        .filter(|(_, res)| res.as_ref().is_ok_and(|r| !r.report.all_applied()))
        .count();

    info!("\n--- Summary ---");
    info!("Files patched cleanly: {}", batch.results.len() - hard - partial);
    info!("Files with failed hunks: {}", partial);
    info!("Files not processed:    {}", hard);
    if options.dry_run {
        info!("DRY RUN completed. No files were modified.");
    }

    if hard + partial > 0 {
        if !options.strict && partial > 0 {
            warn!("Review the log for errors. Some files may be in a partially patched state.");
        }
        return Err(anyhow!(
            "Completed with {} file(s) not fully patched.",
            hard + partial
        ));
    }
    Ok(())
}

fn print_human(batch: &BatchResult) {
    for (path, res) in &batch.results {
        match res {
            Ok(output) => {
                if let Some(diff) = &output.diff {
                    println!("----- Proposed Changes for {} -----", path.display());
                    print!("{}", diff);
                    println!("------------------------------------");
                }
                log_outcomes(&output.report);
            }
            Err(e) => error!("--- Could not patch {}: {}", path.display(), e),
        }
    }
}

fn log_outcomes(report: &FileResult) {
    if report.all_applied() {
        info!(
            "{}: {} applied, {} skipped",
            report.path.display(),
            report.counts.applied,
            report.counts.skipped
        );
    } else {
        error!("--- FAILED to fully apply diff for: {}", report.path.display());
    }
    for (i, outcome) in report.outcomes.iter().enumerate() {
        match outcome {
            HunkOutcome::Applied(m) if m.degraded || m.widened => warn!(
                "  - Hunk {} applied at line {} via {} match (score {:.3}); please review.",
                i + 1,
                m.start_line + 1,
                m.tier,
                m.score
            ),
            HunkOutcome::Failed(reason) => warn!("  - Hunk {} failed: {}", i + 1, reason),
            _ => {}
        }
    }
}

fn print_json(batch: &BatchResult) -> Result<()> {
    let entries: Vec<serde_json::Value> = batch
        .results
        .iter()
        .map(|(path, res)| match res {
            Ok(output) => json!({
                "path": path,
                "result": output.report,
                "diff": output.diff,
            }),
            Err(e) => json!({
                "path": path,
                "error": e.to_string(),
            }),
        })
        .collect();
    let text = serde_json::to_string_pretty(&entries).context("Failed to serialize results")?;
    println!("{}", text);
    Ok(())
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum StrategyArg {
    /// Similarity search with fallbacks.
    Tiered,
    /// Verbatim match at the header's line number only.
    Strict,
}

impl From<StrategyArg> for Strategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Tiered => Strategy::Tiered,
            StrategyArg::Strict => Strategy::Strict,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Apply approximate unified diffs (e.g. from language models) by locating hunks by similarity.",
    long_about = "Line numbers in hunk headers are used only as hints. Each hunk is located by \
                  full-block, context-only, then anchor-only similarity search, and every hunk's \
                  outcome is reported. Diffs may be wrapped in markdown fences or surrounded by prose."
)]
struct Args {
    /// File containing one or more unified diffs.
    diff_file: PathBuf,
    /// Directory the diff paths are relative to.
    target_dir: PathBuf,
    #[arg(short = 'n', long, help = "Show what would be done, but don't modify files.")]
    dry_run: bool,
    /// Discard all edits to a file if any of its hunks fails.
    #[arg(long)]
    strict: bool,
    #[arg(long, value_enum, default_value_t = StrategyArg::Tiered)]
    strategy: StrategyArg,
    /// Lines either side of the header hint searched before widening.
    #[arg(long, default_value_t = 32)]
    search_radius: usize,
    /// Cap on window positions scanned in one search pass.
    #[arg(long, default_value_t = 20_000)]
    max_search_lines: usize,
    /// Per-file cap on line comparisons.
    #[arg(long)]
    max_comparisons: Option<u64>,
    /// Per-file wall-clock budget in milliseconds.
    #[arg(long)]
    time_budget_ms: Option<u64>,
    #[arg(long, default_value_t = Thresholds::default().full_block)]
    full_block_threshold: f64,
    #[arg(long, default_value_t = Thresholds::default().context_only)]
    context_threshold: f64,
    #[arg(long, default_value_t = Thresholds::default().anchor_only)]
    anchor_threshold: f64,
    /// Print per-file results as JSON on stdout.
    #[arg(long)]
    json: bool,
    /// Worker threads for independent files (0 = one per core).
    #[arg(short = 'j', long, default_value_t = 0)]
    jobs: usize,
    /// Increase logging verbosity.
    /// -v for info, -vv for debug, -vvv for trace.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Args {
    fn apply_options(&self) -> Result<ApplyOptions> {
        let thresholds = Thresholds {
            full_block: self.full_block_threshold,
            context_only: self.context_threshold,
            anchor_only: self.anchor_threshold,
            ..Thresholds::default()
        };
        thresholds.validate().map_err(|e| anyhow!(e))?;

        let mut builder = ApplyOptions::builder()
            .thresholds(thresholds)
            .search_radius(self.search_radius)
            .max_search_lines(self.max_search_lines)
            .strict(self.strict)
            .strategy(self.strategy.into())
            .dry_run(self.dry_run);
        if let Some(n) = self.max_comparisons {
            builder = builder.max_comparisons(n);
        }
        if let Some(ms) = self.time_budget_ms {
            builder = builder.time_budget(Duration::from_millis(ms));
        }
        Ok(builder.build())
    }
}

fn setup_logging(verbose: u8) {
    let log_level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    Builder::new()
        .filter_level(log_level)
        .format(|buf, record| match record.level() {
            Level::Error => writeln!(buf, "{} {}", "error:".red().bold(), record.args()),
            Level::Warn => writeln!(buf, "{} {}", "warning:".yellow().bold(), record.args()),
            Level::Info => writeln!(buf, "{}", record.args()),
            Level::Debug => writeln!(buf, "{} {}", "debug:".blue().bold(), record.args()),
            Level::Trace => writeln!(buf, "{} {}", "trace:".cyan().bold(), record.args()),
        })
        .init();
}
