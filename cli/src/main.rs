//! rdeploy - Command-line interface for the deploy engine.
//!
//! Mirrors a local directory onto a deploy target, transferring only what
//! changed since the last run. It provides argument parsing, logging setup and
//! per-operation progress output to stderr.

use clap::{ArgAction, Parser};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::level_filters::LevelFilter;

use engine::{
    create_job, plan_job, sync, DigestAlgorithm, ExcludeSet, LocalDirRemote, ManifestPolicy,
    Operation, OperationKind, Outcome, ProgressSink, SyncConfig, SyncIssue, SyncJob,
    SyncOutcome, SyncPlan, SyncReport,
};

/// rdeploy - deploy a directory tree, transferring only what changed
#[derive(Parser, Debug)]
#[command(name = "rdeploy")]
#[command(version = "0.1.0")]
#[command(about = "Synchronize a local directory to a deploy target using a checksum manifest")]
struct Args {
    /// Directory the deploy target is reachable under (mount point or staging copy)
    #[arg(long, value_name = "DIR")]
    target: PathBuf,

    /// Local directory to deploy [default: .]
    #[arg(short = 'l', long = "local", value_name = "PATH")]
    local: Option<PathBuf>,

    /// Remote directory inside the target [default: .]
    #[arg(short = 'r', long = "remote", value_name = "PATH")]
    remote: Option<String>,

    /// Remote checksum file inside the target [default: DEPLOY_CHECKSUMS]
    #[arg(short = 'c', long = "checksum-file", value_name = "PATH")]
    checksum_file: Option<String>,

    /// File with one exclude pattern per line
    #[arg(short = 'e', long = "exclude-file", value_name = "FILE")]
    exclude_file: Option<PathBuf>,

    /// Exclude every path containing PATTERN (substring match, repeatable)
    #[arg(long = "exclude", value_name = "PATTERN")]
    exclude: Vec<String>,

    /// Digest algorithm: md5, sha256 or blake3 [default: md5]
    #[arg(long, value_name = "ALGORITHM")]
    algorithm: Option<String>,

    /// Record failed operations in the checksum file as if they had succeeded
    #[arg(long)]
    legacy_manifest: bool,

    /// TOML config file; command-line options override its values
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print the plan without changing the target
    #[arg(long)]
    dry_run: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Only print failures
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

/// Width of the padded operation label, leaving room for "done"/"failed".
const LABEL_WIDTH: usize = 72;

/// CLI implementation of ProgressSink printing one line per operation
struct CliProgress {
    quiet: bool,
    start_time: Instant,
}

impl CliProgress {
    fn new(quiet: bool) -> Self {
        CliProgress {
            quiet,
            start_time: Instant::now(),
        }
    }

    fn label(operation: &Operation) -> String {
        let path = &operation.path;
        match operation.kind {
            OperationKind::CreateDir => format!("Creating remote directory '{path}'... "),
            OperationKind::Upload => format!("Uploading file '{path}'... "),
            OperationKind::RemoveFile => format!("Removing remote file '{path}'... "),
            OperationKind::RemoveDir => format!("Removing remote directory '{path}'... "),
            OperationKind::PersistManifest => format!("Uploading new checksum file to '{path}'... "),
        }
    }

    fn format_duration(elapsed: Duration) -> String {
        let secs = elapsed.as_secs();
        let hours = secs / 3600;
        let mins = (secs % 3600) / 60;
        let secs = secs % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, mins, secs)
        } else if mins > 0 {
            format!("{}m {}s", mins, secs)
        } else {
            format!("{}s", secs)
        }
    }
}

impl ProgressSink for CliProgress {
    fn on_sync_started(&self, job: &SyncJob) {
        if self.quiet {
            return;
        }
        eprintln!("Deploying {}", job.config.local_root.display());
        eprintln!("  Remote: {}", job.config.remote_root);
        eprintln!("  Checksum file: {} ({})", job.config.manifest_path, job.config.algorithm);
        if let Some(plan) = &job.plan {
            eprintln!(
                "  Plan: {} to create, {} to upload, {} to remove, {} unchanged",
                plan.dirs_to_create.len(),
                plan.files_to_upload.len(),
                plan.files_to_remove.len() + plan.dirs_to_remove.len(),
                plan.unchanged.len()
            );
        }
        eprintln!();
    }

    fn on_notice(&self, issue: &SyncIssue) {
        eprintln!("{issue}");
    }

    fn on_operation_started(&self, operation: &Operation) {
        if !self.quiet {
            eprint!("{:<width$}", Self::label(operation), width = LABEL_WIDTH);
        }
    }

    fn on_operation_completed(&self, operation: &Operation, outcome: &Outcome) {
        match outcome {
            Outcome::Success => {
                if !self.quiet {
                    eprintln!("done");
                }
            }
            Outcome::Failure(message) => {
                if self.quiet {
                    eprint!("{:<width$}", Self::label(operation), width = LABEL_WIDTH);
                }
                eprintln!("failed");
                eprintln!("ERROR: {message}");
            }
            Outcome::Cancelled => {
                if !self.quiet {
                    eprintln!("{:<width$}skipped", Self::label(operation), width = LABEL_WIDTH);
                }
            }
        }
    }

    fn on_sync_completed(&self, report: &SyncReport) {
        match report.outcome {
            SyncOutcome::NothingToDo => {
                eprintln!("Deploy target has not been modified - nothing done");
            }
            SyncOutcome::NoOperationSucceeded => {
                eprintln!("Deploy target has not been modified - every operation failed");
            }
            SyncOutcome::PersistFailed => {
                eprintln!("WARNING: checksum file was not updated; the next run compares against stale state");
            }
            SyncOutcome::Persisted if report.manifest_stale => {
                eprintln!("WARNING: checksum file records failed operations as done");
            }
            SyncOutcome::Persisted => {}
        }

        if self.quiet {
            return;
        }
        eprintln!();
        eprintln!(
            "Summary: {} done, {} failed, {} skipped",
            report.succeeded, report.failed, report.cancelled
        );
        eprintln!("Elapsed: {}", Self::format_duration(self.start_time.elapsed()));
    }
}

fn print_plan(plan: &SyncPlan) {
    if plan.is_empty() {
        println!("Nothing to do");
        return;
    }
    for operation in plan.operations() {
        println!("{:<7} {}", operation.kind, operation.path);
    }
    for path in &plan.skipped {
        println!("{:<7} {}", "skip", path);
    }
}

/// Merge the optional config file with command-line overrides
fn build_config(args: &Args) -> Result<SyncConfig, String> {
    let mut config = match &args.config {
        Some(path) => SyncConfig::from_file(path).map_err(|e| e.to_string())?,
        None => SyncConfig::default(),
    };

    if let Some(local) = &args.local {
        config.local_root = local.clone();
    }
    if let Some(remote) = &args.remote {
        config.remote_root = remote.clone();
    }
    if let Some(checksum_file) = &args.checksum_file {
        config.manifest_path = checksum_file.clone();
    }
    if let Some(exclude_file) = &args.exclude_file {
        let from_file = ExcludeSet::from_file(exclude_file).map_err(|e| e.to_string())?;
        config.excludes.extend(from_file.patterns().iter().cloned());
    }
    config.excludes.extend(args.exclude.iter().cloned());

    if let Some(name) = &args.algorithm {
        config.algorithm = DigestAlgorithm::from_name(name).ok_or_else(|| {
            format!(
                "Invalid digest algorithm '{}'. Must be 'md5', 'sha256', or 'blake3'",
                name
            )
        })?;
    }
    if args.legacy_manifest {
        config.manifest_policy = ManifestPolicy::Legacy;
    }

    Ok(config)
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        LevelFilter::OFF
    } else {
        match verbose {
            0 => LevelFilter::ERROR,
            1 => LevelFilter::INFO,
            2 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Parse and validate command-line arguments, then run the deploy
fn main() {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    let exit_code = match run_cli(&args) {
        Ok(()) => 0,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            2
        }
    };

    std::process::exit(exit_code);
}

/// Main CLI logic - separated for testability
fn run_cli(args: &Args) -> Result<(), String> {
    let config = build_config(args)?;

    let mut remote = LocalDirRemote::new(&args.target)
        .map_err(|e| format!("Cannot open deploy target: {}", e))?;
    let progress = CliProgress::new(args.quiet);

    if args.dry_run {
        let mut job = create_job(config).map_err(|e| format!("Deploy failed: {}", e))?;
        plan_job(&mut job, &mut remote, Some(&progress))
            .map_err(|e| format!("Planning failed: {}", e))?;
        if let Some(plan) = &job.plan {
            print_plan(plan);
        }
        return Ok(());
    }

    let report = sync(config, &mut remote, Some(&progress))
        .map_err(|e| format!("Deploy failed: {}", e))?;

    if report.failed > 0 {
        Err("One or more operations failed".to_string())
    } else if report.outcome == SyncOutcome::PersistFailed {
        Err("Checksum file could not be uploaded".to_string())
    } else {
        Ok(())
    }
}
