//! Addon Merger - command line entry point.
//!
//! # Overview
//!
//! Merges every addon folder found under `--addons` into a single output tree.
//! The binary only wires things together:
//! - Logging infrastructure (file rotation + console output)
//! - Configuration loading ([`ConfigManager`]): ignore list and optional settings
//! - Tokio runtime whose blocking pool hosts the merge workers
//! - [`MergeCoordinator`] run and, with `--log`, the consolidated reports
//!
//! # Execution Flow
//!
//! 1. Parse flags, initialize logging -> `<log dir>/addon-merger.<date>`
//! 2. Load `ignore.yaml` (created with defaults if absent) and `settings.yaml`
//! 3. Discover and filter addon folders
//! 4. Partition the addons and run one worker per assignment
//! 5. Write `conflicts.log` / `errors.log` when logging is enabled
//!
//! # Exit Status
//!
//! - `0`: every worker completed (per-file conflicts and errors are not failures)
//! - `1`: at least one worker failed fatally
//! - `2`: setup failed before any worker started

use addon_merger::models::{DEFAULT_MERGE_DIR, MergeSettings, OutputLayout};
use addon_merger::services::{discover_addons, filter_addons};
use addon_merger::{
    APP_NAME, ConfigManager, EventBus, MergeCoordinator, MergeEvent, MergeOptions, VERSION,
};
use anyhow::{Context, Result, bail};
use camino::Utf8PathBuf;
use clap::Parser;
use std::process::ExitCode;

/// Merge many addon folders into a single output folder.
#[derive(Parser, Debug)]
#[command(name = "addon-merger", version, about)]
struct Cli {
    /// Folder containing the addon folders to merge
    #[arg(short, long)]
    addons: Utf8PathBuf,

    /// Output folder [default: <ADDONS>/_MERGED]
    #[arg(short, long)]
    output: Option<Utf8PathBuf>,

    /// Maximum number of worker threads [default: half the CPU count, rounded up]
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    max_workers: Option<u32>,

    /// Addons given to each worker; exceeded when --max-workers caps the worker count [default: 20]
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    addons_per_worker: Option<u32>,

    /// Ignore list file, a YAML (or JSON) array of folder names
    #[arg(long)]
    ignore_file: Option<Utf8PathBuf>,

    /// Folder holding ignore.yaml and settings.yaml [default: folder of the executable]
    #[arg(long)]
    config_dir: Option<Utf8PathBuf>,

    /// Overwrite files that already exist in the output
    #[arg(long)]
    overwrite_conflicts: bool,

    /// Write conflicts.log and errors.log after the merge
    #[arg(long)]
    log: bool,

    /// Folder for application logs and merge reports [default: logs]
    #[arg(long)]
    log_dir: Option<String>,

    /// Merge addon contents directly into the output instead of one folder per addon
    #[arg(long)]
    flatten: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Log to the log file only, not the console
    #[arg(short, long)]
    quiet: bool,

    /// Write the effective settings back to settings.yaml before merging
    #[arg(long)]
    save_settings: bool,
}

impl Cli {
    /// Flags override whatever settings.yaml provided
    fn apply_to(&self, mut settings: MergeSettings) -> MergeSettings {
        if let Some(n) = self.max_workers {
            settings.max_workers = n as usize;
        }
        if let Some(n) = self.addons_per_worker {
            settings.addons_per_worker = n as usize;
        }
        if let Some(dir) = &self.log_dir {
            settings.log_dir = dir.clone();
        }
        settings.overwrite_conflicts |= self.overwrite_conflicts;
        settings.log |= self.log;
        if self.flatten {
            settings.layout = OutputLayout::Flatten;
        }
        settings
    }

    fn output_root(&self) -> Utf8PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| self.addons.join(DEFAULT_MERGE_DIR))
    }
}

fn default_config_dir() -> Result<Utf8PathBuf> {
    let exe = std::env::current_exe().context("Failed to locate the running executable")?;
    let exe = Utf8PathBuf::try_from(exe).context("Executable path is not valid UTF-8")?;
    Ok(exe
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| Utf8PathBuf::from(".")))
}

fn validate(settings: &MergeSettings) -> Result<()> {
    if settings.max_workers == 0 {
        bail!("Max Workers must be at least 1");
    }
    if settings.addons_per_worker == 0 {
        bail!("Addons Per Worker must be at least 1");
    }
    Ok(())
}

/// Print warnings for conflicts and errors as they happen, best-effort.
fn spawn_progress_listener(runtime: &tokio::runtime::Runtime, events: &EventBus) {
    let mut rx = events.subscribe();
    runtime.spawn(async move {
        use tokio::sync::broadcast::error::RecvError;
        loop {
            match rx.recv().await {
                Ok(MergeEvent::WorkerFinished { worker, status }) => {
                    tracing::info!("[Worker {}] Worker {}.", worker, status);
                }
                Ok(MergeEvent::RunFinished { .. }) | Err(RecvError::Closed) => break,
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!("Progress listener skipped {} event(s)", skipped);
                }
            }
        }
    });
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config_dir = match &cli.config_dir {
        Some(dir) => dir.clone(),
        None => default_config_dir()?,
    };
    let mut config_manager = ConfigManager::new(&config_dir)?;
    if let Some(path) = &cli.ignore_file {
        config_manager = config_manager.with_ignore_file(path);
    }

    let settings = cli.apply_to(config_manager.load_settings()?);
    validate(&settings)?;
    if cli.save_settings {
        config_manager.save_settings(&settings)?;
    }
    let ignore_list = config_manager.load_ignore_list()?;
    if ignore_list.is_empty() {
        tracing::debug!("Ignore list is empty, every addon folder will be merged");
    }

    tracing::info!("Arguments good, getting addons at {}", cli.addons);
    let candidates = discover_addons(&cli.addons)?;
    tracing::info!("Filtering addons and starting merge...");
    let addons = filter_addons(&ignore_list, &candidates);

    if addons.is_empty() {
        tracing::warn!("No addons to merge in {}", cli.addons);
        return Ok(ExitCode::SUCCESS);
    }

    let options = MergeOptions::new(cli.output_root())
        .with_overwrite_conflicts(settings.overwrite_conflicts)
        .with_logging(settings.log)
        .with_layout(settings.layout);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(1)
        .max_blocking_threads(settings.max_workers)
        .thread_name("merge-worker")
        .build()
        .context("Failed to build tokio runtime")?;

    let events = EventBus::default();
    spawn_progress_listener(&runtime, &events);

    let coordinator = MergeCoordinator::new(options).with_events(events);
    let report = runtime.block_on(coordinator.merge(
        &addons,
        settings.max_workers,
        settings.addons_per_worker,
    ));
    report.stats.log_summary();

    let log_dir = Utf8PathBuf::from(&settings.log_dir);
    coordinator.write_reports(&log_dir, &report)?;

    runtime.shutdown_timeout(std::time::Duration::from_secs(5));

    if report.has_fatal_failures() {
        tracing::error!(
            "{} of {} worker(s) failed",
            report.failed_workers(),
            report.worker_count()
        );
        return Ok(ExitCode::from(1));
    }
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_dir = cli
        .log_dir
        .clone()
        .unwrap_or_else(|| addon_merger::models::DEFAULT_LOG_DIR.to_string());
    // Keep the guard alive until exit so buffered log lines are flushed
    let logging = if cli.quiet {
        addon_merger::logging::setup_logging(&log_dir, "addon-merger", cli.debug)
    } else {
        addon_merger::logging::setup_logging_with_console(&log_dir, "addon-merger", cli.debug, true)
    };
    let _guard = match logging {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {:#}", e);
            return ExitCode::from(2);
        }
    };

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::from(2)
        }
    }
}
