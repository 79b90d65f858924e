//! Tick Loader CLI
//!
//! Loads one month of per-symbol tick files into the `ticks` table, one day at
//! a time.
//!
//! Usage:
//!   cargo run --release -- /data/ticks 2016 04 --db ./ticks.db
//!
//!   # Only two days, smaller pool, JSON report
//!   cargo run --release -- /data/ticks 2016 04 --day 01 --day 05 \
//!       --workers 2 --report-json ./load-report.json

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use dotenv::dotenv;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use tick_loader::coordinator::rate_display;
use tick_loader::{
    DayCoordinator, DayManifest, IngestError, LoaderConfig, RunReport, SqliteTickStore,
    TargetMonth, TickStore,
};

#[derive(Parser, Debug)]
#[command(name = "tick_loader")]
#[command(about = "Bulk-load per-day market tick CSV files into the ticks table")]
struct Args {
    /// Root of the <year>/<month>/<day>/<symbol-file> tree
    data_root: PathBuf,

    /// Year directory to load, e.g. 2016
    year: String,

    /// Month directory to load, e.g. 04
    month: String,

    /// SQLite database path
    #[arg(long, env = "TICK_DB_PATH")]
    db: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long, env = "TICK_LOADER_CONFIG")]
    config: Option<PathBuf>,

    /// Partitions per day (one batch and one commit each)
    #[arg(long, env = "TICK_LOADER_PARTITIONS")]
    partitions: Option<usize>,

    /// Parse threads
    #[arg(long, env = "TICK_LOADER_WORKERS")]
    workers: Option<usize>,

    /// Only load these day directories (repeatable)
    #[arg(long = "day")]
    days: Vec<String>,

    /// Write the run report as JSON
    #[arg(long)]
    report_json: Option<PathBuf>,
}

fn main() -> Result<()> {
    load_env();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("tick_loader=info"))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .init();

    let args = Args::parse();
    let config = resolve_config(&args)?;
    let target = TargetMonth::parse(&args.year, &args.month)?;

    info!("Collecting market data file info");
    let mut manifest = DayManifest::scan(&args.data_root, &target.year, &target.month)
        .context("failed to build day manifest")?;
    if !args.days.is_empty() {
        manifest.retain_days(&args.days);
    }
    info!(
        days = manifest.len(),
        files = manifest.total_files(),
        "Collection complete"
    );

    let mut store = SqliteTickStore::open(&config.database)
        .map_err(IngestError::Connection)
        .with_context(|| format!("failed to open {}", config.database.path.display()))?;

    let coordinator =
        DayCoordinator::new(&config.ingest).context("failed to build parse thread pool")?;
    let report = coordinator.run(&mut store, &manifest);

    let stats = store.stats();
    if let Err(e) = store.close() {
        error!("failed to close database: {}", e);
    }

    print_summary(&report);
    info!(
        batches = stats.batches,
        rows = stats.rows_written,
        commits = stats.commits,
        rollbacks = stats.rollbacks,
        "store counters"
    );

    if let Some(path) = &args.report_json {
        write_report(path, &report)?;
    }

    Ok(())
}

fn load_env() {
    // Standard dotenv search (cwd + parents)
    let _ = dotenv();
}

/// Defaults < TOML file < flags / environment.
fn resolve_config(args: &Args) -> Result<LoaderConfig> {
    let mut config = match &args.config {
        Some(path) => {
            info!("Loading config from {}", path.display());
            LoaderConfig::load(path)
                .with_context(|| format!("failed to load config {}", path.display()))?
        }
        None => LoaderConfig::default(),
    };

    if let Some(db) = &args.db {
        config.database.path = db.clone();
    }
    if let Some(partitions) = args.partitions {
        config.ingest.partitions = partitions;
    }
    if let Some(workers) = args.workers {
        config.ingest.workers = workers;
    }

    config.validate()?;
    Ok(config)
}

fn print_summary(report: &RunReport) {
    for day in &report.days {
        if day.is_committed() {
            info!(
                "day {}: {} inserted, {} rejected, {} errors",
                day.day,
                day.inserted,
                day.rejected(),
                day.error_count()
            );
        } else {
            warn!(
                "day {}: stopped in {:?} after {} rows, {} errors",
                day.day,
                day.phase,
                day.inserted,
                day.error_count()
            );
        }
    }

    let failed = report.failed_days().count();
    info!(
        days = report.days.len(),
        failed,
        inserted = report.inserted(),
        rejected = report.rejected(),
        "run complete, {} overall",
        rate_display(report.records_per_sec())
    );
}

fn write_report(path: &Path, report: &RunReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json)
        .with_context(|| format!("failed to write report {}", path.display()))?;
    info!("report written to {}", path.display());
    Ok(())
}
