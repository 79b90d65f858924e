//! Tick Database Inspection Tool
//!
//! Checks what a load actually left in the `ticks` table.
//!
//! Usage:
//!   cargo run --release --bin tick_inspect -- --db ./ticks.db days
//!   cargo run --release --bin tick_inspect -- --db ./ticks.db days --json
//!   cargo run --release --bin tick_inspect -- --db ./ticks.db count

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use tick_loader::store::DaySummary;
use tick_loader::SqliteTickStore;

#[derive(Parser, Debug)]
#[command(name = "tick_inspect")]
#[command(about = "Inspect tick rows loaded by tick_loader")]
struct Cli {
    /// Path to the SQLite database
    #[arg(long, env = "TICK_DB_PATH")]
    db: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Rows, symbols and time range per trading day
    Days {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Total row count
    Count,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let store = SqliteTickStore::open_read_only(&cli.db)
        .with_context(|| format!("Failed to open database: {:?}", cli.db))?;

    match cli.command {
        Commands::Days { json } => {
            let days = store.day_summaries()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&days)?);
            } else {
                print_days(&cli.db, &days);
            }
        }
        Commands::Count => {
            println!("{}", store.count_rows()?);
        }
    }

    Ok(())
}

fn print_days(db: &Path, days: &[DaySummary]) {
    println!("Database: {:?}", db);
    println!();

    if days.is_empty() {
        println!("⚠ No ticks loaded yet.");
        return;
    }

    println!(
        "{:<12} {:>12} {:>8}  {:<19}  {:<19}",
        "day", "rows", "symbols", "first", "last"
    );
    let mut total = 0i64;
    for d in days {
        total += d.rows;
        println!(
            "{:<12} {:>12} {:>8}  {:<19}  {:<19}",
            d.day,
            d.rows,
            d.symbols,
            d.first_trade.as_deref().unwrap_or("-"),
            d.last_trade.as_deref().unwrap_or("-")
        );
    }
    println!();
    println!("Total rows: {} across {} days", total, days.len());
}
