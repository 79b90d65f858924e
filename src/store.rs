//! Tick Store
//!
//! The database handle the coordinator flushes into. [`TickStore`] is the seam
//! the pipeline depends on; [`SqliteTickStore`] is the production backend.
//!
//! Key points:
//! - Autocommit is off while a batch is pending: `execute_batch` opens the
//!   transaction, `commit` or `rollback` closes it
//! - The insert statement is prepared once and served from the statement cache
//! - Parameters are bound positionally in [`TickRecord`] field order

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::types::ToSql;
use rusqlite::{Connection, OpenFlags};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::batch::BatchBuffer;
use crate::config::DatabaseConfig;
use crate::models::{TickRecord, TICK_COLUMNS};

const TICK_SCHEMA: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA temp_store = MEMORY;
PRAGMA cache_size = -64000;

CREATE TABLE IF NOT EXISTS ticks (
    market INTEGER NOT NULL,
    symbol TEXT NOT NULL,
    trade_time TEXT NOT NULL,
    latest_price REAL NOT NULL,
    trade_num INTEGER NOT NULL,
    trade_amount REAL NOT NULL,
    trade_volume REAL NOT NULL,
    bs INTEGER NOT NULL,
    b1p REAL NOT NULL, b2p REAL NOT NULL, b3p REAL NOT NULL, b4p REAL NOT NULL, b5p REAL NOT NULL,
    s1p REAL NOT NULL, s2p REAL NOT NULL, s3p REAL NOT NULL, s4p REAL NOT NULL, s5p REAL NOT NULL,
    b1v REAL NOT NULL, b2v REAL NOT NULL, b3v REAL NOT NULL, b4v REAL NOT NULL, b5v REAL NOT NULL,
    s1v REAL NOT NULL, s2v REAL NOT NULL, s3v REAL NOT NULL, s4v REAL NOT NULL, s5v REAL NOT NULL
);
"#;

/// Column list and positional parameters match [`TickRecord`] field order.
pub const INSERT_TICK_SQL: &str = r#"
INSERT INTO ticks (
    market, symbol, trade_time, latest_price, trade_num, trade_amount, trade_volume, bs,
    b1p, b2p, b3p, b4p, b5p, s1p, s2p, s3p, s4p, s5p,
    b1v, b2v, b3v, b4v, b5v, s1v, s2v, s3v, s4v, s5v
) VALUES (
    ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8,
    ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18,
    ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28
)
"#;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error("failed to create {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("batch wrote {written} of {expected} rows")]
    ShortWrite { expected: usize, written: usize },

    #[error("commit without an open transaction")]
    NoTransaction,
}

/// Database handle used by the day coordinator.
///
/// Only the coordinator thread calls into a store, so implementations need
/// not be `Sync`.
pub trait TickStore {
    /// Insert every record of `batch` inside the current transaction, opening
    /// one if needed. Returns the number of rows written.
    fn execute_batch(&mut self, batch: &BatchBuffer) -> Result<usize, StoreError>;

    fn commit(&mut self) -> Result<(), StoreError>;

    /// Discard the open transaction, if any.
    fn rollback(&mut self) -> Result<(), StoreError>;

    fn close(self) -> Result<(), StoreError>
    where
        Self: Sized;
}

/// Counters kept by [`SqliteTickStore`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub batches: u64,
    pub rows_written: u64,
    pub commits: u64,
    pub rollbacks: u64,
}

/// Row count and time range of one trading day in the `ticks` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DaySummary {
    pub day: String,
    pub rows: i64,
    pub symbols: i64,
    pub first_trade: Option<String>,
    pub last_trade: Option<String>,
}

pub struct SqliteTickStore {
    conn: Connection,
    in_transaction: bool,
    stats: StoreStats,
}

impl SqliteTickStore {
    /// Open or create the database and make sure the `ticks` table exists.
    pub fn open(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let path = config.path.as_path();
        if let Some(parent) = path.parent() {
            if !parent.exists() && !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|source| StoreError::CreateDir {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(path, flags)?;
        let store = Self::init(conn, config)?;

        let journal_mode: String = store
            .conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))?;
        if !journal_mode.eq_ignore_ascii_case("wal") {
            warn!("WAL mode not active, journal_mode = {}", journal_mode);
        }

        info!("tick store opened at {}", path.display());
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?, &DatabaseConfig::default())
    }

    /// Open an existing database for inspection only.
    pub fn open_read_only(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        Ok(Self {
            conn,
            in_transaction: false,
            stats: StoreStats::default(),
        })
    }

    fn init(conn: Connection, config: &DatabaseConfig) -> Result<Self, StoreError> {
        conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
        conn.execute_batch(TICK_SCHEMA)?;
        conn.pragma_update(None, "synchronous", config.synchronous.as_str())?;

        Ok(Self {
            conn,
            in_transaction: false,
            stats: StoreStats::default(),
        })
    }

    pub fn stats(&self) -> StoreStats {
        self.stats
    }

    pub fn count_rows(&self) -> Result<i64, StoreError> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM ticks", [], |row| row.get(0))?)
    }

    /// Per-day row counts, ascending by day.
    pub fn day_summaries(&self) -> Result<Vec<DaySummary>, StoreError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT substr(trade_time, 1, 10) AS day,
                   COUNT(*), COUNT(DISTINCT symbol), MIN(trade_time), MAX(trade_time)
            FROM ticks
            GROUP BY day
            ORDER BY day ASC
            "#,
        )?;

        let days = stmt
            .query_map([], |row| {
                Ok(DaySummary {
                    day: row.get(0)?,
                    rows: row.get(1)?,
                    symbols: row.get(2)?,
                    first_trade: row.get(3)?,
                    last_trade: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(days)
    }

    fn begin(&mut self) -> Result<(), StoreError> {
        if !self.in_transaction {
            self.conn.execute_batch("BEGIN IMMEDIATE")?;
            self.in_transaction = true;
        }
        Ok(())
    }
}

impl TickStore for SqliteTickStore {
    fn execute_batch(&mut self, batch: &BatchBuffer) -> Result<usize, StoreError> {
        self.begin()?;

        let mut stmt = self.conn.prepare_cached(INSERT_TICK_SQL)?;
        let mut written = 0usize;
        for tick in batch {
            written += bind_and_execute(&mut stmt, tick)?;
        }
        drop(stmt);

        self.stats.batches += 1;
        self.stats.rows_written += written as u64;
        debug!(partition = batch.partition(), rows = written, "batch executed");

        if written != batch.len() {
            return Err(StoreError::ShortWrite {
                expected: batch.len(),
                written,
            });
        }
        Ok(written)
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        if !self.in_transaction {
            return Err(StoreError::NoTransaction);
        }
        self.conn.execute_batch("COMMIT")?;
        self.in_transaction = false;
        self.stats.commits += 1;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), StoreError> {
        if self.in_transaction {
            self.conn.execute_batch("ROLLBACK")?;
            self.in_transaction = false;
            self.stats.rollbacks += 1;
        }
        Ok(())
    }

    fn close(mut self) -> Result<(), StoreError> {
        self.rollback()?;
        self.conn.close().map_err(|(_, e)| StoreError::Sqlite(e))
    }
}

fn bind_and_execute(stmt: &mut rusqlite::CachedStatement<'_>, tick: &TickRecord) -> Result<usize, StoreError> {
    let market = tick.market.db_code();
    let side = tick.side.db_code();

    let mut values: Vec<&dyn ToSql> = Vec::with_capacity(TICK_COLUMNS);
    values.push(&market);
    values.push(&tick.symbol);
    values.push(&tick.trade_time);
    values.push(&tick.latest_price);
    values.push(&tick.trade_count);
    values.push(&tick.trade_amount);
    values.push(&tick.trade_volume);
    values.push(&side);
    values.extend(tick.depth.values().map(|v| v as &dyn ToSql));

    Ok(stmt.execute(values.as_slice())?)
}
