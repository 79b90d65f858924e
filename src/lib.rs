//! Tick Loader Library
//!
//! Bulk-loads per-symbol, per-day market tick CSV files into the `ticks`
//! table. The binaries are thin wrappers around [`DayManifest`],
//! [`DayCoordinator`] and [`SqliteTickStore`].

pub mod batch;
pub mod config;
pub mod coordinator;
pub mod decoder;
pub mod error;
pub mod manifest;
pub mod models;
pub mod partition;
pub mod report;
pub mod store;
pub mod worker;

pub use batch::BatchBuffer;
pub use config::{DatabaseConfig, IngestConfig, LoaderConfig, TargetMonth};
pub use coordinator::DayCoordinator;
pub use decoder::{decode_line, decode_record, DecodeError};
pub use error::IngestError;
pub use manifest::DayManifest;
pub use models::{DepthSnapshot, Market, Side, TickRecord};
pub use partition::PartitionAssignment;
pub use report::{DayPhase, DayReport, PartitionReport, RunReport};
pub use store::{SqliteTickStore, StoreError, StoreStats, TickStore};
pub use worker::{PartitionOutcome, PartitionWorker};
