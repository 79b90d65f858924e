//! Pipeline error taxonomy, and how errors appear in JSON reports.

use std::io;
use std::path::PathBuf;

use serde::Serializer;
use thiserror::Error;

use crate::decoder::DecodeError;
use crate::store::StoreError;

/// Failures of the ingestion pipeline.
///
/// `DirectoryNotFound` and `Connection` end the run. Everything else is
/// contained at the line, file, partition or day it happened in and surfaces
/// through the reports.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    #[error("failed to list {}: {source}", path.display())]
    Scan {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{}:{line}: malformed record: {reason}", file.display())]
    MalformedRecord {
        file: PathBuf,
        line: u64,
        #[source]
        reason: DecodeError,
    },

    #[error("failed to open {}: {source}", path.display())]
    FileOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed reading {}: {source}", path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("partition {partition}: batch execution failed: {source}")]
    BatchExecution {
        partition: usize,
        #[source]
        source: StoreError,
    },

    #[error("database connection failed: {0}")]
    Connection(#[source] StoreError),

    #[error("partition {partition}: worker panicked: {message}")]
    WorkerPanicked { partition: usize, message: String },
}

impl IngestError {
    /// Errors that abort the whole run rather than one line, file or day.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::DirectoryNotFound(_) | Self::Connection(_))
    }
}

/// Serialize errors as their display strings in JSON reports.
pub(crate) fn serialize_errors<S>(errors: &[IngestError], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_seq(errors.iter().map(|e| e.to_string()))
}

pub(crate) fn serialize_error<S>(error: &Option<IngestError>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match error {
        Some(e) => serializer.serialize_some(&e.to_string()),
        None => serializer.serialize_none(),
    }
}
