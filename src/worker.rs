//! Partitioned Ingestion Worker
//!
//! Reads the files of one partition for one day and decodes them into a
//! private [`BatchBuffer`]. Failures never escape the worker: a bad line is
//! skipped, an unreadable file is abandoned, and both are recorded in the
//! returned [`PartitionOutcome`].

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use csv::{ByteRecord, StringRecord};
use tracing::{debug, warn};

use crate::batch::BatchBuffer;
use crate::decoder::{decode_record, DecodeError};
use crate::error::IngestError;
use crate::partition::PartitionAssignment;

/// Everything a worker produced for its partition.
#[derive(Debug)]
pub struct PartitionOutcome {
    pub batch: BatchBuffer,
    pub files_assigned: usize,
    pub files_read: usize,
    pub lines_seen: u64,
    pub errors: Vec<IngestError>,
}

impl PartitionOutcome {
    fn empty(partition: usize) -> Self {
        Self {
            batch: BatchBuffer::new(partition),
            files_assigned: 0,
            files_read: 0,
            lines_seen: 0,
            errors: Vec::new(),
        }
    }

    /// Outcome for a worker that panicked before returning.
    pub fn panicked(partition: usize, files_assigned: usize, message: String) -> Self {
        let mut outcome = Self::empty(partition);
        outcome.files_assigned = files_assigned;
        outcome.errors.push(IngestError::WorkerPanicked { partition, message });
        outcome
    }

    pub fn partition(&self) -> usize {
        self.batch.partition()
    }

    /// Lines that were seen but did not make it into the batch.
    pub fn rejected(&self) -> u64 {
        self.lines_seen - self.batch.len() as u64
    }
}

pub struct PartitionWorker<'a> {
    partition: usize,
    assignment: PartitionAssignment,
    files: &'a [PathBuf],
}

impl<'a> PartitionWorker<'a> {
    pub fn new(partition: usize, assignment: PartitionAssignment, files: &'a [PathBuf]) -> Self {
        Self {
            partition,
            assignment,
            files,
        }
    }

    pub fn partition(&self) -> usize {
        self.partition
    }

    pub fn files_assigned(&self) -> usize {
        self.assignment.share_of(self.files.len(), self.partition)
    }

    pub fn run(&self) -> PartitionOutcome {
        let mut outcome = PartitionOutcome::empty(self.partition);

        for path in self.assignment.files_for(self.files, self.partition) {
            outcome.files_assigned += 1;
            match self.read_file(path, &mut outcome) {
                Ok(lines) => {
                    outcome.files_read += 1;
                    debug!(partition = self.partition, lines, "read {}", path.display());
                }
                Err(e) => {
                    warn!(partition = self.partition, "{}", e);
                    outcome.errors.push(e);
                }
            }
        }

        outcome
    }

    /// Decode one file into the batch. Returns the number of data lines seen.
    ///
    /// Line 1 is the header and is dropped unread. Every later physical line
    /// counts, blank ones included. Malformed lines are recorded and skipped;
    /// an error return means the rest of the file was abandoned.
    fn read_file(&self, path: &Path, outcome: &mut PartitionOutcome) -> Result<u64, IngestError> {
        let file = File::open(path).map_err(|source| IngestError::FileOpen {
            path: path.to_path_buf(),
            source,
        })?;
        let read_err = |source| IngestError::FileRead {
            path: path.to_path_buf(),
            source,
        };

        let mut reader = BufReader::new(file);
        let mut buf = Vec::with_capacity(512);
        if reader.read_until(b'\n', &mut buf).map_err(read_err)? == 0 {
            return Ok(0);
        }

        let mut line_no = 1u64;
        let mut lines = 0u64;
        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf).map_err(read_err)? == 0 {
                break;
            }
            line_no += 1;
            lines += 1;
            outcome.lines_seen += 1;

            let decoded = split_line(&buf).and_then(|record| decode_record(&record));
            match decoded {
                Ok(tick) => outcome.batch.push(tick),
                Err(reason) => self.reject(path, line_no, reason, outcome),
            }
        }

        Ok(lines)
    }

    fn reject(&self, path: &Path, line: u64, reason: DecodeError, outcome: &mut PartitionOutcome) {
        let err = IngestError::MalformedRecord {
            file: path.to_path_buf(),
            line,
            reason,
        };
        warn!(partition = self.partition, "{}", err);
        outcome.errors.push(err);
    }
}

/// Split one raw line on commas. Quoting is not supported by the format.
fn split_line(raw: &[u8]) -> Result<StringRecord, DecodeError> {
    let mut line = raw;
    while let [rest @ .., b'\n' | b'\r'] = line {
        line = rest;
    }
    let fields: ByteRecord = line.split(|b| *b == b',').collect();
    StringRecord::from_byte_record(fields).map_err(|e| DecodeError::Encoding {
        column: e.utf8_error().field(),
    })
}
