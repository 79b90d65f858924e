//! Per-partition, per-day and per-run ingestion results.
//!
//! Errors contained inside workers are carried here instead of being lost in
//! the logs, so callers can tell a clean day from one that dropped lines.

use std::time::Duration;

use serde::{Serialize, Serializer};

use crate::error::{serialize_error, serialize_errors, IngestError};
use crate::worker::PartitionOutcome;

/// Progress of one day through the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum DayPhase {
    Scanning,
    Dispatching,
    AwaitingCompletion,
    Flushing,
    Committed,
}

#[derive(Debug, Serialize)]
pub struct PartitionReport {
    pub partition: usize,
    pub files_assigned: usize,
    pub files_read: usize,
    pub lines_seen: u64,
    /// Records decoded into the batch
    pub records: usize,
    /// Rows written by the flush; zero if the partition was never flushed
    pub inserted: usize,
    pub flushed: bool,
    #[serde(rename = "flush_ms", serialize_with = "duration_ms")]
    pub flush_elapsed: Duration,
    #[serde(serialize_with = "serialize_errors")]
    pub errors: Vec<IngestError>,
}

impl PartitionReport {
    /// Takes the errors out of `outcome`; the batch is left for the flush.
    pub fn from_outcome(outcome: &mut PartitionOutcome) -> Self {
        Self {
            partition: outcome.partition(),
            files_assigned: outcome.files_assigned,
            files_read: outcome.files_read,
            lines_seen: outcome.lines_seen,
            records: outcome.batch.len(),
            inserted: 0,
            flushed: false,
            flush_elapsed: Duration::ZERO,
            errors: std::mem::take(&mut outcome.errors),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DayReport {
    pub day: String,
    pub phase: DayPhase,
    pub files: usize,
    pub partitions: Vec<PartitionReport>,
    pub inserted: u64,
    #[serde(rename = "flush_ms", serialize_with = "duration_ms")]
    pub flush_elapsed: Duration,
    pub records_per_sec: Option<f64>,
    #[serde(serialize_with = "serialize_error")]
    pub flush_error: Option<IngestError>,
}

impl DayReport {
    pub fn new(day: impl Into<String>, files: usize) -> Self {
        Self {
            day: day.into(),
            phase: DayPhase::Scanning,
            files,
            partitions: Vec::new(),
            inserted: 0,
            flush_elapsed: Duration::ZERO,
            records_per_sec: None,
            flush_error: None,
        }
    }

    /// Records decoded across all partitions, flushed or not.
    pub fn parsed(&self) -> u64 {
        self.partitions.iter().map(|p| p.records as u64).sum()
    }

    /// Lines that failed to decode or could not be read.
    pub fn rejected(&self) -> u64 {
        self.partitions
            .iter()
            .map(|p| p.lines_seen - p.records as u64)
            .sum()
    }

    pub fn error_count(&self) -> usize {
        self.partitions.iter().map(|p| p.errors.len()).sum::<usize>()
            + usize::from(self.flush_error.is_some())
    }

    pub fn is_committed(&self) -> bool {
        self.phase == DayPhase::Committed
    }

    pub fn is_clean(&self) -> bool {
        self.is_committed() && self.error_count() == 0
    }

    /// Partition indices in the order they were flushed.
    pub fn flush_order(&self) -> Vec<usize> {
        self.partitions
            .iter()
            .filter(|p| p.flushed)
            .map(|p| p.partition)
            .collect()
    }

    pub fn errors(&self) -> impl Iterator<Item = &IngestError> {
        self.partitions
            .iter()
            .flat_map(|p| p.errors.iter())
            .chain(self.flush_error.iter())
    }
}

#[derive(Debug, Default, Serialize)]
pub struct RunReport {
    pub days: Vec<DayReport>,
}

impl RunReport {
    pub fn inserted(&self) -> u64 {
        self.days.iter().map(|d| d.inserted).sum()
    }

    pub fn rejected(&self) -> u64 {
        self.days.iter().map(DayReport::rejected).sum()
    }

    pub fn flush_elapsed(&self) -> Duration {
        self.days.iter().map(|d| d.flush_elapsed).sum()
    }

    pub fn records_per_sec(&self) -> Option<f64> {
        records_per_sec(self.inserted(), self.flush_elapsed())
    }

    pub fn failed_days(&self) -> impl Iterator<Item = &DayReport> {
        self.days.iter().filter(|d| !d.is_committed())
    }

    pub fn error_count(&self) -> usize {
        self.days.iter().map(DayReport::error_count).sum()
    }
}

/// Insert rate over the accumulated flush time; `None` when no time elapsed.
pub fn records_per_sec(records: u64, elapsed: Duration) -> Option<f64> {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        Some(records as f64 / secs)
    } else {
        None
    }
}

fn duration_ms<S>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_f64(d.as_secs_f64() * 1000.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreError;

    fn partition(index: usize, records: usize, lines: u64, flushed: bool) -> PartitionReport {
        PartitionReport {
            partition: index,
            files_assigned: 1,
            files_read: 1,
            lines_seen: lines,
            records,
            inserted: if flushed { records } else { 0 },
            flushed,
            flush_elapsed: Duration::from_millis(2),
            errors: Vec::new(),
        }
    }

    #[test]
    fn test_rate() {
        assert_eq!(records_per_sec(30, Duration::ZERO), None);
        assert_eq!(records_per_sec(500, Duration::from_millis(250)), Some(2000.0));
    }

    #[test]
    fn test_day_totals() {
        let mut day = DayReport::new("01", 3);
        day.partitions = vec![partition(0, 10, 11, true), partition(1, 5, 5, true)];
        day.inserted = 15;
        day.phase = DayPhase::Committed;

        assert_eq!(day.parsed(), 15);
        assert_eq!(day.rejected(), 1);
        assert_eq!(day.flush_order(), vec![0, 1]);
        assert!(day.is_clean());
    }

    #[test]
    fn test_flush_error_counted() {
        let mut day = DayReport::new("02", 1);
        day.phase = DayPhase::Flushing;
        day.flush_error = Some(IngestError::BatchExecution {
            partition: 0,
            source: StoreError::NoTransaction,
        });

        assert_eq!(day.error_count(), 1);
        assert!(!day.is_clean());

        let run = RunReport { days: vec![day] };
        assert_eq!(run.failed_days().count(), 1);
        assert_eq!(run.records_per_sec(), None);
    }

    #[test]
    fn test_json_shape() {
        let mut day = DayReport::new("03", 1);
        day.partitions = vec![partition(0, 1, 1, true)];
        day.flush_elapsed = Duration::from_millis(2);
        day.phase = DayPhase::Committed;

        let json = serde_json::to_value(RunReport { days: vec![day] }).unwrap();
        let d = &json["days"][0];
        assert_eq!(d["day"], "03");
        assert_eq!(d["phase"], "Committed");
        assert!((d["flush_ms"].as_f64().unwrap() - 2.0).abs() < 1e-9);
        assert_eq!(d["partitions"][0]["errors"], serde_json::json!([]));
        assert!(d["flush_error"].is_null());
    }
}
