//! Day Ingestion Coordinator
//!
//! Drives one day at a time through
//! `Scanning → Dispatching → AwaitingCompletion → Flushing → Committed`:
//!
//! 1. Fan out one parse task per partition onto a fixed-size thread pool
//! 2. Join all of them; nothing is flushed before every partition is parsed
//! 3. Flush the collected batches on the calling thread in partition order,
//!    committing after each partition
//!
//! A failed flush rolls back, abandons the rest of that day and moves on to
//! the next one.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::time::Instant;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};
use tracing::{debug, error, info, warn};

use crate::config::IngestConfig;
use crate::error::IngestError;
use crate::manifest::DayManifest;
use crate::partition::PartitionAssignment;
use crate::report::{records_per_sec, DayPhase, DayReport, PartitionReport, RunReport};
use crate::store::TickStore;
use crate::worker::{PartitionOutcome, PartitionWorker};

pub struct DayCoordinator {
    pool: ThreadPool,
    assignment: PartitionAssignment,
}

impl DayCoordinator {
    pub fn new(config: &IngestConfig) -> Result<Self, ThreadPoolBuildError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(config.workers.max(1))
            .thread_name(|i| format!("tick-parse-{}", i))
            .build()?;

        Ok(Self {
            pool,
            assignment: PartitionAssignment::new(config.partitions),
        })
    }

    pub fn partitions(&self) -> usize {
        self.assignment.partitions()
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Ingest every day of the manifest, strictly one after another.
    pub fn run<S: TickStore + ?Sized>(&self, store: &mut S, manifest: &DayManifest) -> RunReport {
        info!(
            days = manifest.len(),
            files = manifest.total_files(),
            partitions = self.partitions(),
            workers = self.workers(),
            "starting ingestion"
        );

        let mut report = RunReport::default();
        for (day, files) in manifest.iter() {
            report.days.push(self.ingest_day(store, day, files));
        }
        report
    }

    pub fn ingest_day<S: TickStore + ?Sized>(
        &self,
        store: &mut S,
        day: &str,
        files: &[PathBuf],
    ) -> DayReport {
        self.ingest_day_with(store, day, files, |worker| worker.run())
    }

    /// `ingest_day` with the per-partition parse task supplied by the caller.
    fn ingest_day_with<S, F>(
        &self,
        store: &mut S,
        day: &str,
        files: &[PathBuf],
        task: F,
    ) -> DayReport
    where
        S: TickStore + ?Sized,
        F: Fn(&PartitionWorker<'_>) -> PartitionOutcome + Sync,
    {
        let mut report = DayReport::new(day, files.len());

        report.phase = DayPhase::Dispatching;
        debug!(day, files = files.len(), partitions = self.partitions(), "dispatching");
        let outcomes = self.parse_partitions(files, &mut report, &task);

        report.phase = DayPhase::Flushing;
        for mut outcome in outcomes {
            let mut partition = PartitionReport::from_outcome(&mut outcome);
            if report.flush_error.is_none() {
                self.flush_partition(store, &outcome, &mut partition, &mut report);
            }
            report.partitions.push(partition);
        }

        if let Some(err) = &report.flush_error {
            error!(day, "flush aborted, {} rows committed before failure: {}", report.inserted, err);
            return report;
        }

        report.phase = DayPhase::Committed;
        report.records_per_sec = records_per_sec(report.inserted, report.flush_elapsed);

        let rejected = report.rejected();
        if rejected > 0 {
            warn!(day, rejected, errors = report.error_count(), "lines dropped");
        }
        info!(
            day,
            inserted = report.inserted,
            flush_ms = report.flush_elapsed.as_millis() as u64,
            "Total speed {} {} {}",
            day,
            report.inserted,
            rate_display(report.records_per_sec)
        );
        report
    }

    /// Run every partition on the pool and wait for all of them.
    ///
    /// The result is indexed by partition. A panicking worker still yields an
    /// (empty) outcome so the join always completes.
    fn parse_partitions<F>(
        &self,
        files: &[PathBuf],
        report: &mut DayReport,
        task: &F,
    ) -> Vec<PartitionOutcome>
    where
        F: Fn(&PartitionWorker<'_>) -> PartitionOutcome + Sync,
    {
        let assignment = self.assignment;

        report.phase = DayPhase::AwaitingCompletion;
        let started = Instant::now();
        let outcomes: Vec<PartitionOutcome> = self.pool.install(|| {
            (0..assignment.partitions())
                .into_par_iter()
                .map(|partition| {
                    let worker = PartitionWorker::new(partition, assignment, files);
                    panic::catch_unwind(AssertUnwindSafe(|| task(&worker))).unwrap_or_else(
                        |payload| {
                            let message = panic_message(payload.as_ref());
                            error!(partition, "worker panicked: {}", message);
                            PartitionOutcome::panicked(partition, worker.files_assigned(), message)
                        },
                    )
                })
                .collect()
        });

        debug!(
            day = %report.day,
            parse_ms = started.elapsed().as_millis() as u64,
            records = outcomes.iter().map(|o| o.batch.len()).sum::<usize>(),
            "all partitions parsed"
        );
        outcomes
    }

    /// Execute and commit one partition's batch, timing both together.
    fn flush_partition<S: TickStore + ?Sized>(
        &self,
        store: &mut S,
        outcome: &PartitionOutcome,
        partition: &mut PartitionReport,
        report: &mut DayReport,
    ) {
        let index = partition.partition;
        info!("part {} execute batch insert start", index);

        let started = Instant::now();
        let result = store
            .execute_batch(&outcome.batch)
            .and_then(|rows| store.commit().map(|_| rows));
        let elapsed = started.elapsed();

        match result {
            Ok(rows) => {
                partition.inserted = rows;
                partition.flushed = true;
                partition.flush_elapsed = elapsed;
                report.inserted += rows as u64;
                report.flush_elapsed += elapsed;
                info!(
                    rows,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "part {} execute batch insert finish",
                    index
                );
            }
            Err(source) => {
                if let Err(e) = store.rollback() {
                    error!("rollback after failed partition {} also failed: {}", index, e);
                }
                let err = IngestError::BatchExecution {
                    partition: index,
                    source,
                };
                error!(day = %report.day, "{}", err);
                report.flush_error = Some(err);
            }
        }
    }
}

/// `"<n> records/s"`, or `"unavailable"` when no flush time was measured.
pub fn rate_display(rate: Option<f64>) -> String {
    match rate {
        Some(r) => format!("{:.0} records/s", r),
        None => "unavailable".to_string(),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
