//! Batched backfill of the channel topic-creation permission.
//!
//! Walks the id range of channels whose group is unset in fixed-size batches,
//! one transaction per batch, setting each channel to its realm's
//! `role:everyone` group. Re-running only touches rows that are still unset.

use super::error::MigrationError;
use crate::error::Error;
use crate::model::{CAN_CREATE_TOPICS_GROUP_COLUMN, STREAM_TABLE};
use crate::storage::{Streams, UnsetBounds};
use serde::Serialize;
use std::fmt;
use std::time::{Duration, Instant};

/// Default number of ids covered by one batch.
pub const DEFAULT_BATCH_SIZE: i64 = 1000;

/// Configuration for backfill execution.
#[derive(Debug, Clone)]
pub struct BackfillConfig {
    /// Width of each batch's id range.
    pub batch_size: i64,
    /// Delay between batches in milliseconds (for yielding to writes).
    pub batch_delay_ms: u64,
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            batch_delay_ms: 0,
        }
    }
}

impl BackfillConfig {
    /// Set the batch size.
    pub fn with_batch_size(mut self, batch_size: i64) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the delay between batches.
    pub fn with_batch_delay_ms(mut self, delay: u64) -> Self {
        self.batch_delay_ms = delay;
        self
    }

    /// Check the configuration before a run.
    pub fn validate(&self) -> Result<(), MigrationError> {
        if self.batch_size < 1 {
            return Err(MigrationError::InvalidConfig(format!(
                "batch size must be at least 1, got {}",
                self.batch_size
            )));
        }
        Ok(())
    }
}

/// A closed id range `[lower_bound, upper_bound]` processed as one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchRange {
    pub lower_bound: i64,
    pub upper_bound: i64,
}

impl fmt::Display for BatchRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.lower_bound, self.upper_bound)
    }
}

/// Batches covering `bounds`, starting at `min_id` and stepping by
/// `batch_size` until the lower bound passes `max_id`.
pub fn batch_ranges(bounds: UnsetBounds, batch_size: i64) -> impl Iterator<Item = BatchRange> {
    let UnsetBounds { min_id, max_id } = bounds;
    std::iter::successors(Some(min_id), move |lower| lower.checked_add(batch_size))
        .take_while(move |lower| *lower <= max_id)
        .map(move |lower_bound| BatchRange {
            lower_bound,
            upper_bound: lower_bound.saturating_add(batch_size - 1),
        })
}

/// Outcome of a backfill run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BackfillReport {
    /// Batches processed, in order.
    pub batches: Vec<BatchRange>,
    /// Rows given a value.
    pub rows_updated: u64,
    /// Rows still unset after the run (no default could be resolved).
    pub remaining_unset: u64,
    /// Wall-clock duration of the run.
    #[serde(skip)]
    pub elapsed: Duration,
}

impl BackfillReport {
    /// Whether the run found nothing to do.
    pub fn is_noop(&self) -> bool {
        self.batches.is_empty()
    }
}

/// Rows a backfill can walk and fill.
///
/// `fill_batch` must be atomic: either every eligible row in the range is
/// updated or none is.
pub trait BackfillTarget {
    /// Table being filled.
    fn table(&self) -> &str;

    /// Column being filled.
    fn column(&self) -> &str;

    /// Id bounds of the rows still unset.
    fn unset_bounds(&self) -> Result<Option<UnsetBounds>, Error>;

    /// Fill the unset rows in `batch`, returning how many were updated.
    fn fill_batch(&self, batch: BatchRange) -> Result<usize, Error>;

    /// Number of rows still unset.
    fn count_unset(&self) -> Result<u64, Error>;
}

impl BackfillTarget for Streams<'_> {
    fn table(&self) -> &str {
        STREAM_TABLE
    }

    fn column(&self) -> &str {
        CAN_CREATE_TOPICS_GROUP_COLUMN
    }

    fn unset_bounds(&self) -> Result<Option<UnsetBounds>, Error> {
        Streams::unset_bounds(self)
    }

    fn fill_batch(&self, batch: BatchRange) -> Result<usize, Error> {
        self.fill_default_group(batch.lower_bound, batch.upper_bound)
    }

    fn count_unset(&self) -> Result<u64, Error> {
        Streams::count_unset(self)
    }
}

/// Runs a backfill one batch at a time.
pub struct BackfillRunner {
    config: BackfillConfig,
}

impl BackfillRunner {
    /// Create a new backfill runner.
    pub fn new(config: BackfillConfig) -> Self {
        Self { config }
    }

    /// The runner's configuration.
    pub fn config(&self) -> &BackfillConfig {
        &self.config
    }

    /// Fill every unset row of `target`.
    ///
    /// A failing batch stops the run; batches already committed stay applied.
    pub fn run<T>(&self, target: &T) -> Result<BackfillReport, MigrationError>
    where
        T: BackfillTarget + ?Sized,
    {
        self.config.validate()?;
        let started = Instant::now();
        let mut report = BackfillReport::default();

        let Some(bounds) = target.unset_bounds()? else {
            tracing::debug!(
                table = target.table(),
                column = target.column(),
                "nothing to backfill"
            );
            return Ok(report);
        };

        for batch in batch_ranges(bounds, self.config.batch_size) {
            tracing::info!(
                table = target.table(),
                "Processing batch {} to {}",
                batch.lower_bound,
                batch.upper_bound
            );

            let updated = target.fill_batch(batch).map_err(|e| {
                tracing::error!(table = target.table(), %batch, error = %e, "backfill batch failed");
                MigrationError::BackfillFailed {
                    table: target.table().to_string(),
                    column: target.column().to_string(),
                    lower_bound: batch.lower_bound,
                    upper_bound: batch.upper_bound,
                    reason: e.to_string(),
                }
            })?;

            report.rows_updated += updated as u64;
            report.batches.push(batch);

            if self.config.batch_delay_ms > 0 && batch.upper_bound < bounds.max_id {
                std::thread::sleep(Duration::from_millis(self.config.batch_delay_ms));
            }
        }

        report.remaining_unset = target.count_unset()?;
        report.elapsed = started.elapsed();

        if report.remaining_unset > 0 {
            tracing::warn!(
                table = target.table(),
                column = target.column(),
                remaining = report.remaining_unset,
                "rows left unset: no default group could be resolved"
            );
        }
        tracing::info!(
            table = target.table(),
            batches = report.batches.len(),
            rows_updated = report.rows_updated,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "backfill complete"
        );

        Ok(report)
    }
}
