// src/pipeline/collector.rs

//! Single owner of the harvest aggregate.
//!
//! Workers never touch the aggregate directly. Each finished record arrives
//! here as a [`Completion`] over a channel, in completion order; the collector
//! appends its rows, counts it and decides when to persist a snapshot.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::error::{AppError, Result};
use crate::models::{OutputRow, RecordReference};
use crate::storage::RowStorage;

/// Result of harvesting one record.
#[derive(Debug)]
pub struct Completion {
    pub reference: RecordReference,
    pub outcome: Result<Vec<OutputRow>>,
}

/// Counts reported once the collector is finalized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectorReport {
    /// Records whose rows were accepted
    pub records_completed: usize,
    /// Records excluded because their harvest failed
    pub records_failed: usize,
    /// Rows accepted during this run
    pub rows_produced: usize,
    /// Rows in the final snapshot
    pub rows_persisted: usize,
}

/// Aggregates worker results and persists snapshots.
pub struct Collector {
    storage: Arc<dyn RowStorage>,
    rows: Vec<OutputRow>,
    persist_every: usize,
    report: CollectorReport,
}

impl Collector {
    /// Create a collector seeded with rows carried over from the checkpoint.
    pub fn new(storage: Arc<dyn RowStorage>, seed_rows: Vec<OutputRow>, persist_every: usize) -> Self {
        Self {
            storage,
            rows: seed_rows,
            persist_every: persist_every.max(1),
            report: CollectorReport::default(),
        }
    }

    /// Rows aggregated so far.
    pub fn rows(&self) -> &[OutputRow] {
        &self.rows
    }

    pub fn records_completed(&self) -> usize {
        self.report.records_completed
    }

    /// Accept one completion; persists on every `persist_every`-th success.
    ///
    /// Failed records are logged and excluded. A failed periodic write is
    /// logged and left for the next persistence event.
    pub async fn accept(&mut self, completion: Completion) {
        let name = completion.reference.display_name;
        let rows = match completion.outcome {
            Ok(rows) => rows,
            Err(e) => {
                self.report.records_failed += 1;
                log::error!("Error processing {name}: {e}");
                return;
            }
        };

        self.report.rows_produced += rows.len();
        self.report.records_completed += 1;
        self.rows.extend(rows);
        log::info!(
            "Completed {name} ({} records, {} rows)",
            self.report.records_completed,
            self.rows.len()
        );

        if self.report.records_completed % self.persist_every == 0 {
            match self.storage.write_snapshot(&self.rows).await {
                Ok(()) => log::info!(
                    "Partial progress saved after processing {} records.",
                    self.report.records_completed
                ),
                Err(e) => log::warn!(
                    "Partial save after {} records failed: {e}",
                    self.report.records_completed
                ),
            }
        }
    }

    /// Drain completions until every sender is dropped.
    pub async fn run(mut self, mut rx: mpsc::Receiver<Completion>) -> Self {
        while let Some(completion) = rx.recv().await {
            self.accept(completion).await;
        }
        self
    }

    /// Persist the full aggregate once more, regardless of the interval.
    pub async fn finalize(mut self) -> Result<(Vec<OutputRow>, CollectorReport)> {
        self.storage
            .write_snapshot(&self.rows)
            .await
            .map_err(|e| AppError::harvest("final snapshot", e))?;
        self.report.rows_persisted = self.rows.len();
        Ok((self.rows, self.report))
    }
}
