//! Optimization history.
//!
//! [`HistoryLog`] is the append-only log the optimization loop writes to. A
//! reporter holding a clone of the log's `Arc` can take a
//! [`HistorySnapshot`] at any time and gets a consistent prefix; the write
//! lock is only held long enough to push one `Arc`.
//!
//! Once the loop ends the log is frozen into an [`OptimizationHistory`],
//! which adds the termination reason.
//!
//! The best iteration is never cached. Every query scans the records.

use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::models::{IterationRecord, IterationStatus, Objective, TerminationReason};

/// Best iteration under `objective`.
///
/// Records without a finite score are skipped. Ties go to the earliest
/// index.
pub fn select_best(
    records: &[Arc<IterationRecord>],
    objective: Objective,
) -> Option<&Arc<IterationRecord>> {
    let mut best: Option<(&Arc<IterationRecord>, f64)> = None;
    for record in records {
        let Some(score) = record.rankable_score() else {
            continue;
        };
        match best {
            Some((_, incumbent)) if !objective.is_better(score, incumbent) => {}
            _ => best = Some((record, score)),
        }
    }
    best.map(|(record, _)| record)
}

// ============================================================================
// HistoryLog
// ============================================================================

/// Append-only iteration log shared between the loop and reporters.
#[derive(Debug, Default)]
pub struct HistoryLog {
    records: RwLock<Vec<Arc<IterationRecord>>>,
}

impl HistoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commit a record. Returns the shared handle now stored in the log.
    pub fn append(&self, record: IterationRecord) -> Arc<IterationRecord> {
        let record = Arc::new(record);
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
        record
    }

    pub fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Consistent copy of everything committed so far.
    pub fn snapshot(&self, objective: Objective) -> HistorySnapshot {
        let records = self
            .records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        HistorySnapshot { objective, records }
    }
}

/// Point-in-time view of a running optimization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistorySnapshot {
    pub objective: Objective,
    pub records: Vec<Arc<IterationRecord>>,
}

impl HistorySnapshot {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn best_iteration(&self) -> Option<&Arc<IterationRecord>> {
        select_best(&self.records, self.objective)
    }
}

// ============================================================================
// OptimizationHistory
// ============================================================================

/// Frozen record of a finished optimization loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationHistory {
    pub objective: Objective,
    pub records: Vec<Arc<IterationRecord>>,
    /// Why the loop ended.
    pub termination: TerminationReason,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl OptimizationHistory {
    pub fn new(
        snapshot: HistorySnapshot,
        termination: TerminationReason,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            objective: snapshot.objective,
            records: snapshot.records,
            termination,
            started_at,
            completed_at: Utc::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn best_iteration(&self) -> Option<&Arc<IterationRecord>> {
        select_best(&self.records, self.objective)
    }

    pub fn last(&self) -> Option<&Arc<IterationRecord>> {
        self.records.last()
    }

    /// Status of the final iteration.
    pub fn terminal_status(&self) -> Option<IterationStatus> {
        self.last().map(|r| r.status)
    }

    /// Scores in iteration order; `None` where scoring failed.
    pub fn scores(&self) -> Vec<Option<f64>> {
        self.records.iter().map(|r| r.score).collect()
    }
}
