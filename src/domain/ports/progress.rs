use uuid::Uuid;

use crate::domain::models::{
    IterationRecord, LedgerSummary, RunKind, RunReport, Statistics, TerminationReason,
};

/// Partial progress of a run after one sample joined the ordered frontier.
#[derive(Debug, Clone)]
pub struct SampleProgress<'a> {
    pub run_id: Uuid,
    pub kind: RunKind,
    /// Measured samples folded so far (contiguous from index 0).
    pub completed: u64,
    pub planned: u32,
    pub partial: &'a Statistics,
}

/// Outbound progress callbacks for real-time reporting.
///
/// Every method defaults to a no-op so listeners implement only what they
/// need. Called from the orchestrating task, never from inside a worker.
pub trait ProgressListener: Send + Sync {
    fn on_sample(&self, _progress: &SampleProgress<'_>) {}

    fn on_run_complete(&self, _report: &RunReport) {}

    fn on_iteration(&self, _record: &IterationRecord) {}

    fn on_optimization_terminated(&self, _reason: &TerminationReason, _iterations: usize) {}
}

/// Listener that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProgress;

impl ProgressListener for NoopProgress {}

/// Receives the final ledger summary when the root scope closes.
pub trait SummarySink: Send + Sync {
    fn emit(&self, summary: &LedgerSummary);
}
