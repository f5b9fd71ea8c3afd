//! Default outbound collaborators that report through `tracing`.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::domain::models::{IterationRecord, LedgerSummary, RunReport, TerminationReason};
use crate::domain::ports::{ProgressListener, SampleProgress, SummarySink};

/// Logs run completion, iteration commits and termination.
///
/// Per-sample progress goes out at debug level every `sample_interval`
/// samples and on the last planned one.
#[derive(Debug, Clone, Copy)]
pub struct TracingProgressListener {
    sample_interval: u64,
}

impl TracingProgressListener {
    pub fn new(sample_interval: u64) -> Self {
        Self {
            sample_interval: sample_interval.max(1),
        }
    }
}

impl Default for TracingProgressListener {
    fn default() -> Self {
        Self::new(10)
    }
}

impl ProgressListener for TracingProgressListener {
    fn on_sample(&self, progress: &SampleProgress<'_>) {
        if progress.completed % self.sample_interval == 0
            || progress.completed == u64::from(progress.planned)
        {
            debug!(
                run_id = %progress.run_id,
                kind = progress.kind.as_str(),
                completed = progress.completed,
                planned = progress.planned,
                observed_rate = progress.partial.observed_rate,
                "sampling progress"
            );
        }
    }

    fn on_run_complete(&self, report: &RunReport) {
        info!(
            run_id = %report.run_id,
            kind = report.kind.as_str(),
            state = ?report.state,
            samples = report.statistics.sample_count,
            successes = report.statistics.success_count,
            observed_rate = report.statistics.observed_rate,
            ci_lower = report.statistics.confidence_interval.lower,
            ci_upper = report.statistics.confidence_interval.upper,
            p50_ms = report.latency.p50.as_millis() as u64,
            "run report"
        );
    }

    fn on_iteration(&self, record: &IterationRecord) {
        info!(
            iteration = record.index,
            score = record.score,
            status = ?record.status,
            configuration = %record.configuration,
            "iteration"
        );
    }

    fn on_optimization_terminated(&self, reason: &TerminationReason, iterations: usize) {
        if reason.kind.is_failure() {
            warn!(iterations, reason = %reason, "optimization terminated by failure");
        } else {
            info!(iterations, reason = %reason, "optimization terminated");
        }
    }
}

/// Logs the final ledger summary.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSummarySink;

impl SummarySink for TracingSummarySink {
    fn emit(&self, summary: &LedgerSummary) {
        info!(
            label = %summary.label,
            total_elapsed_ms = summary.total_elapsed.as_millis() as u64,
            total_cost_units = summary.total_cost_units,
            total_samples = summary.total_samples,
            by_kind = ?summary.samples_by_kind,
            "budget summary"
        );
    }
}

/// Fans every callback out to several listeners, in order.
#[derive(Clone, Default)]
pub struct CompositeListener {
    listeners: Vec<Arc<dyn ProgressListener>>,
}

impl CompositeListener {
    pub fn new(listeners: Vec<Arc<dyn ProgressListener>>) -> Self {
        Self { listeners }
    }

    #[must_use]
    pub fn with(mut self, listener: Arc<dyn ProgressListener>) -> Self {
        self.listeners.push(listener);
        self
    }
}

impl ProgressListener for CompositeListener {
    fn on_sample(&self, progress: &SampleProgress<'_>) {
        self.listeners.iter().for_each(|l| l.on_sample(progress));
    }

    fn on_run_complete(&self, report: &RunReport) {
        self.listeners.iter().for_each(|l| l.on_run_complete(report));
    }

    fn on_iteration(&self, record: &IterationRecord) {
        self.listeners.iter().for_each(|l| l.on_iteration(record));
    }

    fn on_optimization_terminated(&self, reason: &TerminationReason, iterations: usize) {
        self.listeners
            .iter()
            .for_each(|l| l.on_optimization_terminated(reason, iterations));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::TerminationKind;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counting(AtomicUsize);

    impl ProgressListener for Counting {
        fn on_optimization_terminated(&self, _reason: &TerminationReason, _iterations: usize) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_composite_forwards_to_every_listener() {
        let first = Arc::new(Counting::default());
        let second = Arc::new(Counting::default());
        let composite = CompositeListener::default()
            .with(first.clone())
            .with(Arc::new(TracingProgressListener::default()))
            .with(second.clone());

        composite.on_optimization_terminated(
            &TerminationReason::new(TerminationKind::MaxIterations, "done"),
            4,
        );

        assert_eq!(first.0.load(Ordering::SeqCst), 1);
        assert_eq!(second.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_zero_interval_clamped() {
        let listener = TracingProgressListener::new(0);
        assert_eq!(listener.sample_interval, 1);
    }
}
