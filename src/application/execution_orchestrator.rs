//! ExecutionOrchestrator - drives one sampling run
//!
//! A run moves through `Idle -> WarmingUp -> Sampling` and ends in
//! `Completed`, `BudgetExhausted` or `TerminatedEarly`:
//! - Warmup samples run with the same mechanics as measured ones but are
//!   never aggregated
//! - Samples are dispatched in index order, one pacing slot at a time, to at
//!   most `concurrency` workers
//! - Results are joined back into index order through a bounded reorder
//!   buffer before they reach the aggregator
//! - The ledger is checked right before every dispatch; exhaustion stops
//!   dispatching and detaches whatever is still in flight
//!
//! Probe failures never surface as errors. Only an invalid policy does, and
//! it is rejected before anything runs.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::errors::EngineResult;
use crate::domain::models::{
    EarlyStop, EarlyTermination, ExecutionPolicy, FactorSuite, Outcome, RunKind, RunReport,
    RunState, ScopeCeilings, ScopeLevel,
};
use crate::domain::ports::{
    NoopProgress, Probe, ProgressListener, SampleContext, SampleProgress, SuccessCriterion,
};
use crate::services::aggregator::Aggregator;
use crate::services::budget_ledger::{ScopeHandle, ScopeSpec};
use crate::services::pacing::{Pacer, PacingController};
use crate::services::reorder_buffer::ReorderBuffer;
use crate::services::sample_executor::SampleExecutor;
use crate::services::verdict::check_early_stop;

/// A finished sample on its way back to the dispatcher. The worker's permit
/// travels with it and is released only once the result has been joined, so
/// at most `concurrency` samples are ever unjoined.
struct Completion {
    index: usize,
    outcome: Outcome,
    _permit: OwnedSemaphorePermit,
}

/// Why a batch stopped before dispatching everything.
#[derive(Debug)]
enum Interruption {
    Exhausted(String),
    EarlyStop(EarlyStop),
}

#[derive(Debug, Default)]
struct BatchResult {
    dispatched: u64,
    joined: u64,
    interruption: Option<Interruption>,
}

/// Measured-sample bookkeeping for the sampling phase.
struct Sampling<'a> {
    run_id: Uuid,
    kind: RunKind,
    planned: u32,
    early: Option<EarlyTermination>,
    aggregator: Aggregator,
    listener: &'a dyn ProgressListener,
}

impl Sampling<'_> {
    /// Fold one outcome released at the join frontier.
    fn join(&mut self, outcome: &Outcome, check_early: bool) -> Option<EarlyStop> {
        self.aggregator.push(outcome);
        let completed = self.aggregator.sample_count();
        let partial = self.aggregator.snapshot();
        self.listener.on_sample(&SampleProgress {
            run_id: self.run_id,
            kind: self.kind,
            completed,
            planned: self.planned,
            partial: &partial,
        });

        if !check_early || completed >= u64::from(self.planned) {
            return None;
        }
        self.early.as_ref().and_then(|early| {
            check_early_stop(
                self.aggregator.success_count(),
                completed,
                self.planned,
                early,
            )
        })
    }
}

/// Runs sampling batches against one probe.
pub struct ExecutionOrchestrator {
    executor: SampleExecutor,
    listener: Arc<dyn ProgressListener>,
}

impl ExecutionOrchestrator {
    pub fn new(probe: Arc<dyn Probe>, criterion: Arc<dyn SuccessCriterion>) -> Self {
        Self {
            executor: SampleExecutor::new(probe, criterion),
            listener: Arc::new(NoopProgress),
        }
    }

    /// Attach a progress listener.
    pub fn with_listener(mut self, listener: Arc<dyn ProgressListener>) -> Self {
        self.listener = listener;
        self
    }

    /// Execute one run under `policy`.
    ///
    /// A method-level scope carrying the policy's ceilings is reserved under
    /// `parent` for the run, so the parent's (and every ancestor's) ceilings
    /// apply as well.
    ///
    /// # Errors
    /// Returns `EngineError::InvalidPolicy` before any sample runs when the
    /// policy is invalid.
    pub async fn run(
        &self,
        policy: &ExecutionPolicy,
        configuration: Arc<FactorSuite>,
        parent: &ScopeHandle,
        kind: RunKind,
    ) -> EngineResult<RunReport> {
        policy.validate()?;

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let mut state = RunState::Idle;

        let ceilings = ScopeCeilings {
            time: policy.time_budget,
            cost: policy.cost_budget,
        };
        let scope = parent.reserve_child(
            ScopeSpec::new(ScopeLevel::Method, format!("{}-{run_id}", kind.as_str()))
                .with_ceilings(ceilings)
                .with_run_kind(kind),
        );

        let plan = PacingController::plan(policy, policy.warmup.saturating_add(policy.samples));
        let pacer = plan.pacer();

        info!(
            %run_id,
            kind = kind.as_str(),
            samples = policy.samples,
            warmup = policy.warmup,
            concurrency = policy.concurrency,
            configuration = %configuration,
            "run started"
        );

        let mut exhaustion_reason = None;
        let mut warmup_executed = 0;

        if policy.warmup > 0 {
            transition(run_id, &mut state, RunState::WarmingUp);
            let batch = self
                .dispatch_batch(
                    policy.warmup,
                    true,
                    run_id,
                    &configuration,
                    &scope,
                    &pacer,
                    policy.concurrency,
                    None,
                )
                .await;
            warmup_executed = u32::try_from(batch.dispatched).unwrap_or(u32::MAX);
            if let Some(Interruption::Exhausted(reason)) = batch.interruption {
                exhaustion_reason = Some(reason);
            }
        }

        let mut sampling = Sampling {
            run_id,
            kind,
            planned: policy.samples,
            early: policy.early_termination,
            aggregator: Aggregator::new(policy.confidence_level, policy.sidedness),
            listener: self.listener.as_ref(),
        };
        let mut early_stop = None;
        let mut batch = BatchResult::default();

        if exhaustion_reason.is_none() {
            transition(run_id, &mut state, RunState::Sampling);
            batch = self
                .dispatch_batch(
                    policy.samples,
                    false,
                    run_id,
                    &configuration,
                    &scope,
                    &pacer,
                    policy.concurrency,
                    Some(&mut sampling),
                )
                .await;
            match batch.interruption.take() {
                Some(Interruption::Exhausted(reason)) => exhaustion_reason = Some(reason),
                Some(Interruption::EarlyStop(stop)) => early_stop = Some(stop),
                None => {}
            }
        }

        let final_state = if exhaustion_reason.is_some() {
            RunState::BudgetExhausted
        } else if early_stop.is_some() {
            RunState::TerminatedEarly
        } else {
            RunState::Completed
        };
        transition(run_id, &mut state, final_state);

        if let Some(reason) = &exhaustion_reason {
            warn!(%run_id, reason = %reason, "run stopped on budget exhaustion");
        }
        if let Some(stop) = early_stop {
            info!(%run_id, early_stop = ?stop, "run terminated early");
        }

        let report = RunReport {
            run_id,
            kind,
            configuration,
            statistics: sampling.aggregator.snapshot(),
            latency: sampling.aggregator.latency(),
            state,
            planned_samples: policy.samples,
            dispatched_samples: batch.dispatched,
            abandoned_samples: batch.dispatched.saturating_sub(batch.joined),
            warmup_executed,
            early_stop,
            exhaustion_reason,
            feasibility_warning: plan.feasibility.map(|w| w.to_string()),
            started_at,
            completed_at: Utc::now(),
        };

        scope.close();

        info!(
            %run_id,
            state = ?report.state,
            samples = report.statistics.sample_count,
            successes = report.statistics.success_count,
            observed_rate = report.statistics.observed_rate,
            abandoned = report.abandoned_samples,
            "run finished"
        );
        self.listener.on_run_complete(&report);

        Ok(report)
    }

    /// Dispatch `count` samples and join their results in index order.
    #[allow(clippy::too_many_arguments)]
    async fn dispatch_batch(
        &self,
        count: u32,
        warmup: bool,
        run_id: Uuid,
        configuration: &Arc<FactorSuite>,
        scope: &ScopeHandle,
        pacer: &Pacer,
        concurrency: usize,
        mut sampling: Option<&mut Sampling<'_>>,
    ) -> BatchResult {
        // Never more workers than samples in the batch.
        let workers = concurrency.min(count as usize).max(1);
        let semaphore = Arc::new(Semaphore::new(workers));
        let (tx, mut rx) = mpsc::unbounded_channel::<Completion>();
        let mut buffer = ReorderBuffer::new(workers);
        let mut result = BatchResult::default();

        'dispatch: for index in 0..count as usize {
            // Wait for a free worker, joining completions meanwhile.
            let permit = loop {
                tokio::select! {
                    biased;
                    Some(completion) = rx.recv() => {
                        let stop =
                            accept(completion, &mut buffer, &mut result, sampling.as_deref_mut());
                        if let Some(stop) = stop {
                            result.interruption = Some(Interruption::EarlyStop(stop));
                            break 'dispatch;
                        }
                    }
                    permit = semaphore.clone().acquire_owned() => match permit {
                        Ok(permit) => break permit,
                        Err(_) => break 'dispatch,
                    },
                }
            };

            pacer.wait().await;

            while let Ok(completion) = rx.try_recv() {
                let stop = accept(completion, &mut buffer, &mut result, sampling.as_deref_mut());
                if let Some(stop) = stop {
                    result.interruption = Some(Interruption::EarlyStop(stop));
                    break 'dispatch;
                }
            }

            if let Some(reason) = scope.exhaustion_reason() {
                debug!(%run_id, index, warmup, "budget exhausted before dispatch");
                result.interruption = Some(Interruption::Exhausted(reason));
                break;
            }

            let ctx = SampleContext {
                run_id,
                index,
                warmup,
                configuration: configuration.clone(),
            };
            let executor = self.executor.clone();
            let scope = scope.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let outcome = executor.execute(&ctx, &scope).await;
                // Fails only when the run already stopped; the result is discarded.
                let _ = tx.send(Completion {
                    index,
                    outcome,
                    _permit: permit,
                });
            });
            result.dispatched += 1;
        }

        drop(tx);

        let exhausted = match &result.interruption {
            None => None,
            Some(Interruption::Exhausted(_)) => Some(true),
            Some(Interruption::EarlyStop(_)) => Some(false),
        };
        match exhausted {
            None => {
                while let Some(completion) = rx.recv().await {
                    let stop =
                        accept(completion, &mut buffer, &mut result, sampling.as_deref_mut());
                    if let Some(stop) = stop {
                        result.interruption = Some(Interruption::EarlyStop(stop));
                        break;
                    }
                }
            }
            Some(true) => {
                // Keep what already finished; anything still running is detached.
                while let Ok(completion) = rx.try_recv() {
                    if let Err(late) = buffer.insert(completion.index, completion) {
                        debug!(%run_id, index = late.index, "late result outside join window");
                    }
                }
                for (_, completion) in buffer.drain_all() {
                    result.joined += 1;
                    if let Some(sampling) = sampling.as_deref_mut() {
                        sampling.join(&completion.outcome, false);
                    }
                }
            }
            Some(false) => {
                // Finished past the stopping point: joined, never folded.
                while rx.try_recv().is_ok() {
                    result.joined += 1;
                }
                result.joined += buffer.pending() as u64;
            }
        }

        result
    }
}

/// Buffer a completion and join everything now contiguous with the frontier.
fn accept(
    completion: Completion,
    buffer: &mut ReorderBuffer<Completion>,
    result: &mut BatchResult,
    mut sampling: Option<&mut Sampling<'_>>,
) -> Option<EarlyStop> {
    if let Err(rejected) = buffer.insert(completion.index, completion) {
        debug!(index = rejected.index, "completion outside join window");
        return None;
    }
    let ready = buffer.drain_ready();
    // Everything released here has finished, whether or not it gets folded.
    result.joined += ready.len() as u64;
    for (_, completion) in ready {
        if let Some(sampling) = sampling.as_deref_mut() {
            if let Some(stop) = sampling.join(&completion.outcome, true) {
                return Some(stop);
            }
        }
    }
    None
}

fn transition(run_id: Uuid, state: &mut RunState, next: RunState) {
    debug!(%run_id, from = ?*state, to = ?next, "run state transition");
    *state = next;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::{EngineError, PolicyError};
    use crate::domain::models::{CapturedFailure, IntervalSidedness};
    use crate::domain::ports::{CompletesWithoutError, FnProbe, ProbeOutput};
    use crate::services::budget_ledger::BudgetLedger;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    fn always_ok() -> ExecutionOrchestrator {
        ExecutionOrchestrator::new(
            Arc::new(FnProbe::new(|_| async { Ok(ProbeOutput::new(true)) })),
            Arc::new(CompletesWithoutError),
        )
    }

    #[tokio::test]
    async fn test_invalid_policy_rejected_before_dispatch() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let orchestrator = ExecutionOrchestrator::new(
            Arc::new(FnProbe::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok(ProbeOutput::new(true)) }
            })),
            Arc::new(CompletesWithoutError),
        );
        let ledger = BudgetLedger::unbounded("test");

        let err = orchestrator
            .run(
                &ExecutionPolicy::new(0),
                Arc::new(FactorSuite::new()),
                ledger.root(),
                RunKind::Measure,
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            EngineError::InvalidPolicy(PolicyError::InvalidSampleCount(0))
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(ledger.root().totals().samples, 0);
    }

    #[tokio::test]
    async fn test_oversized_concurrency_rejected() {
        let ledger = BudgetLedger::unbounded("test");
        let err = always_ok()
            .run(
                &ExecutionPolicy::new(5).with_concurrency(usize::MAX),
                Arc::new(FactorSuite::new()),
                ledger.root(),
                RunKind::Measure,
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            EngineError::InvalidPolicy(PolicyError::ConcurrencyTooHigh { .. })
        ));
        assert_eq!(ledger.root().totals().samples, 0);
    }

    #[tokio::test]
    async fn test_pool_sized_by_batch_not_concurrency() {
        let ledger = BudgetLedger::unbounded("test");
        let report = always_ok()
            .run(
                &ExecutionPolicy::new(5)
                    .with_warmup(2)
                    .with_concurrency(usize::MAX >> 4),
                Arc::new(FactorSuite::new()),
                ledger.root(),
                RunKind::Measure,
            )
            .await
            .unwrap();

        assert_eq!(report.state, RunState::Completed);
        assert_eq!(report.statistics.sample_count, 5);
        assert_eq!(report.warmup_executed, 2);
    }

    #[test]
    fn test_early_stop_counts_whole_released_batch() {
        let semaphore = Arc::new(Semaphore::new(4));
        let completion = |index: usize, success: bool| Completion {
            index,
            outcome: if success {
                Outcome::succeeded(index, Duration::from_millis(1))
            } else {
                Outcome::failed(
                    index,
                    Duration::from_millis(1),
                    CapturedFailure::new("probe_error", "boom"),
                )
            },
            _permit: semaphore.clone().try_acquire_owned().unwrap(),
        };

        let mut sampling = Sampling {
            run_id: Uuid::new_v4(),
            kind: RunKind::Test,
            planned: 4,
            early: Some(EarlyTermination {
                pass_threshold: 1.0,
                stop_when_guaranteed: false,
            }),
            aggregator: Aggregator::new(0.95, IntervalSidedness::TwoSided),
            listener: &NoopProgress,
        };
        let mut buffer = ReorderBuffer::new(4);
        let mut result = BatchResult::default();

        for index in 1..4 {
            let next = completion(index, true);
            let stop = accept(next, &mut buffer, &mut result, Some(&mut sampling));
            assert!(stop.is_none());
        }
        assert_eq!(result.joined, 0);

        // Index 0 fails, so a perfect score is out of reach after one join.
        let first = completion(0, false);
        let stop = accept(first, &mut buffer, &mut result, Some(&mut sampling));

        assert_eq!(stop, Some(EarlyStop::PassImpossible));
        assert_eq!(sampling.aggregator.sample_count(), 1);
        assert_eq!(result.joined, 4);
    }

    #[tokio::test]
    async fn test_sequential_dispatch_follows_index_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();
        let orchestrator = ExecutionOrchestrator::new(
            Arc::new(FnProbe::new(move |ctx: SampleContext| {
                log.lock().unwrap().push(ctx.index);
                async { Ok(ProbeOutput::new(true)) }
            })),
            Arc::new(CompletesWithoutError),
        );
        let ledger = BudgetLedger::unbounded("test");

        let report = orchestrator
            .run(
                &ExecutionPolicy::new(25),
                Arc::new(FactorSuite::new()),
                ledger.root(),
                RunKind::Measure,
            )
            .await
            .unwrap();

        assert_eq!(report.state, RunState::Completed);
        assert_eq!(*seen.lock().unwrap(), (0..25).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_warmup_counted_in_ledger_not_statistics() {
        let ledger = BudgetLedger::unbounded("test");
        let report = always_ok()
            .run(
                &ExecutionPolicy::new(10).with_warmup(3),
                Arc::new(FactorSuite::new()),
                ledger.root(),
                RunKind::Test,
            )
            .await
            .unwrap();

        assert_eq!(report.statistics.sample_count, 10);
        assert_eq!(report.warmup_executed, 3);
        assert_eq!(ledger.root().totals().samples, 13);
        assert_eq!(ledger.summary().samples_by_kind[&RunKind::Test], 13);
    }

    #[tokio::test]
    async fn test_early_termination_when_pass_impossible() {
        let orchestrator = ExecutionOrchestrator::new(
            Arc::new(FnProbe::new(|_| async {
                Err::<ProbeOutput, _>(anyhow::anyhow!("always fails"))
            })),
            Arc::new(CompletesWithoutError),
        );
        let ledger = BudgetLedger::unbounded("test");
        let policy = ExecutionPolicy::new(100).with_early_termination(EarlyTermination {
            pass_threshold: 0.9,
            stop_when_guaranteed: false,
        });

        let report = orchestrator
            .run(&policy, Arc::new(FactorSuite::new()), ledger.root(), RunKind::Test)
            .await
            .unwrap();

        assert_eq!(report.state, RunState::TerminatedEarly);
        assert_eq!(report.early_stop, Some(EarlyStop::PassImpossible));
        // 90 successes needed; the 11th failure settles it.
        assert_eq!(report.statistics.sample_count, 11);
    }

    #[tokio::test]
    async fn test_cost_budget_exhaustion() {
        let orchestrator = ExecutionOrchestrator::new(
            Arc::new(FnProbe::new(|_| async { Ok(ProbeOutput::new(true).with_cost(10)) })),
            Arc::new(CompletesWithoutError),
        );
        let ledger = BudgetLedger::unbounded("test");
        let policy = ExecutionPolicy::new(50).with_cost_budget(35);

        let report = orchestrator
            .run(&policy, Arc::new(FactorSuite::new()), ledger.root(), RunKind::Measure)
            .await
            .unwrap();

        assert_eq!(report.state, RunState::BudgetExhausted);
        assert_eq!(report.statistics.sample_count, 4);
        assert!(report.exhaustion_reason.unwrap().contains("cost"));
    }

    #[tokio::test]
    async fn test_exhausted_parent_stops_warmup() {
        let ledger = BudgetLedger::new("test", ScopeCeilings::unbounded().with_cost(1));
        ledger.root().record_cost(1);

        let report = always_ok()
            .run(
                &ExecutionPolicy::new(10).with_warmup(5),
                Arc::new(FactorSuite::new()),
                ledger.root(),
                RunKind::Measure,
            )
            .await
            .unwrap();

        assert_eq!(report.state, RunState::BudgetExhausted);
        assert_eq!(report.warmup_executed, 0);
        assert!(report.statistics.is_empty());
    }

    #[tokio::test]
    async fn test_feasibility_warning_reported() {
        let ledger = BudgetLedger::unbounded("test");
        let policy = ExecutionPolicy::new(3)
            .with_pacing(crate::domain::models::PacingConstraint::fixed_delay(
                Duration::from_millis(5),
            ))
            .with_time_budget(Duration::from_millis(1));

        let report = always_ok()
            .run(&policy, Arc::new(FactorSuite::new()), ledger.root(), RunKind::Measure)
            .await
            .unwrap();

        assert!(report.feasibility_warning.is_some());
    }
}
