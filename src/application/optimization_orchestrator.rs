//! OptimizationOrchestrator - iterative configuration search
//!
//! One iteration per step, strictly serial:
//! 1. Run the execution orchestrator under the current configuration; a run
//!    whose budget ran out before any measured sample ends the loop
//!    (`TerminatedByPolicy`, ledger exhausted)
//! 2. Score the statistics; a scorer failure ends the loop (`ScoringFailed`)
//! 3. Consult every termination policy in order, then the ledger; the first
//!    reason wins (`TerminatedByPolicy`)
//! 4. Ask the mutator for the next configuration; a failure ends the loop
//!    (`MutationFailed`)
//! 5. Otherwise commit the iteration as `Normal` and continue
//!
//! Each record is committed exactly once, after its final status is known.
//! Policies and the mutator see the committed prefix followed by the current
//! iteration. Reporters read progress through [`HistoryLog::snapshot`] on the
//! log returned by [`OptimizationOrchestrator::history_log`].

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::application::execution_orchestrator::ExecutionOrchestrator;
use crate::domain::errors::{EngineError, EngineResult, ScoringError};
use crate::domain::models::{
    ExecutionPolicy, FactorSuite, IterationRecord, IterationStatus, Objective, RunKind, RunState,
    ScopeCeilings, ScopeLevel, Statistics, TerminationKind, TerminationReason,
};
use crate::domain::ports::{
    Mutator, NoopProgress, ProgressListener, Scorer, TerminationContext, TerminationPolicy,
};
use crate::services::budget_ledger::{ScopeHandle, ScopeSpec};
use crate::services::optimization_history::{HistoryLog, OptimizationHistory};

/// Drives the optimization loop.
pub struct OptimizationOrchestrator {
    execution: ExecutionOrchestrator,
    scorer: Arc<dyn Scorer>,
    mutator: Arc<dyn Mutator>,
    policies: Vec<Arc<dyn TerminationPolicy>>,
    objective: Objective,
    ceilings: ScopeCeilings,
    listener: Arc<dyn ProgressListener>,
    log: Arc<HistoryLog>,
}

impl OptimizationOrchestrator {
    pub fn new(
        execution: ExecutionOrchestrator,
        scorer: Arc<dyn Scorer>,
        mutator: Arc<dyn Mutator>,
    ) -> Self {
        Self {
            execution,
            scorer,
            mutator,
            policies: Vec::new(),
            objective: Objective::default(),
            ceilings: ScopeCeilings::unbounded(),
            listener: Arc::new(NoopProgress),
            log: Arc::new(HistoryLog::new()),
        }
    }

    /// Add a termination policy. Policies are consulted in insertion order.
    pub fn with_termination(mut self, policy: Arc<dyn TerminationPolicy>) -> Self {
        self.policies.push(policy);
        self
    }

    pub fn with_objective(mut self, objective: Objective) -> Self {
        self.objective = objective;
        self
    }

    /// Ceilings for the loop's own ledger scope.
    pub fn with_ceilings(mut self, ceilings: ScopeCeilings) -> Self {
        self.ceilings = ceilings;
        self
    }

    pub fn with_listener(mut self, listener: Arc<dyn ProgressListener>) -> Self {
        self.listener = listener;
        self
    }

    /// Shared handle to the log this loop appends to. Take it before calling
    /// [`run`](Self::run) to read partial snapshots while the loop runs.
    pub fn history_log(&self) -> Arc<HistoryLog> {
        self.log.clone()
    }

    /// Run the loop to termination.
    ///
    /// Scorer and mutator failures end the loop and are recorded in the
    /// returned history.
    ///
    /// # Errors
    /// Returns an error before the first iteration when no termination policy
    /// is configured or the execution policy is invalid.
    pub async fn run(
        self,
        initial: FactorSuite,
        policy: &ExecutionPolicy,
        parent: &ScopeHandle,
    ) -> EngineResult<OptimizationHistory> {
        if self.policies.is_empty() {
            return Err(EngineError::NoTerminationPolicy);
        }
        policy.validate()?;

        let started = Instant::now();
        let started_at = Utc::now();
        let scope = parent.reserve_child(
            ScopeSpec::new(ScopeLevel::Class, "optimization")
                .with_ceilings(self.ceilings.clone())
                .with_run_kind(RunKind::Optimize),
        );

        info!(
            objective = ?self.objective,
            policies = self.policies.len(),
            scorer = self.scorer.name(),
            "optimization started"
        );

        let mut current = Arc::new(initial);
        let mut index = 0;

        let termination = loop {
            let iteration_started = Utc::now();
            let report = self
                .execution
                .run(policy, current.clone(), &scope, RunKind::Optimize)
                .await?;
            let statistics = report.statistics;

            // Nothing measured to score: the run's budget ran out first.
            if report.state == RunState::BudgetExhausted && statistics.is_empty() {
                let reason = report
                    .exhaustion_reason
                    .unwrap_or_else(|| "budget exhausted before any measured sample".to_string());
                warn!(iteration = index, reason = %reason, "run exhausted before sampling");
                self.commit(
                    index,
                    &current,
                    statistics,
                    None,
                    IterationStatus::TerminatedByPolicy,
                    iteration_started,
                );
                break TerminationReason::new(
                    TerminationKind::LedgerExhausted,
                    format!("iteration {index}: {reason}"),
                );
            }

            let score = match self.score(&statistics, &current) {
                Ok(score) => score,
                Err(err) => {
                    warn!(iteration = index, error = %err, "scorer failed");
                    self.commit(
                        index,
                        &current,
                        statistics,
                        None,
                        IterationStatus::ScoringFailed,
                        iteration_started,
                    );
                    break TerminationReason::new(
                        TerminationKind::ScorerFailure,
                        format!("iteration {index}: {err}"),
                    );
                }
            };

            // Committed prefix plus the current iteration as it stands.
            let mut view = self.log.snapshot(self.objective).records;
            view.push(Arc::new(record(
                index,
                &current,
                statistics.clone(),
                Some(score),
                IterationStatus::Normal,
                iteration_started,
            )));

            let ctx = TerminationContext {
                history: &view,
                objective: self.objective,
                started_at: started,
                now: Instant::now(),
                cost_spent: scope.totals().cost_units,
            };
            let fired = self
                .policies
                .iter()
                .find_map(|p| p.evaluate(&ctx))
                .or_else(|| {
                    scope.exhaustion_reason().map(|reason| {
                        TerminationReason::new(TerminationKind::LedgerExhausted, reason)
                    })
                });
            if let Some(reason) = fired {
                self.commit(
                    index,
                    &current,
                    statistics,
                    Some(score),
                    IterationStatus::TerminatedByPolicy,
                    iteration_started,
                );
                break reason;
            }

            let (status, next) = match self.mutator.mutate(&current, &view).await {
                Ok(next) => (IterationStatus::Normal, Ok(next)),
                Err(err) => {
                    warn!(iteration = index, error = %err, "mutator failed");
                    (IterationStatus::MutationFailed, Err(err))
                }
            };
            self.commit(index, &current, statistics, Some(score), status, iteration_started);
            match next {
                Ok(next) => current = Arc::new(next),
                Err(err) => {
                    break TerminationReason::new(
                        TerminationKind::MutatorFailure,
                        format!("iteration {index}: {err}"),
                    );
                }
            }

            index += 1;
        };

        let history =
            OptimizationHistory::new(self.log.snapshot(self.objective), termination, started_at);
        scope.close();

        let best = history.best_iteration();
        info!(
            iterations = history.len(),
            termination = %history.termination,
            best_iteration = best.map(|r| r.index),
            best_score = best.and_then(|r| r.score),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "optimization finished"
        );
        self.listener
            .on_optimization_terminated(&history.termination, history.len());

        Ok(history)
    }

    fn score(
        &self,
        statistics: &Statistics,
        configuration: &FactorSuite,
    ) -> Result<f64, ScoringError> {
        let score = self.scorer.score(statistics, configuration)?;
        if score.is_finite() {
            Ok(score)
        } else {
            Err(ScoringError::NonFinite(score))
        }
    }

    fn commit(
        &self,
        index: usize,
        configuration: &Arc<FactorSuite>,
        statistics: Statistics,
        score: Option<f64>,
        status: IterationStatus,
        started_at: DateTime<Utc>,
    ) {
        let committed = self.log.append(record(
            index,
            configuration,
            statistics,
            score,
            status,
            started_at,
        ));
        info!(
            iteration = index,
            score,
            status = ?status,
            observed_rate = committed.statistics.observed_rate,
            configuration = %committed.configuration,
            "iteration committed"
        );
        self.listener.on_iteration(&committed);
    }
}

fn record(
    index: usize,
    configuration: &Arc<FactorSuite>,
    statistics: Statistics,
    score: Option<f64>,
    status: IterationStatus,
    started_at: DateTime<Utc>,
) -> IterationRecord {
    IterationRecord {
        index,
        configuration: configuration.clone(),
        statistics,
        score,
        status,
        started_at,
        completed_at: Utc::now(),
    }
}
