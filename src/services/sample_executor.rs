//! Single-sample execution.
//!
//! Invokes the probe exactly once, turns errors and panics into failed
//! outcomes, applies the success criterion and records the sample into the
//! ledger scope it was given.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use serde_json::Value;
use tracing::{debug, trace};

use crate::domain::errors::CategorizedFailure;
use crate::domain::models::{CapturedFailure, Outcome};
use crate::domain::ports::{Evaluation, Probe, SampleContext, SuccessCriterion};
use crate::services::budget_ledger::ScopeHandle;

/// Failure category for probes that panicked.
pub const PANIC_CATEGORY: &str = "panic";

/// Runs one probe invocation. Cheap to clone; clones share the probe.
#[derive(Clone)]
pub struct SampleExecutor {
    probe: Arc<dyn Probe>,
    criterion: Arc<dyn SuccessCriterion>,
}

impl SampleExecutor {
    pub fn new(probe: Arc<dyn Probe>, criterion: Arc<dyn SuccessCriterion>) -> Self {
        Self { probe, criterion }
    }

    /// Execute one sample and record it into `scope`.
    ///
    /// Never fails: whatever the probe does ends up as an [`Outcome`].
    pub async fn execute(&self, ctx: &SampleContext, scope: &ScopeHandle) -> Outcome {
        let started = Instant::now();
        let result = AssertUnwindSafe(self.probe.invoke(ctx))
            .catch_unwind()
            .await;
        let duration = started.elapsed();

        let outcome = match result {
            Ok(Ok(output)) => {
                let outcome = match self.criterion.evaluate(&output) {
                    Evaluation::Pass => Outcome::succeeded(ctx.index, duration),
                    Evaluation::Fail { category, message } => Outcome::failed(
                        ctx.index,
                        duration,
                        CapturedFailure::new(category, message),
                    ),
                };
                let outcome = match output.value {
                    Value::Object(map) => outcome.with_value(map),
                    _ => outcome,
                };
                match output.cost_units {
                    Some(cost) => outcome.with_cost(cost),
                    None => outcome,
                }
            }
            Ok(Err(err)) => {
                let failure = match err.downcast_ref::<CategorizedFailure>() {
                    Some(categorized) => {
                        CapturedFailure::new(&categorized.category, &categorized.message)
                    }
                    None => CapturedFailure::new(
                        CategorizedFailure::DEFAULT_CATEGORY,
                        format!("{err:#}"),
                    ),
                };
                debug!(
                    run_id = %ctx.run_id,
                    index = ctx.index,
                    category = %failure.category,
                    "probe returned an error"
                );
                Outcome::failed(ctx.index, duration, failure)
            }
            Err(payload) => {
                let message = panic_message(&*payload);
                debug!(
                    run_id = %ctx.run_id,
                    index = ctx.index,
                    panic = %message,
                    "probe panicked"
                );
                Outcome::failed(
                    ctx.index,
                    duration,
                    CapturedFailure::new(PANIC_CATEGORY, message),
                )
            }
        };

        let outcome = if ctx.warmup {
            outcome.as_warmup()
        } else {
            outcome
        };

        scope.record_elapsed(outcome.duration);
        if let Some(cost) = outcome.cost_units {
            scope.record_cost(cost);
        }
        scope.record_sample();

        trace!(
            run_id = %ctx.run_id,
            index = ctx.index,
            warmup = ctx.warmup,
            success = outcome.success,
            duration_ms = outcome.duration.as_millis() as u64,
            "sample executed"
        );

        outcome
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "probe panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{FactorSuite, ScopeCeilings};
    use crate::domain::ports::{CompletesWithoutError, ExpectEquals, FnProbe, ProbeOutput};
    use crate::services::budget_ledger::BudgetLedger;
    use serde_json::json;
    use uuid::Uuid;

    fn ctx(index: usize, warmup: bool) -> SampleContext {
        SampleContext {
            run_id: Uuid::new_v4(),
            index,
            warmup,
            configuration: Arc::new(FactorSuite::new()),
        }
    }

    fn executor<F, Fut>(f: F, criterion: Arc<dyn SuccessCriterion>) -> SampleExecutor
    where
        F: Fn(SampleContext) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = anyhow::Result<ProbeOutput>> + Send + 'static,
    {
        SampleExecutor::new(Arc::new(FnProbe::new(f)), criterion)
    }

    #[tokio::test]
    async fn test_success_records_into_ledger() {
        let ledger = BudgetLedger::new("test", ScopeCeilings::unbounded());
        let exec = executor(
            |_| async { Ok(ProbeOutput::new(json!({"answer": 42})).with_cost(7)) },
            Arc::new(CompletesWithoutError),
        );

        let outcome = exec.execute(&ctx(0, false), ledger.root()).await;

        assert!(outcome.success);
        assert_eq!(outcome.cost_units, Some(7));
        assert_eq!(outcome.value.as_ref().unwrap()["answer"], 42);
        let totals = ledger.root().totals();
        assert_eq!(totals.samples, 1);
        assert_eq!(totals.cost_units, 7);
    }

    #[tokio::test]
    async fn test_error_becomes_failed_outcome() {
        let ledger = BudgetLedger::unbounded("test");
        let exec = executor(
            |_| async { Err(anyhow::anyhow!("connection reset")) },
            Arc::new(CompletesWithoutError),
        );

        let outcome = exec.execute(&ctx(3, false), ledger.root()).await;

        assert!(!outcome.success);
        assert_eq!(outcome.index, 3);
        assert_eq!(
            outcome.failure_category(),
            Some(CategorizedFailure::DEFAULT_CATEGORY)
        );
        assert_eq!(ledger.root().totals().samples, 1);
    }

    #[tokio::test]
    async fn test_categorized_error_keeps_category() {
        let ledger = BudgetLedger::unbounded("test");
        let exec = executor(
            |_| async { Err(CategorizedFailure::new("rate_limited", "429").into()) },
            Arc::new(CompletesWithoutError),
        );

        let outcome = exec.execute(&ctx(0, false), ledger.root()).await;
        assert_eq!(outcome.failure_category(), Some("rate_limited"));
        assert_eq!(outcome.failure.unwrap().message, "429");
    }

    #[tokio::test]
    async fn test_panic_becomes_failed_outcome() {
        let ledger = BudgetLedger::unbounded("test");
        let exec = executor(
            |ctx: SampleContext| async move {
                if ctx.index == 1 {
                    panic!("boom");
                }
                Ok(ProbeOutput::new(json!(null)))
            },
            Arc::new(CompletesWithoutError),
        );

        let outcome = exec.execute(&ctx(1, false), ledger.root()).await;
        assert!(!outcome.success);
        assert_eq!(outcome.failure_category(), Some(PANIC_CATEGORY));
        assert_eq!(outcome.failure.unwrap().message, "boom");
        assert_eq!(ledger.root().totals().samples, 1);
    }

    #[tokio::test]
    async fn test_criterion_rejection_uses_its_category() {
        let ledger = BudgetLedger::unbounded("test");
        let exec = executor(
            |_| async { Ok(ProbeOutput::new("lyon")) },
            Arc::new(ExpectEquals::new("paris")),
        );

        let outcome = exec.execute(&ctx(0, false), ledger.root()).await;
        assert_eq!(outcome.failure_category(), Some(ExpectEquals::CATEGORY));
        assert!(outcome.value.is_none());
    }

    #[tokio::test]
    async fn test_warmup_outcome_is_tagged() {
        let ledger = BudgetLedger::unbounded("test");
        let exec = executor(
            |_| async { Ok(ProbeOutput::new(true)) },
            Arc::new(CompletesWithoutError),
        );

        let outcome = exec.execute(&ctx(0, true), ledger.root()).await;
        assert!(outcome.warmup);
        assert_eq!(ledger.root().totals().samples, 1);
    }
}
