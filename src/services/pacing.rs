//! Sample pacing.
//!
//! A [`PacingPlan`] is computed once per run from the policy and the planned
//! sample count. The plan describes the *aggregate* dispatch rate: with `c`
//! concurrent workers each worker waits `interval * c` between its own
//! samples, and dispatch starts are staggered by `interval` so the combined
//! rate never exceeds the ceiling.
//!
//! Enforcement happens at the single dispatch point in the orchestrator
//! through a [`Pacer`], a GCRA limiter with a burst of one.

use std::fmt;
use std::time::Duration;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::models::outcome::option_duration_millis;
use crate::domain::models::ExecutionPolicy;

/// Raised when the planned schedule cannot fit the run's time budget.
/// Non-fatal: the run proceeds and the ledger stops it when the budget runs
/// out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeasibilityWarning {
    pub planned_samples: u32,
    /// Minimum wall-clock time the pacing schedule needs.
    #[serde(with = "crate::domain::models::outcome::duration_millis")]
    pub required: Duration,
    #[serde(with = "crate::domain::models::outcome::duration_millis")]
    pub time_budget: Duration,
}

impl fmt::Display for FeasibilityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pacing {} samples needs at least {}ms but the time budget is {}ms",
            self.planned_samples,
            self.required.as_millis(),
            self.time_budget.as_millis()
        )
    }
}

/// Effective pacing for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacingPlan {
    /// Minimum gap between two consecutive dispatches across all workers.
    #[serde(with = "option_duration_millis")]
    pub aggregate_interval: Option<Duration>,
    /// Gap each individual worker observes between its own dispatches.
    ///
    /// Informational: follows from `aggregate_interval`, which is the only
    /// interval the [`Pacer`] enforces.
    #[serde(with = "option_duration_millis")]
    pub per_worker_delay: Option<Duration>,
    /// Offset between the start of consecutive workers. Informational, like
    /// `per_worker_delay`.
    #[serde(with = "option_duration_millis")]
    pub dispatch_stagger: Option<Duration>,
    pub concurrency: usize,
    pub feasibility: Option<FeasibilityWarning>,
}

impl PacingPlan {
    pub fn is_paced(&self) -> bool {
        self.aggregate_interval.is_some()
    }

    /// Build the limiter that enforces this plan.
    pub fn pacer(&self) -> Pacer {
        Pacer::new(self.aggregate_interval)
    }
}

/// Computes [`PacingPlan`]s.
pub struct PacingController;

impl PacingController {
    /// Plan pacing for `planned_samples` dispatches (warmup included).
    pub fn plan(policy: &ExecutionPolicy, planned_samples: u32) -> PacingPlan {
        let concurrency = policy.concurrency.max(1);
        let aggregate_interval = policy.pacing.min_interval();
        let workers = u32::try_from(concurrency).unwrap_or(u32::MAX);

        let per_worker_delay = aggregate_interval.map(|i| i.saturating_mul(workers));
        let dispatch_stagger = per_worker_delay.map(|d| d / workers);

        let feasibility = match (aggregate_interval, policy.time_budget) {
            (Some(interval), Some(time_budget)) => {
                // The first dispatch is never delayed.
                let required = interval.saturating_mul(planned_samples.saturating_sub(1));
                (required > time_budget).then_some(FeasibilityWarning {
                    planned_samples,
                    required,
                    time_budget,
                })
            }
            _ => None,
        };

        if let Some(warning) = &feasibility {
            warn!(
                planned_samples,
                required_ms = warning.required.as_millis() as u64,
                time_budget_ms = warning.time_budget.as_millis() as u64,
                "pacing schedule exceeds time budget; run will stop when the budget is exhausted"
            );
        }

        debug!(
            concurrency,
            interval_ms = aggregate_interval.map(|i| i.as_millis() as u64),
            per_worker_delay_ms = per_worker_delay.map(|d| d.as_millis() as u64),
            "pacing plan computed"
        );

        PacingPlan {
            aggregate_interval,
            per_worker_delay,
            dispatch_stagger,
            concurrency,
            feasibility,
        }
    }
}

/// Dispatch gate enforcing a minimum interval between dispatches.
///
/// The first call to [`wait`](Self::wait) returns immediately.
pub struct Pacer {
    limiter: Option<DefaultDirectRateLimiter>,
}

impl Pacer {
    pub fn new(interval: Option<Duration>) -> Self {
        // `with_period` yields a burst of one cell.
        let limiter = interval
            .and_then(Quota::with_period)
            .map(RateLimiter::direct);
        Self { limiter }
    }

    pub fn unpaced() -> Self {
        Self { limiter: None }
    }

    pub async fn wait(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }
}
