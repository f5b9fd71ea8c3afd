//! Pluggable optimization strategies.
//!
//! Each contract is a single method. Composition happens by wrapping (a
//! weighted scorer holds scorers, an `AnyOf` policy holds policies), never by
//! inheritance. Ready-made implementations live in `services::scorers`,
//! `services::mutators` and `services::termination`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::domain::errors::{MutationError, ScoringError};
use crate::domain::models::{
    FactorSuite, IterationRecord, Objective, Statistics, TerminationReason,
};

/// Turns the statistics observed under a configuration into a scalar fitness.
pub trait Scorer: Send + Sync {
    fn score(&self, statistics: &Statistics, configuration: &FactorSuite)
        -> Result<f64, ScoringError>;

    /// Short name used in logs.
    fn name(&self) -> &str {
        "scorer"
    }
}

/// Proposes the next configuration from the current one and the history.
///
/// Async because real mutators often consult an external service.
#[async_trait]
pub trait Mutator: Send + Sync {
    /// `history` holds every committed iteration followed by the current one.
    async fn mutate(
        &self,
        current: &FactorSuite,
        history: &[Arc<IterationRecord>],
    ) -> Result<FactorSuite, MutationError>;
}

/// Everything a termination policy may look at.
#[derive(Debug, Clone, Copy)]
pub struct TerminationContext<'a> {
    /// Committed iterations followed by the current one.
    pub history: &'a [Arc<IterationRecord>],
    pub objective: Objective,
    /// Captured once when the loop started.
    pub started_at: Instant,
    pub now: Instant,
    /// Cost units consumed by the loop so far, from the ledger.
    pub cost_spent: u64,
}

impl TerminationContext<'_> {
    pub fn elapsed(&self) -> Duration {
        self.now.saturating_duration_since(self.started_at)
    }

    pub fn iterations(&self) -> usize {
        self.history.len()
    }

    /// Scores of iterations that produced one, in iteration order.
    pub fn scores(&self) -> impl Iterator<Item = f64> + '_ {
        self.history.iter().filter_map(|r| r.rankable_score())
    }
}

/// Votes on whether the optimization loop should stop.
pub trait TerminationPolicy: Send + Sync {
    /// `Some(reason)` to stop.
    fn evaluate(&self, ctx: &TerminationContext<'_>) -> Option<TerminationReason>;
}
