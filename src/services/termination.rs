//! Ready-made termination policies.
//!
//! Every policy looks at the committed history plus the iteration that just
//! finished. The orchestrator OR-combines its policies in order; [`AnyOf`]
//! does the same for callers that want one composite.

use std::sync::Arc;
use std::time::Duration;

use crate::domain::models::{TerminationKind, TerminationReason};
use crate::domain::ports::{TerminationContext, TerminationPolicy};

/// Stop after `n` iterations.
#[derive(Debug, Clone, Copy)]
pub struct MaxIterations(pub usize);

impl TerminationPolicy for MaxIterations {
    fn evaluate(&self, ctx: &TerminationContext<'_>) -> Option<TerminationReason> {
        (ctx.iterations() >= self.0).then(|| {
            TerminationReason::new(
                TerminationKind::MaxIterations,
                format!("reached {} iterations", self.0),
            )
        })
    }
}

/// Stop once wall-clock time since the loop started reaches the budget.
///
/// Measured from the instant captured at loop start, not by summing
/// iteration durations.
#[derive(Debug, Clone, Copy)]
pub struct WallClockBudget(pub Duration);

impl TerminationPolicy for WallClockBudget {
    fn evaluate(&self, ctx: &TerminationContext<'_>) -> Option<TerminationReason> {
        let elapsed = ctx.elapsed();
        (elapsed >= self.0).then(|| {
            TerminationReason::new(
                TerminationKind::TimeBudget,
                format!(
                    "{}ms elapsed of {}ms budget",
                    elapsed.as_millis(),
                    self.0.as_millis()
                ),
            )
        })
    }
}

/// Stop once the loop has consumed `n` cost units.
#[derive(Debug, Clone, Copy)]
pub struct CostBudget(pub u64);

impl TerminationPolicy for CostBudget {
    fn evaluate(&self, ctx: &TerminationContext<'_>) -> Option<TerminationReason> {
        (ctx.cost_spent >= self.0).then(|| {
            TerminationReason::new(
                TerminationKind::CostBudget,
                format!("{} cost units spent of {} budget", ctx.cost_spent, self.0),
            )
        })
    }
}

/// Stop when the last `window` scored iterations did not beat the best score
/// seen before them.
#[derive(Debug, Clone, Copy)]
pub struct NoImprovement {
    pub window: usize,
}

impl NoImprovement {
    pub fn new(window: usize) -> Self {
        Self { window }
    }
}

impl TerminationPolicy for NoImprovement {
    fn evaluate(&self, ctx: &TerminationContext<'_>) -> Option<TerminationReason> {
        if self.window == 0 {
            return None;
        }
        let scores: Vec<f64> = ctx.scores().collect();
        if scores.len() <= self.window {
            return None;
        }

        let (earlier, recent) = scores.split_at(scores.len() - self.window);
        let best_before = earlier.iter().copied().reduce(|best, s| {
            if ctx.objective.is_better(s, best) {
                s
            } else {
                best
            }
        })?;

        let improved = recent.iter().any(|&s| ctx.objective.is_better(s, best_before));
        (!improved).then(|| {
            TerminationReason::new(
                TerminationKind::NoImprovement,
                format!(
                    "no improvement on {best_before:.4} in the last {} scored iterations",
                    self.window
                ),
            )
        })
    }
}

/// Stop when two successive scored iterations differ by less than
/// `min_delta`.
#[derive(Debug, Clone, Copy)]
pub struct MinScoreDelta {
    pub min_delta: f64,
}

impl MinScoreDelta {
    pub fn new(min_delta: f64) -> Self {
        Self { min_delta }
    }
}

impl TerminationPolicy for MinScoreDelta {
    fn evaluate(&self, ctx: &TerminationContext<'_>) -> Option<TerminationReason> {
        let scores: Vec<f64> = ctx.scores().collect();
        let [.., previous, latest] = scores.as_slice() else {
            return None;
        };
        let delta = (latest - previous).abs();
        (delta < self.min_delta).then(|| {
            TerminationReason::new(
                TerminationKind::MinDelta,
                format!(
                    "score moved {delta:.6} ({previous:.4} -> {latest:.4}), below minimum {}",
                    self.min_delta
                ),
            )
        })
    }
}

/// Fires when any inner policy fires; the first one in order wins.
#[derive(Clone, Default)]
pub struct AnyOf {
    policies: Vec<Arc<dyn TerminationPolicy>>,
}

impl AnyOf {
    pub fn new(policies: Vec<Arc<dyn TerminationPolicy>>) -> Self {
        Self { policies }
    }

    #[must_use]
    pub fn or(mut self, policy: Arc<dyn TerminationPolicy>) -> Self {
        self.policies.push(policy);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

impl TerminationPolicy for AnyOf {
    fn evaluate(&self, ctx: &TerminationContext<'_>) -> Option<TerminationReason> {
        self.policies.iter().find_map(|p| p.evaluate(ctx))
    }
}
