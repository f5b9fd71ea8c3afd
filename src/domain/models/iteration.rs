//! Optimization iteration records and termination reasons.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::factors::FactorSuite;
use super::statistics::Statistics;

/// Direction in which scores improve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Objective {
    #[default]
    Maximize,
    Minimize,
}

impl Objective {
    /// Whether `candidate` is strictly better than `incumbent`.
    ///
    /// Strictness is what makes ties resolve to the earliest iteration.
    pub fn is_better(&self, candidate: f64, incumbent: f64) -> bool {
        match self {
            Self::Maximize => candidate > incumbent,
            Self::Minimize => candidate < incumbent,
        }
    }

    /// Signed improvement of `candidate` over `incumbent`; positive is better.
    pub fn improvement(&self, candidate: f64, incumbent: f64) -> f64 {
        match self {
            Self::Maximize => candidate - incumbent,
            Self::Minimize => incumbent - candidate,
        }
    }
}

/// How an iteration ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IterationStatus {
    /// Scored, and the loop went on to the next configuration.
    Normal,
    /// Scored, then a termination policy ended the loop.
    TerminatedByPolicy,
    /// The scorer failed; no score is recorded.
    ScoringFailed,
    /// Scored, then the mutator failed to propose a successor.
    MutationFailed,
}

/// Immutable record of one optimization iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord {
    /// Zero-based iteration index.
    pub index: usize,
    pub configuration: Arc<FactorSuite>,
    pub statistics: Statistics,
    /// Absent when scoring failed.
    pub score: Option<f64>,
    pub status: IterationStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl IterationRecord {
    /// Score usable for ranking: present and finite.
    pub fn rankable_score(&self) -> Option<f64> {
        self.score.filter(|s| s.is_finite())
    }
}

/// Which rule ended an optimization loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationKind {
    MaxIterations,
    TimeBudget,
    CostBudget,
    NoImprovement,
    MinDelta,
    /// The ledger scope backing the loop (or an ancestor) ran out.
    LedgerExhausted,
    ScorerFailure,
    MutatorFailure,
}

impl TerminationKind {
    /// Whether this termination came from a failure rather than a policy.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::ScorerFailure | Self::MutatorFailure)
    }
}

/// Terminal fact of an optimization history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminationReason {
    pub kind: TerminationKind,
    pub explanation: String,
}

impl TerminationReason {
    pub fn new(kind: TerminationKind, explanation: impl Into<String>) -> Self {
        Self {
            kind,
            explanation: explanation.into(),
        }
    }
}

impl std::fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.explanation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_objective_strictness() {
        assert!(Objective::Maximize.is_better(0.9, 0.5));
        assert!(!Objective::Maximize.is_better(0.5, 0.5));
        assert!(Objective::Minimize.is_better(0.1, 0.5));
        assert!(!Objective::Minimize.is_better(0.5, 0.5));
    }

    #[test]
    fn test_improvement_sign_follows_objective() {
        assert!(Objective::Maximize.improvement(0.8, 0.6) > 0.0);
        assert!(Objective::Minimize.improvement(0.8, 0.6) < 0.0);
    }
}
