//! Result of one orchestrated sampling run.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::budget::RunKind;
use super::factors::FactorSuite;
use super::outcome::duration_millis;
use super::statistics::Statistics;

/// Lifecycle of an execution run.
///
/// `Idle -> WarmingUp -> Sampling -> Completed | BudgetExhausted | TerminatedEarly`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    WarmingUp,
    Sampling,
    Completed,
    BudgetExhausted,
    TerminatedEarly,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::BudgetExhausted | Self::TerminatedEarly
        )
    }
}

/// Why sampling stopped before the planned count when early termination is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EarlyStop {
    /// Even if every remaining sample succeeds the threshold cannot be met.
    PassImpossible,
    /// Enough successes are already in to meet the threshold.
    PassGuaranteed,
}

/// Latency distribution over measured samples.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatencySummary {
    pub count: u64,
    #[serde(with = "duration_millis")]
    pub mean: Duration,
    #[serde(with = "duration_millis")]
    pub p50: Duration,
    #[serde(with = "duration_millis")]
    pub p90: Duration,
    #[serde(with = "duration_millis")]
    pub p99: Duration,
    #[serde(with = "duration_millis")]
    pub max: Duration,
}

impl LatencySummary {
    /// Summarize a set of durations. Input order does not matter.
    pub fn from_durations(durations: &[Duration]) -> Self {
        if durations.is_empty() {
            return Self::default();
        }

        let mut sorted = durations.to_vec();
        sorted.sort_unstable();

        let total: Duration = sorted.iter().sum();
        let count = sorted.len();
        let percentile = |q: f64| {
            // Nearest-rank percentile.
            let rank = (q * count as f64).ceil() as usize;
            sorted[rank.clamp(1, count) - 1]
        };

        Self {
            count: count as u64,
            mean: total / u32::try_from(count).unwrap_or(u32::MAX),
            p50: percentile(0.50),
            p90: percentile(0.90),
            p99: percentile(0.99),
            max: sorted[count - 1],
        }
    }
}

/// Everything a single run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub kind: RunKind,
    pub configuration: Arc<FactorSuite>,
    /// Aggregate over measured samples, folded in dispatch order.
    pub statistics: Statistics,
    pub latency: LatencySummary,
    pub state: RunState,
    pub planned_samples: u32,
    /// Measured samples handed to the probe.
    pub dispatched_samples: u64,
    /// Dispatched samples whose results were discarded after exhaustion.
    pub abandoned_samples: u64,
    pub warmup_executed: u32,
    pub early_stop: Option<EarlyStop>,
    /// Populated when sampling stopped on budget exhaustion.
    pub exhaustion_reason: Option<String>,
    /// Populated when the planned schedule could not fit the time budget.
    pub feasibility_warning: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}
