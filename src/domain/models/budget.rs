//! Value types exchanged with the budget ledger.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::outcome::{duration_millis, option_duration_millis};

/// Level of a ledger scope in the scope tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeLevel {
    Global,
    Suite,
    Class,
    Method,
}

/// The kind of run a sample was executed for. Used to partition sample counts
/// in the final ledger summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunKind {
    /// Characterizing a baseline.
    Measure,
    /// Checking against a threshold.
    Test,
    /// Evaluating candidate configurations during optimization.
    Optimize,
}

impl RunKind {
    pub const ALL: [Self; 3] = [Self::Measure, Self::Test, Self::Optimize];

    pub(crate) const fn slot(self) -> usize {
        match self {
            Self::Measure => 0,
            Self::Test => 1,
            Self::Optimize => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Measure => "measure",
            Self::Test => "test",
            Self::Optimize => "optimize",
        }
    }
}

/// Ceilings applied to one scope. `None` means unbounded at this level
/// (ancestors may still bound it).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeCeilings {
    #[serde(default, with = "option_duration_millis")]
    pub time: Option<Duration>,
    #[serde(default)]
    pub cost: Option<u64>,
}

impl ScopeCeilings {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn with_time(mut self, time: Duration) -> Self {
        self.time = Some(time);
        self
    }

    pub fn with_cost(mut self, cost: u64) -> Self {
        self.cost = Some(cost);
        self
    }
}

/// Budget left for a scope, taking every ancestor into account.
/// `None` means no ceiling applies anywhere on the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Remaining {
    #[serde(with = "option_duration_millis")]
    pub time_left: Option<Duration>,
    pub cost_left: Option<u64>,
}

/// Point-in-time consumption of a single scope (including its subtree).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeTotals {
    #[serde(with = "duration_millis")]
    pub elapsed: Duration,
    pub cost_units: u64,
    pub samples: u64,
}

/// Final totals emitted exactly once when the root scope closes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSummary {
    pub label: String,
    #[serde(with = "duration_millis")]
    pub total_elapsed: Duration,
    pub total_cost_units: u64,
    pub total_samples: u64,
    pub samples_by_kind: BTreeMap<RunKind, u64>,
}
