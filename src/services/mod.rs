pub mod aggregator;
pub mod budget_ledger;
pub mod mutators;
pub mod optimization_history;
pub mod pacing;
pub mod reorder_buffer;
pub mod sample_executor;
pub mod scorers;
pub mod termination;
pub mod threshold;
pub mod verdict;

pub use aggregator::Aggregator;
pub use budget_ledger::{BudgetLedger, ScopeHandle, ScopeSpec};
pub use mutators::{FactorSweep, FnMutator};
pub use optimization_history::{select_best, HistoryLog, HistorySnapshot, OptimizationHistory};
pub use pacing::{FeasibilityWarning, Pacer, PacingController, PacingPlan};
pub use reorder_buffer::ReorderBuffer;
pub use sample_executor::{SampleExecutor, PANIC_CATEGORY};
pub use scorers::{FnScorer, LowerBoundScorer, Normalization, SuccessRateScorer, WeightedScorer};
pub use termination::{
    AnyOf, CostBudget, MaxIterations, MinScoreDelta, NoImprovement, WallClockBudget,
};
pub use threshold::{derive_threshold, ThresholdDerivation};
pub use verdict::{check_early_stop, required_successes, BudgetExhaustionBehavior, Verdict};
