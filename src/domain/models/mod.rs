pub mod budget;
pub mod config;
pub mod factors;
pub mod iteration;
pub mod outcome;
pub mod policy;
pub mod record;
pub mod run;
pub mod statistics;

pub use budget::{LedgerSummary, Remaining, RunKind, ScopeCeilings, ScopeLevel, ScopeTotals};
pub use config::{AuditConfig, BudgetConfig, EngineConfig, ExecutionDefaults, LoggingConfig};
pub use factors::FactorSuite;
pub use iteration::{
    IterationRecord, IterationStatus, Objective, TerminationKind, TerminationReason,
};
pub use outcome::{CapturedFailure, Outcome};
pub use policy::{EarlyTermination, ExecutionPolicy, PacingConstraint, MAX_CONCURRENCY};
pub use record::{Record, ToRecord};
pub use run::{EarlyStop, LatencySummary, RunReport, RunState};
pub use statistics::{ConfidenceInterval, IntervalSidedness, Statistics};
