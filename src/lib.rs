//! Probatio - experiment execution and statistics engine
//!
//! Probatio runs a variable-outcome action (a [`Probe`]) many times under a
//! policy, turns the outcomes into success-rate statistics with confidence
//! intervals, and iterates over configurations to optimize a score.
//!
//! # Architecture
//!
//! This crate follows Clean Architecture / Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): Models, errors and the port traits
//! - **Service Layer** (`services`): Budget ledger, pacing, sample execution,
//!   aggregation, thresholds, optimization history and strategies
//! - **Application Layer** (`application`): Execution and optimization
//!   orchestrators
//! - **Infrastructure Layer** (`infrastructure`): Configuration, logging and
//!   the audit trail
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use probatio::{
//!     BudgetLedger, CompletesWithoutError, ExecutionOrchestrator, ExecutionPolicy, FactorSuite,
//!     FnProbe, ProbeOutput, RunKind, SampleContext,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let probe = FnProbe::new(|ctx: SampleContext| async move {
//!         Ok(ProbeOutput::new(ctx.index % 7 != 0))
//!     });
//!     let orchestrator =
//!         ExecutionOrchestrator::new(Arc::new(probe), Arc::new(CompletesWithoutError));
//!     let ledger = BudgetLedger::unbounded("example");
//!
//!     let report = orchestrator
//!         .run(
//!             &ExecutionPolicy::new(200).with_concurrency(4),
//!             Arc::new(FactorSuite::new()),
//!             ledger.root(),
//!             RunKind::Measure,
//!         )
//!         .await?;
//!     println!("{:.3}", report.statistics.observed_rate);
//!     Ok(())
//! }
//! ```

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use application::{ExecutionOrchestrator, OptimizationOrchestrator};
pub use domain::errors::{CategorizedFailure, EngineError, EngineResult, PolicyError};
pub use domain::models::{
    EngineConfig, ExecutionPolicy, FactorSuite, IntervalSidedness, IterationRecord,
    IterationStatus, LedgerSummary, Objective, PacingConstraint, RunKind, RunReport, RunState,
    ScopeCeilings, ScopeLevel, Statistics, TerminationKind, TerminationReason, ToRecord,
};
pub use domain::ports::{
    CompletesWithoutError, FnProbe, Mutator, Probe, ProbeOutput, ProgressListener,
    SampleContext, Scorer, SuccessCriterion, SummarySink, TerminationPolicy,
};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{
    derive_threshold, BudgetLedger, HistoryLog, OptimizationHistory, ScopeHandle, ScopeSpec,
    ThresholdDerivation, Verdict,
};
