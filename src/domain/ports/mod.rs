//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines the contracts between the engine and its collaborators:
//! - Probe / SuccessCriterion: the action under test and what "success" means
//! - Scorer / Mutator / TerminationPolicy: optimization strategies
//! - ProgressListener / SummarySink: outbound reporting
//!
//! These traits keep the engine independent of any concrete backend.

pub mod probe;
pub mod progress;
pub mod strategy;

pub use probe::{
    CompletesWithoutError, Evaluation, ExpectEquals, FnProbe, Predicate, Probe, ProbeOutput,
    SampleContext, SuccessCriterion,
};
pub use progress::{NoopProgress, ProgressListener, SampleProgress, SummarySink};
pub use strategy::{Mutator, Scorer, TerminationContext, TerminationPolicy};
