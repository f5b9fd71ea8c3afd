//! Domain layer for the probatio engine
//!
//! This module contains the data model and the port contracts.

pub mod errors;
pub mod models;
pub mod ports;

// Re-export error types for convenient access
pub use errors::{
    CategorizedFailure, EngineError, EngineResult, MutationError, PolicyError, ScoringError,
    ThresholdError,
};
