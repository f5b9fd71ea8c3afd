//! Domain errors for the probatio engine.
//!
//! Only configuration problems surface to callers as `Err`. Probe failures,
//! budget exhaustion and scorer/mutator failures are recorded as data on the
//! run report or optimization history instead.

use thiserror::Error;

/// An [`ExecutionPolicy`](crate::domain::models::ExecutionPolicy) that cannot
/// be executed. Raised before any sample is dispatched.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PolicyError {
    #[error("Invalid sample count: {0}. Must be at least 1")]
    InvalidSampleCount(u32),

    #[error("Invalid concurrency: {0}. Must be at least 1")]
    InvalidConcurrency(usize),

    #[error("Concurrency {requested} exceeds the maximum of {max}")]
    ConcurrencyTooHigh { requested: usize, max: usize },

    #[error("Invalid confidence level: {0}. Must be strictly between 0 and 1")]
    InvalidConfidenceLevel(f64),

    #[error("Invalid rate window: {max_samples} samples per {window_ms}ms")]
    InvalidRateWindow { max_samples: u32, window_ms: u128 },

    #[error("Invalid pass threshold: {0}. Must be within [0, 1]")]
    InvalidPassThreshold(f64),

    #[error("Time budget must be greater than zero")]
    ZeroTimeBudget,

    #[error("Cost budget must be greater than zero")]
    ZeroCostBudget,
}

/// Errors from [`derive_threshold`](crate::services::threshold::derive_threshold).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ThresholdError {
    #[error("Baseline has no samples")]
    EmptyBaseline,

    #[error("Test sample count must be at least 1")]
    ZeroTestSamples,

    #[error("Invalid confidence level: {0}. Must be strictly between 0 and 1")]
    InvalidConfidenceLevel(f64),
}

/// A scorer could not turn statistics into a finite fitness value.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScoringError {
    #[error("Scorer produced a non-finite score: {0}")]
    NonFinite(f64),

    #[error("Invalid scorer weights: {0}")]
    InvalidWeights(String),

    #[error("Scoring failed: {0}")]
    Failed(String),
}

/// A mutator could not propose the next configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MutationError {
    #[error("Search space exhausted: {0}")]
    Exhausted(String),

    #[error("Mutation failed: {0}")]
    Failed(String),
}

/// Top-level engine errors returned by the orchestrators.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid execution policy: {0}")]
    InvalidPolicy(#[from] PolicyError),

    #[error("Invalid threshold request: {0}")]
    Threshold(#[from] ThresholdError),

    #[error("Optimization requires at least one termination policy")]
    NoTerminationPolicy,
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Error type a probe can return to attach a failure category.
///
/// The category is carried into
/// [`Statistics::failures_by_category`](crate::domain::models::Statistics).
/// Plain `anyhow` errors without this wrapper are counted under
/// [`CategorizedFailure::DEFAULT_CATEGORY`].
#[derive(Debug, Clone, Error)]
#[error("{category}: {message}")]
pub struct CategorizedFailure {
    pub category: String,
    pub message: String,
}

impl CategorizedFailure {
    /// Category used when a probe error carries no explicit category.
    pub const DEFAULT_CATEGORY: &'static str = "probe_error";

    pub fn new(category: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_error_converts_into_engine_error() {
        let err: EngineError = PolicyError::InvalidSampleCount(0).into();
        assert!(matches!(
            err,
            EngineError::InvalidPolicy(PolicyError::InvalidSampleCount(0))
        ));
        assert!(err.to_string().contains("sample count"));
    }

    #[test]
    fn test_categorized_failure_display() {
        let failure = CategorizedFailure::new("timeout", "upstream took 30s");
        assert_eq!(failure.to_string(), "timeout: upstream took 30s");
    }
}
