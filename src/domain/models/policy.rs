//! Execution policy for one orchestrated run.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use super::outcome::option_duration_millis;
use super::statistics::IntervalSidedness;
use crate::domain::errors::PolicyError;

/// Largest worker pool a run can be given.
pub const MAX_CONCURRENCY: usize = Semaphore::MAX_PERMITS;

/// Constraint on how fast samples may be dispatched.
///
/// All variants describe the *aggregate* dispatch rate across every
/// concurrent worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum PacingConstraint {
    #[default]
    None,
    /// Minimum gap between two consecutive dispatches.
    FixedDelay {
        #[serde(with = "super::outcome::duration_millis")]
        delay: Duration,
    },
    /// At most `max_samples` dispatches in any `window`.
    RateWindow {
        max_samples: u32,
        #[serde(with = "super::outcome::duration_millis")]
        window: Duration,
    },
}

impl PacingConstraint {
    pub fn fixed_delay(delay: Duration) -> Self {
        Self::FixedDelay { delay }
    }

    pub fn per_second(max_samples: u32) -> Self {
        Self::RateWindow {
            max_samples,
            window: Duration::from_secs(1),
        }
    }

    pub fn per_minute(max_samples: u32) -> Self {
        Self::RateWindow {
            max_samples,
            window: Duration::from_secs(60),
        }
    }

    pub fn per_hour(max_samples: u32) -> Self {
        Self::RateWindow {
            max_samples,
            window: Duration::from_secs(3600),
        }
    }

    /// Minimum interval between two consecutive dispatches, if constrained.
    pub fn min_interval(&self) -> Option<Duration> {
        match *self {
            Self::None => None,
            Self::FixedDelay { delay } if delay.is_zero() => None,
            Self::FixedDelay { delay } => Some(delay),
            Self::RateWindow {
                max_samples,
                window,
            } => {
                if max_samples == 0 {
                    None
                } else {
                    Some(window / max_samples)
                }
            }
        }
    }

    /// The stricter of two constraints: whichever has the longer interval.
    pub fn most_restrictive(self, other: Self) -> Self {
        match (self.min_interval(), other.min_interval()) {
            (None, _) => other,
            (_, None) => self,
            (Some(a), Some(b)) if b > a => other,
            _ => self,
        }
    }
}

/// Stop sampling early once the verdict against `pass_threshold` can no
/// longer change.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EarlyTermination {
    /// Minimum success rate over the planned samples for a pass.
    pub pass_threshold: f64,
    /// Also stop when a pass is already guaranteed, not only when it is
    /// impossible.
    #[serde(default)]
    pub stop_when_guaranteed: bool,
}

/// Configuration for one orchestrated run. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPolicy {
    /// Measured samples (warmup excluded).
    pub samples: u32,
    /// Executed but unmeasured samples run before measurement starts.
    #[serde(default)]
    pub warmup: u32,
    /// Concurrent workers; 1 means strictly sequential.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default)]
    pub pacing: PacingConstraint,
    /// Ceiling on recorded elapsed time for this run.
    #[serde(default, with = "option_duration_millis")]
    pub time_budget: Option<Duration>,
    /// Ceiling on recorded cost units for this run.
    #[serde(default)]
    pub cost_budget: Option<u64>,
    #[serde(default = "default_confidence_level")]
    pub confidence_level: f64,
    #[serde(default)]
    pub sidedness: IntervalSidedness,
    #[serde(default)]
    pub early_termination: Option<EarlyTermination>,
}

const fn default_concurrency() -> usize {
    1
}

const fn default_confidence_level() -> f64 {
    0.95
}

impl Default for ExecutionPolicy {
    fn default() -> Self {
        Self {
            samples: 100,
            warmup: 0,
            concurrency: default_concurrency(),
            pacing: PacingConstraint::None,
            time_budget: None,
            cost_budget: None,
            confidence_level: default_confidence_level(),
            sidedness: IntervalSidedness::TwoSided,
            early_termination: None,
        }
    }
}

impl ExecutionPolicy {
    pub fn new(samples: u32) -> Self {
        Self {
            samples,
            ..Self::default()
        }
    }

    pub fn with_warmup(mut self, warmup: u32) -> Self {
        self.warmup = warmup;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_pacing(mut self, pacing: PacingConstraint) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = Some(budget);
        self
    }

    pub fn with_cost_budget(mut self, budget: u64) -> Self {
        self.cost_budget = Some(budget);
        self
    }

    pub fn with_confidence(mut self, level: f64, sidedness: IntervalSidedness) -> Self {
        self.confidence_level = level;
        self.sidedness = sidedness;
        self
    }

    pub fn with_early_termination(mut self, early: EarlyTermination) -> Self {
        self.early_termination = Some(early);
        self
    }

    /// Reject policies that cannot be executed.
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.samples == 0 {
            return Err(PolicyError::InvalidSampleCount(self.samples));
        }

        if self.concurrency == 0 {
            return Err(PolicyError::InvalidConcurrency(self.concurrency));
        }

        if self.concurrency > MAX_CONCURRENCY {
            return Err(PolicyError::ConcurrencyTooHigh {
                requested: self.concurrency,
                max: MAX_CONCURRENCY,
            });
        }

        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(PolicyError::InvalidConfidenceLevel(self.confidence_level));
        }

        if let PacingConstraint::RateWindow {
            max_samples,
            window,
        } = self.pacing
        {
            if max_samples == 0 || window.is_zero() {
                return Err(PolicyError::InvalidRateWindow {
                    max_samples,
                    window_ms: window.as_millis(),
                });
            }
        }

        if self.time_budget.is_some_and(|b| b.is_zero()) {
            return Err(PolicyError::ZeroTimeBudget);
        }

        if self.cost_budget == Some(0) {
            return Err(PolicyError::ZeroCostBudget);
        }

        if let Some(early) = self.early_termination {
            if !(0.0..=1.0).contains(&early.pass_threshold) {
                return Err(PolicyError::InvalidPassThreshold(early.pass_threshold));
            }
        }

        Ok(())
    }
}
