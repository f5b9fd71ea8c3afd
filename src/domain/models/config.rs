use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::budget::ScopeCeilings;
use super::policy::{ExecutionPolicy, PacingConstraint};
use super::statistics::IntervalSidedness;
use crate::domain::errors::PolicyError;

/// Main configuration structure for probatio
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EngineConfig {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Defaults for execution policies built from configuration
    #[serde(default)]
    pub execution: ExecutionDefaults,

    /// Global budget ceilings applied to the root ledger scope
    #[serde(default)]
    pub budget: BudgetConfig,

    /// Audit trail configuration
    #[serde(default)]
    pub audit: AuditConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files; stdout only when unset
    #[serde(default)]
    pub log_dir: Option<String>,

    /// Rolling file rotation: daily, hourly or never
    #[serde(default = "default_log_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_log_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_log_rotation(),
        }
    }
}

/// Execution defaults, the declarative form of an [`ExecutionPolicy`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ExecutionDefaults {
    /// Measured samples per run
    #[serde(default = "default_samples")]
    pub samples: u32,

    /// Warmup samples per run
    #[serde(default)]
    pub warmup: u32,

    /// Concurrent workers (1 = sequential)
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Confidence level for intervals
    #[serde(default = "default_confidence_level")]
    pub confidence_level: f64,

    /// Report one-sided lower bounds instead of two-sided intervals
    #[serde(default)]
    pub one_sided: bool,

    /// Aggregate rate ceilings; the most restrictive one wins
    #[serde(default)]
    pub max_samples_per_second: Option<u32>,
    #[serde(default)]
    pub max_samples_per_minute: Option<u32>,
    #[serde(default)]
    pub max_samples_per_hour: Option<u32>,

    /// Minimum delay between dispatches in milliseconds
    #[serde(default)]
    pub min_delay_ms: Option<u64>,

    /// Per-run time budget in milliseconds
    #[serde(default)]
    pub time_budget_ms: Option<u64>,

    /// Per-run cost budget in cost units
    #[serde(default)]
    pub cost_budget: Option<u64>,
}

const fn default_samples() -> u32 {
    100
}

const fn default_concurrency() -> usize {
    1
}

const fn default_confidence_level() -> f64 {
    0.95
}

impl Default for ExecutionDefaults {
    fn default() -> Self {
        Self {
            samples: default_samples(),
            warmup: 0,
            concurrency: default_concurrency(),
            confidence_level: default_confidence_level(),
            one_sided: false,
            max_samples_per_second: None,
            max_samples_per_minute: None,
            max_samples_per_hour: None,
            min_delay_ms: None,
            time_budget_ms: None,
            cost_budget: None,
        }
    }
}

impl ExecutionDefaults {
    /// Combine every configured rate and delay into one constraint.
    pub fn pacing(&self) -> PacingConstraint {
        let candidates = [
            self.max_samples_per_second.map(PacingConstraint::per_second),
            self.max_samples_per_minute.map(PacingConstraint::per_minute),
            self.max_samples_per_hour.map(PacingConstraint::per_hour),
            self.min_delay_ms
                .map(|ms| PacingConstraint::fixed_delay(Duration::from_millis(ms))),
        ];

        candidates
            .into_iter()
            .flatten()
            .fold(PacingConstraint::None, PacingConstraint::most_restrictive)
    }

    /// Build and validate the execution policy these defaults describe.
    pub fn to_policy(&self) -> Result<ExecutionPolicy, PolicyError> {
        let sidedness = if self.one_sided {
            IntervalSidedness::OneSidedLower
        } else {
            IntervalSidedness::TwoSided
        };

        let policy = ExecutionPolicy {
            samples: self.samples,
            warmup: self.warmup,
            concurrency: self.concurrency,
            pacing: self.pacing(),
            time_budget: self.time_budget_ms.map(Duration::from_millis),
            cost_budget: self.cost_budget,
            confidence_level: self.confidence_level,
            sidedness,
            early_termination: None,
        };
        policy.validate()?;
        Ok(policy)
    }
}

/// Global budget ceilings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BudgetConfig {
    /// Global time budget in milliseconds
    #[serde(default)]
    pub time_budget_ms: Option<u64>,

    /// Global cost budget in cost units
    #[serde(default)]
    pub cost_budget: Option<u64>,
}

impl BudgetConfig {
    pub fn ceilings(&self) -> ScopeCeilings {
        ScopeCeilings {
            time: self.time_budget_ms.map(Duration::from_millis),
            cost: self.cost_budget,
        }
    }
}

/// Audit trail configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AuditConfig {
    /// JSON-lines audit file; auditing is off when unset
    #[serde(default)]
    pub path: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pacing_combines_most_restrictive() {
        let defaults = ExecutionDefaults {
            max_samples_per_second: Some(10),
            max_samples_per_minute: Some(60),
            min_delay_ms: Some(200),
            ..Default::default()
        };
        // 60/min = 1s interval beats 200ms and 100ms
        assert_eq!(defaults.pacing(), PacingConstraint::per_minute(60));
    }

    #[test]
    fn test_no_pacing_by_default() {
        assert_eq!(ExecutionDefaults::default().pacing(), PacingConstraint::None);
    }

    #[test]
    fn test_to_policy_validates() {
        let defaults = ExecutionDefaults {
            concurrency: 0,
            ..Default::default()
        };
        assert!(matches!(
            defaults.to_policy(),
            Err(PolicyError::InvalidConcurrency(0))
        ));
    }

    #[test]
    fn test_to_policy_carries_budgets() {
        let defaults = ExecutionDefaults {
            time_budget_ms: Some(5_000),
            cost_budget: Some(1_000),
            one_sided: true,
            ..Default::default()
        };
        let policy = defaults.to_policy().unwrap();
        assert_eq!(policy.time_budget, Some(Duration::from_secs(5)));
        assert_eq!(policy.cost_budget, Some(1_000));
        assert_eq!(policy.sidedness, IntervalSidedness::OneSidedLower);
    }
}
