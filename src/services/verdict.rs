//! Pass/fail verdicts against a threshold, and the early-stop rule.

use serde::{Deserialize, Serialize};

use crate::domain::models::{EarlyStop, EarlyTermination, RunReport, RunState, Statistics};

/// What a verdict does with a run that stopped on budget exhaustion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetExhaustionBehavior {
    /// An exhausted run fails regardless of its partial statistics.
    #[default]
    Fail,
    /// Judge the samples that did complete.
    EvaluatePartial,
}

/// Outcome of comparing observed statistics to a threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub passed: bool,
    pub observed_rate: f64,
    pub threshold: f64,
    /// `observed_rate - threshold`; negative when below.
    pub margin: f64,
    pub samples_evaluated: u64,
    /// Whether the verdict was reached on fewer samples than planned.
    pub partial: bool,
    pub explanation: String,
}

impl Verdict {
    /// Judge `statistics` against `threshold`.
    ///
    /// `exhaustion` carries the exhaustion reason when the run was cut short
    /// by the budget.
    pub fn evaluate(
        statistics: &Statistics,
        threshold: f64,
        exhaustion: Option<&str>,
        behavior: BudgetExhaustionBehavior,
    ) -> Self {
        let observed_rate = statistics.observed_rate;
        let margin = observed_rate - threshold;
        let base = |passed: bool, explanation: String| Self {
            passed,
            observed_rate,
            threshold,
            margin,
            samples_evaluated: statistics.sample_count,
            partial: exhaustion.is_some(),
            explanation,
        };

        if let Some(reason) = exhaustion {
            if behavior == BudgetExhaustionBehavior::Fail {
                return base(false, format!("budget exhausted before completion: {reason}"));
            }
        }

        if statistics.is_empty() {
            return base(false, "no measured samples".to_string());
        }

        let passed = observed_rate >= threshold;
        let explanation = format!(
            "observed {:.4} over {} samples {} threshold {:.4}",
            observed_rate,
            statistics.sample_count,
            if passed { "meets" } else { "is below" },
            threshold
        );
        base(passed, explanation)
    }

    /// Judge a finished run. An early stop that proved the pass impossible or
    /// guaranteed decides the verdict directly.
    pub fn for_report(
        report: &RunReport,
        threshold: f64,
        behavior: BudgetExhaustionBehavior,
    ) -> Self {
        let exhaustion = (report.state == RunState::BudgetExhausted).then(|| {
            report
                .exhaustion_reason
                .as_deref()
                .unwrap_or("budget exhausted")
        });
        let mut verdict = Self::evaluate(&report.statistics, threshold, exhaustion, behavior);

        if let Some(stop) = report.early_stop {
            verdict.partial = true;
            match stop {
                EarlyStop::PassImpossible => {
                    verdict.passed = false;
                    verdict.explanation = format!(
                        "stopped after {} samples: threshold {:.4} unreachable",
                        report.statistics.sample_count, threshold
                    );
                }
                EarlyStop::PassGuaranteed => {
                    verdict.passed = true;
                    verdict.explanation = format!(
                        "stopped after {} samples: threshold {:.4} already guaranteed",
                        report.statistics.sample_count, threshold
                    );
                }
            }
        }

        verdict
    }
}

/// Successes needed out of `planned` samples to reach `pass_threshold`.
pub fn required_successes(pass_threshold: f64, planned: u32) -> u64 {
    let exact = pass_threshold * f64::from(planned);
    // Tolerate float noise such as 0.8 * 10 = 8.000000000000002.
    let required = (exact - 1e-9).ceil().max(0.0);
    (required as u64).min(u64::from(planned))
}

/// Whether the remaining samples can still change the verdict.
pub fn check_early_stop(
    successes: u64,
    completed: u64,
    planned: u32,
    early: &EarlyTermination,
) -> Option<EarlyStop> {
    let required = required_successes(early.pass_threshold, planned);
    let remaining = u64::from(planned).saturating_sub(completed);

    if successes + remaining < required {
        return Some(EarlyStop::PassImpossible);
    }
    if early.stop_when_guaranteed && successes >= required && remaining > 0 {
        return Some(EarlyStop::PassGuaranteed);
    }
    None
}
