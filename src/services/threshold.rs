//! Pass/fail threshold derivation from a baseline.
//!
//! The threshold is the one-sided lower Wilson bound of the baseline's
//! observed rate, evaluated at the *test's* sample count and the requested
//! confidence. A smaller test run gets a looser threshold because it has less
//! power to tell a real regression from noise. Raising the confidence widens
//! the bound, so the threshold never goes up as confidence increases.
//!
//! Pure: the same baseline can be re-parameterized for any number of test
//! configurations without re-running it.

use serde::{Deserialize, Serialize};

use crate::domain::errors::ThresholdError;
use crate::domain::models::statistics::{wilson_lower_bound, z_score};
use crate::domain::models::{IntervalSidedness, Statistics};

/// Threshold plus the inputs it was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdDerivation {
    pub baseline_rate: f64,
    pub baseline_samples: u64,
    pub test_samples: u32,
    pub confidence_level: f64,
    pub threshold: f64,
}

impl ThresholdDerivation {
    pub fn derive(
        baseline: &Statistics,
        test_samples: u32,
        confidence_level: f64,
    ) -> Result<Self, ThresholdError> {
        if baseline.sample_count == 0 {
            return Err(ThresholdError::EmptyBaseline);
        }
        if test_samples == 0 {
            return Err(ThresholdError::ZeroTestSamples);
        }
        if !(confidence_level > 0.0 && confidence_level < 1.0) {
            return Err(ThresholdError::InvalidConfidenceLevel(confidence_level));
        }

        let z = z_score(confidence_level, IntervalSidedness::OneSidedLower);
        let threshold = wilson_lower_bound(baseline.observed_rate, f64::from(test_samples), z)
            .min(baseline.observed_rate);

        Ok(Self {
            baseline_rate: baseline.observed_rate,
            baseline_samples: baseline.sample_count,
            test_samples,
            confidence_level,
            threshold,
        })
    }
}

/// Minimum success rate a test of `test_samples` samples must reach to be
/// consistent with `baseline` at `confidence_level`.
pub fn derive_threshold(
    baseline: &Statistics,
    test_samples: u32,
    confidence_level: f64,
) -> Result<f64, ThresholdError> {
    ThresholdDerivation::derive(baseline, test_samples, confidence_level).map(|d| d.threshold)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn baseline(successes: u64, samples: u64) -> Statistics {
        Statistics::from_counts(
            successes,
            samples,
            BTreeMap::new(),
            0,
            0.95,
            IntervalSidedness::TwoSided,
        )
    }

    #[test]
    fn test_threshold_below_baseline_rate() {
        let threshold = derive_threshold(&baseline(900, 1000), 100, 0.95).unwrap();
        assert!(threshold < 0.9);
        // One-sided 95% lower Wilson bound for p = 0.9, n = 100.
        assert!(threshold > 0.83 && threshold < 0.86, "threshold = {threshold}");
    }

    #[test]
    fn test_higher_confidence_never_raises_threshold() {
        let base = baseline(85, 100);
        let mut previous = f64::INFINITY;
        for level in [0.5, 0.8, 0.9, 0.95, 0.99, 0.999] {
            let t = derive_threshold(&base, 50, level).unwrap();
            assert!(t <= previous, "threshold rose at level {level}");
            previous = t;
        }
    }

    #[test]
    fn test_more_test_samples_tighten_threshold() {
        let base = baseline(90, 100);
        let small = derive_threshold(&base, 20, 0.95).unwrap();
        let large = derive_threshold(&base, 2000, 0.95).unwrap();
        assert!(large > small);
    }

    #[test]
    fn test_rejects_empty_baseline_and_bad_inputs() {
        assert_eq!(
            derive_threshold(&baseline(0, 0), 10, 0.95),
            Err(ThresholdError::EmptyBaseline)
        );
        assert_eq!(
            derive_threshold(&baseline(5, 10), 0, 0.95),
            Err(ThresholdError::ZeroTestSamples)
        );
        assert!(matches!(
            derive_threshold(&baseline(5, 10), 10, 1.0),
            Err(ThresholdError::InvalidConfidenceLevel(_))
        ));
    }

    #[test]
    fn test_derivation_keeps_provenance() {
        let d = ThresholdDerivation::derive(&baseline(80, 100), 40, 0.9).unwrap();
        assert_eq!(d.baseline_samples, 100);
        assert_eq!(d.test_samples, 40);
        assert!((d.baseline_rate - 0.8).abs() < 1e-12);
    }
}
