//! Aggregate statistics over a set of outcomes.
//!
//! The confidence interval is the Wilson score interval for a binomial
//! proportion. Unlike the normal approximation it stays inside `[0, 1]` and
//! remains informative at small sample counts and at observed rates of exactly
//! 0 or 1, which are the common cases when characterizing a mostly-working
//! system.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Whether a confidence interval bounds both sides of the observed rate or
/// only the lower side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntervalSidedness {
    #[default]
    TwoSided,
    /// Lower bound only; the upper bound is reported as 1.0.
    OneSidedLower,
}

/// Closed-form confidence interval around an observed success rate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub lower: f64,
    pub upper: f64,
    /// Confidence level in `(0, 1)`, e.g. `0.95`.
    pub level: f64,
    pub sidedness: IntervalSidedness,
}

impl ConfidenceInterval {
    /// Wilson score interval for `successes` out of `samples`.
    ///
    /// With zero samples nothing is known and the interval is `[0, 1]`.
    pub fn wilson(successes: u64, samples: u64, level: f64, sidedness: IntervalSidedness) -> Self {
        if samples == 0 {
            return Self {
                lower: 0.0,
                upper: 1.0,
                level,
                sidedness,
            };
        }

        let p = successes.min(samples) as f64 / samples as f64;
        let z = z_score(level, sidedness);
        let lower = wilson_lower_bound(p, samples as f64, z);
        let upper = match sidedness {
            IntervalSidedness::TwoSided => wilson_upper_bound(p, samples as f64, z),
            IntervalSidedness::OneSidedLower => 1.0,
        };

        Self {
            lower,
            upper,
            level,
            sidedness,
        }
    }

    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }

    pub fn contains(&self, rate: f64) -> bool {
        self.lower <= rate && rate <= self.upper
    }
}

/// Immutable aggregate over a sequence of outcomes.
///
/// `success_count <= sample_count` always holds, and the interval satisfies
/// `0 <= lower <= observed_rate <= upper <= 1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub sample_count: u64,
    pub success_count: u64,
    pub failure_count: u64,
    /// `success_count / sample_count`, or 0 with no samples.
    pub observed_rate: f64,
    /// `sqrt(p(1-p)/n)`, or 0 with no samples.
    pub standard_error: f64,
    pub confidence_interval: ConfidenceInterval,
    /// Failure count per category. Ordered so equality is deterministic.
    pub failures_by_category: BTreeMap<String, u64>,
    /// Sum of cost units reported by measured samples.
    pub total_cost_units: u64,
}

impl Statistics {
    /// Build statistics from raw counts.
    ///
    /// `success_count` is clamped to `sample_count`.
    pub fn from_counts(
        success_count: u64,
        sample_count: u64,
        failures_by_category: BTreeMap<String, u64>,
        total_cost_units: u64,
        level: f64,
        sidedness: IntervalSidedness,
    ) -> Self {
        let success_count = success_count.min(sample_count);
        let (observed_rate, standard_error) = if sample_count == 0 {
            (0.0, 0.0)
        } else {
            let n = sample_count as f64;
            let p = success_count as f64 / n;
            (p, (p * (1.0 - p) / n).sqrt())
        };

        let mut confidence_interval =
            ConfidenceInterval::wilson(success_count, sample_count, level, sidedness);
        if sample_count > 0 {
            // Guard the ordering invariant against floating-point drift at p = 0 or 1.
            confidence_interval.lower = confidence_interval.lower.min(observed_rate);
            confidence_interval.upper = confidence_interval.upper.max(observed_rate);
        }

        Self {
            sample_count,
            success_count,
            failure_count: sample_count - success_count,
            observed_rate,
            standard_error,
            confidence_interval,
            failures_by_category,
            total_cost_units,
        }
    }

    /// Statistics over zero samples.
    pub fn empty(level: f64, sidedness: IntervalSidedness) -> Self {
        Self::from_counts(0, 0, BTreeMap::new(), 0, level, sidedness)
    }

    pub fn is_empty(&self) -> bool {
        self.sample_count == 0
    }
}

// ---------------------------------------------------------------------------
// Wilson score math
// ---------------------------------------------------------------------------

/// Standard-normal quantile matching a confidence level.
///
/// Two-sided intervals split the tail mass, one-sided bounds put it all on
/// one side.
pub fn z_score(level: f64, sidedness: IntervalSidedness) -> f64 {
    let level = level.clamp(f64::EPSILON, 1.0 - f64::EPSILON);
    match sidedness {
        IntervalSidedness::TwoSided => inverse_normal_cdf(1.0 - (1.0 - level) / 2.0),
        IntervalSidedness::OneSidedLower => inverse_normal_cdf(level),
    }
}

/// Lower Wilson bound for observed rate `p` over `n` samples at quantile `z`.
pub fn wilson_lower_bound(p: f64, n: f64, z: f64) -> f64 {
    let (center, spread) = wilson_center_spread(p, n, z);
    (center - spread).clamp(0.0, 1.0)
}

/// Upper Wilson bound for observed rate `p` over `n` samples at quantile `z`.
pub fn wilson_upper_bound(p: f64, n: f64, z: f64) -> f64 {
    let (center, spread) = wilson_center_spread(p, n, z);
    (center + spread).clamp(0.0, 1.0)
}

fn wilson_center_spread(p: f64, n: f64, z: f64) -> (f64, f64) {
    let z2 = z * z;
    let denominator = 1.0 + z2 / n;
    let center = (p + z2 / (2.0 * n)) / denominator;
    let spread = (z / denominator) * ((p * (1.0 - p) / n) + (z2 / (4.0 * n * n))).sqrt();
    (center, spread)
}

/// Inverse of the standard normal CDF (Acklam's rational approximation,
/// relative error below 1.2e-9).
pub fn inverse_normal_cdf(p: f64) -> f64 {
    const A: [f64; 6] = [
        -3.969_683_028_665_376e1,
        2.209_460_984_245_205e2,
        -2.759_285_104_469_687e2,
        1.383_577_518_672_69e2,
        -3.066_479_806_614_716e1,
        2.506_628_277_459_239,
    ];
    const B: [f64; 5] = [
        -5.447_609_879_822_406e1,
        1.615_858_368_580_409e2,
        -1.556_989_798_598_866e2,
        6.680_131_188_771_972e1,
        -1.328_068_155_288_572e1,
    ];
    const C: [f64; 6] = [
        -7.784_894_002_430_293e-3,
        -3.223_964_580_411_365e-1,
        -2.400_758_277_161_838,
        -2.549_732_539_343_734,
        4.374_664_141_464_968,
        2.938_163_982_698_783,
    ];
    const D: [f64; 4] = [
        7.784_695_709_041_462e-3,
        3.224_671_290_700_398e-1,
        2.445_134_137_142_996,
        3.754_408_661_907_416,
    ];
    const P_LOW: f64 = 0.02425;
    const P_HIGH: f64 = 1.0 - P_LOW;

    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }

    let tail = |q: f64| {
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    };

    if p < P_LOW {
        tail((-2.0 * p.ln()).sqrt())
    } else if p <= P_HIGH {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        -tail((-2.0 * (1.0 - p).ln()).sqrt())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inverse_normal_cdf_known_quantiles() {
        assert!((inverse_normal_cdf(0.5)).abs() < 1e-9);
        assert!((inverse_normal_cdf(0.975) - 1.959_964).abs() < 1e-5);
        assert!((inverse_normal_cdf(0.95) - 1.644_854).abs() < 1e-5);
        assert!((inverse_normal_cdf(0.01) + 2.326_348).abs() < 1e-5);
    }

    #[test]
    fn test_z_score_sidedness() {
        assert!((z_score(0.95, IntervalSidedness::TwoSided) - 1.96).abs() < 1e-3);
        assert!((z_score(0.95, IntervalSidedness::OneSidedLower) - 1.645).abs() < 1e-3);
    }

    #[test]
    fn test_wilson_interval_80_of_100() {
        let ci = ConfidenceInterval::wilson(80, 100, 0.95, IntervalSidedness::TwoSided);
        assert!(ci.lower > 0.70 && ci.lower < 0.73, "lower = {}", ci.lower);
        assert!(ci.upper > 0.86 && ci.upper < 0.88, "upper = {}", ci.upper);
    }

    #[test]
    fn test_wilson_interval_zero_samples_is_unit_interval() {
        let ci = ConfidenceInterval::wilson(0, 0, 0.95, IntervalSidedness::TwoSided);
        assert_eq!(ci.lower, 0.0);
        assert_eq!(ci.upper, 1.0);
    }

    #[test]
    fn test_extreme_rates_stay_in_bounds() {
        let all = Statistics::from_counts(
            10,
            10,
            BTreeMap::new(),
            0,
            0.95,
            IntervalSidedness::TwoSided,
        );
        assert_eq!(all.observed_rate, 1.0);
        assert_eq!(all.confidence_interval.upper, 1.0);
        assert!(all.confidence_interval.lower < 1.0);
        assert_eq!(all.standard_error, 0.0);

        let none =
            Statistics::from_counts(0, 10, BTreeMap::new(), 0, 0.95, IntervalSidedness::TwoSided);
        assert_eq!(none.confidence_interval.lower, 0.0);
        assert!(none.confidence_interval.upper > 0.0);
        assert_eq!(none.failure_count, 10);
    }

    #[test]
    fn test_one_sided_upper_is_one() {
        let stats = Statistics::from_counts(
            40,
            50,
            BTreeMap::new(),
            0,
            0.95,
            IntervalSidedness::OneSidedLower,
        );
        assert_eq!(stats.confidence_interval.upper, 1.0);
        let two_sided = ConfidenceInterval::wilson(40, 50, 0.95, IntervalSidedness::TwoSided);
        // One-sided lower bound is tighter than the two-sided one at the same level.
        assert!(stats.confidence_interval.lower > two_sided.lower);
    }

    #[test]
    fn test_success_count_clamped_to_samples() {
        let stats =
            Statistics::from_counts(12, 10, BTreeMap::new(), 0, 0.9, IntervalSidedness::TwoSided);
        assert_eq!(stats.success_count, 10);
        assert_eq!(stats.failure_count, 0);
    }
}
