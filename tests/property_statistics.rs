use std::collections::BTreeMap;
use std::time::Duration;

use probatio::domain::models::{CapturedFailure, Outcome};
use probatio::services::Aggregator;
use probatio::{derive_threshold, IntervalSidedness, Statistics};
use proptest::prelude::*;

const CATEGORIES: [&str; 3] = ["timeout", "mismatch", "probe_error"];

/// (success, failure category, cost, latency ms)
fn outcome_spec() -> impl Strategy<Value = (bool, usize, u64, u64)> {
    (any::<bool>(), 0..CATEGORIES.len(), 0u64..50, 0u64..500)
}

fn build(specs: &[(bool, usize, u64, u64)]) -> Vec<Outcome> {
    specs
        .iter()
        .enumerate()
        .map(|(index, &(success, category, cost, ms))| {
            let duration = Duration::from_millis(ms);
            let outcome = if success {
                Outcome::succeeded(index, duration)
            } else {
                Outcome::failed(
                    index,
                    duration,
                    CapturedFailure::new(CATEGORIES[category], "generated"),
                )
            };
            outcome.with_cost(cost)
        })
        .collect()
}

fn sidedness() -> impl Strategy<Value = IntervalSidedness> {
    prop_oneof![
        Just(IntervalSidedness::TwoSided),
        Just(IntervalSidedness::OneSidedLower)
    ]
}

proptest! {
    /// Property: folding is order-independent
    ///
    /// Any permutation of the same outcomes yields identical statistics.
    #[test]
    fn prop_fold_order_independent(
        (original, shuffled) in prop::collection::vec(outcome_spec(), 0..200)
            .prop_flat_map(|specs| (Just(specs.clone()), Just(specs).prop_shuffle()))
    ) {
        let a = Aggregator::fold(&build(&original), 0.95, IntervalSidedness::TwoSided);
        let b = Aggregator::fold(&build(&shuffled), 0.95, IntervalSidedness::TwoSided);
        prop_assert_eq!(a, b);
    }

    /// Property: counts are consistent after folding
    #[test]
    fn prop_fold_counts_consistent(specs in prop::collection::vec(outcome_spec(), 1..200)) {
        let stats = Aggregator::fold(&build(&specs), 0.9, IntervalSidedness::TwoSided);
        let categorized: u64 = stats.failures_by_category.values().sum();

        prop_assert_eq!(stats.sample_count, specs.len() as u64);
        prop_assert_eq!(stats.success_count + stats.failure_count, stats.sample_count);
        prop_assert_eq!(categorized, stats.failure_count);
        prop_assert_eq!(stats.total_cost_units, specs.iter().map(|s| s.2).sum::<u64>());
    }

    /// Property: 0 <= lower <= observed rate <= upper <= 1
    #[test]
    fn prop_interval_brackets_rate(
        (successes, samples) in (1u64..5_000).prop_flat_map(|n| (0..=n, Just(n))),
        level in 0.5f64..0.999,
        sidedness in sidedness(),
    ) {
        let stats =
            Statistics::from_counts(successes, samples, BTreeMap::new(), 0, level, sidedness);
        let ci = stats.confidence_interval;

        prop_assert!(ci.lower >= 0.0, "lower {} < 0", ci.lower);
        prop_assert!(
            ci.lower <= stats.observed_rate,
            "lower {} > rate {}",
            ci.lower,
            stats.observed_rate
        );
        prop_assert!(
            stats.observed_rate <= ci.upper,
            "rate {} > upper {}",
            stats.observed_rate,
            ci.upper
        );
        prop_assert!(ci.upper <= 1.0, "upper {} > 1", ci.upper);
    }

    /// Property: raising the confidence level never raises the threshold
    #[test]
    fn prop_threshold_non_increasing_in_confidence(
        (successes, samples) in (1u64..2_000).prop_flat_map(|n| (0..=n, Just(n))),
        test_samples in 1u32..1_000,
        low in 0.5f64..0.98,
        delta in 0.001f64..0.019,
    ) {
        let baseline = Statistics::from_counts(
            successes,
            samples,
            BTreeMap::new(),
            0,
            0.95,
            IntervalSidedness::TwoSided,
        );
        let high = low + delta;

        let t_low = derive_threshold(&baseline, test_samples, low).unwrap();
        let t_high = derive_threshold(&baseline, test_samples, high).unwrap();

        prop_assert!(t_high <= t_low + 1e-12, "threshold rose from {} to {}", t_low, t_high);
        prop_assert!((0.0..=baseline.observed_rate).contains(&t_high));
    }
}
