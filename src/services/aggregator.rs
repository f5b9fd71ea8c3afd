//! Folds outcomes into [`Statistics`].
//!
//! The aggregator only keeps counts and sums, so the result is independent of
//! the order outcomes are pushed in. Snapshots can be taken at any point to
//! report partial statistics mid-run.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::domain::models::{IntervalSidedness, LatencySummary, Outcome, Statistics};

/// Incremental outcome accumulator.
#[derive(Debug, Clone)]
pub struct Aggregator {
    level: f64,
    sidedness: IntervalSidedness,
    samples: u64,
    successes: u64,
    failures_by_category: BTreeMap<String, u64>,
    cost_units: u64,
    durations: Vec<Duration>,
}

impl Aggregator {
    pub fn new(level: f64, sidedness: IntervalSidedness) -> Self {
        Self {
            level,
            sidedness,
            samples: 0,
            successes: 0,
            failures_by_category: BTreeMap::new(),
            cost_units: 0,
            durations: Vec::new(),
        }
    }

    /// Add one outcome. Warmup outcomes are ignored.
    pub fn push(&mut self, outcome: &Outcome) {
        if outcome.warmup {
            return;
        }

        self.samples += 1;
        if outcome.success {
            self.successes += 1;
        } else {
            let category = outcome
                .failure_category()
                .unwrap_or(crate::domain::errors::CategorizedFailure::DEFAULT_CATEGORY);
            *self
                .failures_by_category
                .entry(category.to_string())
                .or_insert(0) += 1;
        }
        self.cost_units = self
            .cost_units
            .saturating_add(outcome.cost_units.unwrap_or(0));
        self.durations.push(outcome.duration);
    }

    pub fn extend<'a>(&mut self, outcomes: impl IntoIterator<Item = &'a Outcome>) {
        for outcome in outcomes {
            self.push(outcome);
        }
    }

    pub fn sample_count(&self) -> u64 {
        self.samples
    }

    pub fn success_count(&self) -> u64 {
        self.successes
    }

    pub fn failure_count(&self) -> u64 {
        self.samples - self.successes
    }

    /// Statistics over everything pushed so far.
    pub fn snapshot(&self) -> Statistics {
        Statistics::from_counts(
            self.successes,
            self.samples,
            self.failures_by_category.clone(),
            self.cost_units,
            self.level,
            self.sidedness,
        )
    }

    pub fn latency(&self) -> LatencySummary {
        LatencySummary::from_durations(&self.durations)
    }

    /// Fold a whole sequence in one call.
    pub fn fold<'a>(
        outcomes: impl IntoIterator<Item = &'a Outcome>,
        level: f64,
        sidedness: IntervalSidedness,
    ) -> Statistics {
        let mut aggregator = Self::new(level, sidedness);
        aggregator.extend(outcomes);
        aggregator.snapshot()
    }
}
