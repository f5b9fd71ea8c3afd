//! Concurrency properties of the budget ledger.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use probatio::domain::models::LedgerSummary;
use probatio::domain::ports::SummarySink;
use probatio::{BudgetLedger, RunKind, ScopeCeilings, ScopeLevel, ScopeSpec};
use proptest::prelude::*;

#[derive(Debug, Clone, Copy)]
enum Op {
    Elapsed(u64),
    Cost(u64),
    Sample,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u64..10_000).prop_map(Op::Elapsed),
        (0u64..1_000).prop_map(Op::Cost),
        Just(Op::Sample),
    ]
}

const KINDS: [RunKind; 3] = [RunKind::Measure, RunKind::Test, RunKind::Optimize];

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: no lost updates
    ///
    /// Totals after N threads record through sibling scopes equal the
    /// arithmetic sum of every recorded value.
    #[test]
    fn prop_concurrent_totals_are_exact(
        per_thread in prop::collection::vec(prop::collection::vec(op(), 0..200), 1..8)
    ) {
        let ledger = BudgetLedger::unbounded("prop");
        let suite = ledger
            .root()
            .reserve_child(ScopeSpec::new(ScopeLevel::Suite, "suite"));

        thread::scope(|s| {
            for (i, ops) in per_thread.iter().enumerate() {
                let scope = suite.reserve_child(
                    ScopeSpec::new(ScopeLevel::Method, format!("worker-{i}"))
                        .with_run_kind(KINDS[i % KINDS.len()]),
                );
                s.spawn(move || {
                    for op in ops {
                        match *op {
                            Op::Elapsed(us) => scope.record_elapsed(Duration::from_micros(us)),
                            Op::Cost(units) => scope.record_cost(units),
                            Op::Sample => scope.record_sample(),
                        }
                    }
                });
            }
        });

        let all = per_thread.iter().flatten();
        let elapsed: u64 = all.clone().map(|op| match op { Op::Elapsed(us) => *us, _ => 0 }).sum();
        let cost: u64 = all.clone().map(|op| match op { Op::Cost(c) => *c, _ => 0 }).sum();
        let samples = all.filter(|op| matches!(op, Op::Sample)).count() as u64;

        let summary = ledger.summary();
        prop_assert_eq!(summary.total_elapsed, Duration::from_micros(elapsed));
        prop_assert_eq!(summary.total_cost_units, cost);
        prop_assert_eq!(summary.total_samples, samples);
        prop_assert_eq!(summary.samples_by_kind.values().sum::<u64>(), samples);

        let suite_totals = suite.totals();
        prop_assert_eq!(suite_totals.cost_units, cost);
        prop_assert_eq!(suite_totals.samples, samples);
    }
}

#[derive(Default)]
struct Collect(Mutex<Vec<LedgerSummary>>);

impl SummarySink for Collect {
    fn emit(&self, summary: &LedgerSummary) {
        self.0.lock().unwrap().push(summary.clone());
    }
}

#[test]
fn test_root_summary_emitted_once_under_racing_closers() {
    let sink = Arc::new(Collect::default());
    let ledger = Arc::new(
        BudgetLedger::new("race", ScopeCeilings::unbounded().with_cost(1_000_000))
            .with_sink(sink.clone()),
    );

    thread::scope(|s| {
        for _ in 0..8 {
            let ledger = ledger.clone();
            s.spawn(move || {
                ledger.root().record_cost(5);
                ledger.root().record_sample();
                let _ = ledger.close();
            });
        }
    });
    drop(ledger);

    let emitted = sink.0.lock().unwrap();
    assert_eq!(emitted.len(), 1);
    assert!(emitted[0].total_samples >= 1);
}

#[test]
fn test_sibling_exhaustion_visible_to_all_children() {
    let ledger = BudgetLedger::new("shared", ScopeCeilings::unbounded().with_cost(100));
    let a = ledger
        .root()
        .reserve_child(ScopeSpec::new(ScopeLevel::Method, "a"));
    let b = ledger
        .root()
        .reserve_child(ScopeSpec::new(ScopeLevel::Method, "b"));

    thread::scope(|s| {
        s.spawn(|| (0..10).for_each(|_| a.record_cost(7)));
        s.spawn(|| (0..10).for_each(|_| b.record_cost(7)));
    });

    assert!(a.is_exhausted());
    assert!(b.is_exhausted());
    assert_eq!(ledger.root().remaining().cost_left, Some(0));
}
