//! Hierarchical budget ledger.
//!
//! Tracks elapsed time, cost units and sample counts across a tree of scopes
//! (global, suite, class, method). Recording into a scope also records into
//! every ancestor, so consumption anywhere in a subtree counts against every
//! ceiling above it.
//!
//! All counters are atomics. No lock is ever held, so concurrent samples can
//! record into the same scope without contention, and nothing blocks while a
//! probe is in flight.
//!
//! The ledger never fails. Callers poll [`ScopeHandle::is_exhausted`] and decide
//! what to do.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::models::{
    LedgerSummary, Remaining, RunKind, ScopeCeilings, ScopeLevel, ScopeTotals,
};
use crate::domain::ports::SummarySink;

// ============================================================================
// Scope specification
// ============================================================================

/// Parameters for reserving a child scope.
#[derive(Debug, Clone)]
pub struct ScopeSpec {
    pub level: ScopeLevel,
    pub label: String,
    pub ceilings: ScopeCeilings,
    /// Run kind samples in this scope are counted under. Inherited from the
    /// parent when unset.
    pub run_kind: Option<RunKind>,
}

impl ScopeSpec {
    pub fn new(level: ScopeLevel, label: impl Into<String>) -> Self {
        Self {
            level,
            label: label.into(),
            ceilings: ScopeCeilings::unbounded(),
            run_kind: None,
        }
    }

    pub fn with_ceilings(mut self, ceilings: ScopeCeilings) -> Self {
        self.ceilings = ceilings;
        self
    }

    pub fn with_run_kind(mut self, kind: RunKind) -> Self {
        self.run_kind = Some(kind);
        self
    }
}

// ============================================================================
// Internal node
// ============================================================================

struct ScopeNode {
    id: Uuid,
    level: ScopeLevel,
    label: String,
    parent: Option<Arc<ScopeNode>>,
    ceilings: ScopeCeilings,
    run_kind: Option<RunKind>,
    elapsed_nanos: AtomicU64,
    cost_units: AtomicU64,
    samples: AtomicU64,
    samples_by_kind: [AtomicU64; RunKind::ALL.len()],
}

impl ScopeNode {
    fn new(
        level: ScopeLevel,
        label: String,
        parent: Option<Arc<ScopeNode>>,
        ceilings: ScopeCeilings,
        run_kind: Option<RunKind>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            level,
            label,
            parent,
            ceilings,
            run_kind,
            elapsed_nanos: AtomicU64::new(0),
            cost_units: AtomicU64::new(0),
            samples: AtomicU64::new(0),
            samples_by_kind: [AtomicU64::new(0), AtomicU64::new(0), AtomicU64::new(0)],
        }
    }

    /// This node followed by every ancestor up to the root.
    fn chain(&self) -> impl Iterator<Item = &ScopeNode> {
        std::iter::successors(Some(self), |node| node.parent.as_deref())
    }

    fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.elapsed_nanos.load(Ordering::Relaxed))
    }

    fn cost(&self) -> u64 {
        self.cost_units.load(Ordering::Relaxed)
    }

    fn exhaustion(&self) -> Option<String> {
        if let Some(ceiling) = self.ceilings.time {
            let elapsed = self.elapsed();
            if elapsed >= ceiling {
                return Some(format!(
                    "{:?} scope '{}' time budget exhausted: {}ms of {}ms",
                    self.level,
                    self.label,
                    elapsed.as_millis(),
                    ceiling.as_millis()
                ));
            }
        }
        if let Some(ceiling) = self.ceilings.cost {
            let cost = self.cost();
            if cost >= ceiling {
                return Some(format!(
                    "{:?} scope '{}' cost budget exhausted: {} of {} units",
                    self.level, self.label, cost, ceiling
                ));
            }
        }
        None
    }
}

// ============================================================================
// ScopeHandle
// ============================================================================

/// Shared handle to one ledger scope. Clone freely; clones refer to the same
/// counters.
#[derive(Clone)]
pub struct ScopeHandle {
    node: Arc<ScopeNode>,
}

impl std::fmt::Debug for ScopeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeHandle")
            .field("id", &self.node.id)
            .field("level", &self.node.level)
            .field("label", &self.node.label)
            .finish()
    }
}

impl ScopeHandle {
    /// Reserve a child scope whose consumption also counts here and above.
    pub fn reserve_child(&self, spec: ScopeSpec) -> ScopeHandle {
        let run_kind = spec.run_kind.or(self.node.run_kind);
        debug!(
            parent = %self.node.label,
            child = %spec.label,
            level = ?spec.level,
            time_ceiling_ms = spec.ceilings.time.map(|t| t.as_millis() as u64),
            cost_ceiling = spec.ceilings.cost,
            "budget scope reserved"
        );
        ScopeHandle {
            node: Arc::new(ScopeNode::new(
                spec.level,
                spec.label,
                Some(self.node.clone()),
                spec.ceilings,
                run_kind,
            )),
        }
    }

    pub fn id(&self) -> Uuid {
        self.node.id
    }

    pub fn label(&self) -> &str {
        &self.node.label
    }

    pub fn level(&self) -> ScopeLevel {
        self.node.level
    }

    pub fn run_kind(&self) -> RunKind {
        self.node.run_kind.unwrap_or(RunKind::Measure)
    }

    pub fn is_root(&self) -> bool {
        self.node.parent.is_none()
    }

    // -------------------------------------------------------------------------
    // Recording
    // -------------------------------------------------------------------------

    pub fn record_elapsed(&self, duration: Duration) {
        let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        for node in self.node.chain() {
            node.elapsed_nanos.fetch_add(nanos, Ordering::Relaxed);
        }
    }

    pub fn record_cost(&self, units: u64) {
        if units == 0 {
            return;
        }
        for node in self.node.chain() {
            node.cost_units.fetch_add(units, Ordering::Relaxed);
        }
    }

    /// Count one executed sample under this scope's run kind.
    pub fn record_sample(&self) {
        let slot = self.run_kind().slot();
        for node in self.node.chain() {
            node.samples.fetch_add(1, Ordering::Relaxed);
            node.samples_by_kind[slot].fetch_add(1, Ordering::Relaxed);
        }
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// Budget left, as the minimum over this scope and all ancestors.
    pub fn remaining(&self) -> Remaining {
        let mut time_left: Option<Duration> = None;
        let mut cost_left: Option<u64> = None;

        for node in self.node.chain() {
            if let Some(ceiling) = node.ceilings.time {
                let left = ceiling.saturating_sub(node.elapsed());
                time_left = Some(time_left.map_or(left, |t| t.min(left)));
            }
            if let Some(ceiling) = node.ceilings.cost {
                let left = ceiling.saturating_sub(node.cost());
                cost_left = Some(cost_left.map_or(left, |c| c.min(left)));
            }
        }

        Remaining {
            time_left,
            cost_left,
        }
    }

    /// Whether this scope or any ancestor has hit a ceiling.
    pub fn is_exhausted(&self) -> bool {
        self.exhaustion_reason().is_some()
    }

    /// Explanation of the first exhausted ceiling, nearest scope first.
    pub fn exhaustion_reason(&self) -> Option<String> {
        self.node.chain().find_map(ScopeNode::exhaustion)
    }

    /// Consumption recorded in this scope and its subtree.
    pub fn totals(&self) -> ScopeTotals {
        ScopeTotals {
            elapsed: self.node.elapsed(),
            cost_units: self.node.cost(),
            samples: self.node.samples.load(Ordering::Relaxed),
        }
    }

    fn samples_by_kind(&self) -> BTreeMap<RunKind, u64> {
        RunKind::ALL
            .iter()
            .map(|kind| {
                (
                    *kind,
                    self.node.samples_by_kind[kind.slot()].load(Ordering::Relaxed),
                )
            })
            .collect()
    }

    /// Release a non-root scope. Counters already propagated to ancestors
    /// stay there.
    pub fn close(self) {
        let totals = self.totals();
        debug!(
            scope = %self.node.label,
            level = ?self.node.level,
            elapsed_ms = totals.elapsed.as_millis() as u64,
            cost_units = totals.cost_units,
            samples = totals.samples,
            "budget scope closed"
        );
    }
}

// ============================================================================
// BudgetLedger
// ============================================================================

/// Owner of the root scope for one top-level run.
///
/// Create one per run and thread its [`root`](Self::root) handle (or children
/// of it) explicitly to whatever records consumption. Closing the ledger, or
/// dropping it, emits the final summary to the sink exactly once.
pub struct BudgetLedger {
    root: ScopeHandle,
    sink: Option<Arc<dyn SummarySink>>,
    closed: AtomicBool,
}

impl BudgetLedger {
    pub fn new(label: impl Into<String>, ceilings: ScopeCeilings) -> Self {
        let root = ScopeHandle {
            node: Arc::new(ScopeNode::new(
                ScopeLevel::Global,
                label.into(),
                None,
                ceilings,
                None,
            )),
        };
        Self {
            root,
            sink: None,
            closed: AtomicBool::new(false),
        }
    }

    pub fn unbounded(label: impl Into<String>) -> Self {
        Self::new(label, ScopeCeilings::unbounded())
    }

    /// Attach the collaborator that receives the final summary.
    pub fn with_sink(mut self, sink: Arc<dyn SummarySink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn root(&self) -> &ScopeHandle {
        &self.root
    }

    /// Reserve a child of `parent`. Equivalent to
    /// [`ScopeHandle::reserve_child`].
    pub fn reserve_scope(parent: &ScopeHandle, spec: ScopeSpec) -> ScopeHandle {
        parent.reserve_child(spec)
    }

    /// Current totals of the whole tree.
    pub fn summary(&self) -> LedgerSummary {
        let totals = self.root.totals();
        LedgerSummary {
            label: self.root.label().to_string(),
            total_elapsed: totals.elapsed,
            total_cost_units: totals.cost_units,
            total_samples: totals.samples,
            samples_by_kind: self.root.samples_by_kind(),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Close the root scope. The first call emits and returns the summary;
    /// later calls return `None`.
    pub fn close(&self) -> Option<LedgerSummary> {
        if self
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return None;
        }

        let summary = self.summary();
        info!(
            ledger = %summary.label,
            total_elapsed_ms = summary.total_elapsed.as_millis() as u64,
            total_cost_units = summary.total_cost_units,
            total_samples = summary.total_samples,
            samples_by_kind = ?summary.samples_by_kind,
            "budget ledger closed"
        );
        if let Some(sink) = &self.sink {
            sink.emit(&summary);
        }
        Some(summary)
    }
}

impl Drop for BudgetLedger {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
