//! Audit trail for engine results
//!
//! Appends one JSON line per event:
//! - Run completed (statistics, state, exhaustion reason)
//! - Iteration committed (configuration, score, status)
//! - Optimization terminated
//! - Threshold derived
//! - Ledger summary (once, when the root scope closes)
//!
//! [`AuditLogger`] implements both outbound ports so it can be handed to the
//! orchestrators and the ledger directly.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::domain::models::{
    IterationRecord, LedgerSummary, RunReport, RunState, TerminationReason, ToRecord,
};
use crate::domain::ports::{ProgressListener, SummarySink};
use crate::services::threshold::ThresholdDerivation;

/// JSON-lines audit writer
#[derive(Clone)]
pub struct AuditLogger {
    log_file: Arc<Mutex<File>>,
}

/// Audit event types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    RunCompleted,
    IterationCommitted,
    OptimizationTerminated,
    ThresholdDerived,
    LedgerSummary,
}

/// Outcome of an audited event
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Success,
    Failure,
    Partial,
}

/// One audit line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub timestamp: DateTime<Utc>,
    pub event_type: AuditEventType,
    /// Run id, iteration index or ledger label
    pub subject: Option<String>,
    pub outcome: AuditOutcome,
    pub payload: Value,
}

impl AuditEvent {
    pub fn new(event_type: AuditEventType, outcome: AuditOutcome, payload: Value) -> Self {
        Self {
            timestamp: Utc::now(),
            event_type,
            subject: None,
            outcome,
            payload,
        }
    }

    #[must_use]
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }
}

impl AuditLogger {
    /// Open (or create) the audit file in append mode
    ///
    /// Creates parent directories if they don't exist.
    pub async fn new(log_path: impl AsRef<Path>) -> Result<Self> {
        let log_path = log_path.as_ref();

        if let Some(parent) = log_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("failed to create audit log directory")?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)
            .context("failed to open audit log file")?;

        Ok(Self {
            log_file: Arc::new(Mutex::new(file)),
        })
    }

    /// Append one event as a JSON line
    pub fn log_event(&self, event: &AuditEvent) -> Result<()> {
        let json = serde_json::to_string(event).context("failed to serialize audit event")?;

        {
            let mut file = self
                .log_file
                .lock()
                .map_err(|e| anyhow::anyhow!("audit log mutex poisoned: {e}"))?;

            writeln!(file, "{json}").context("failed to write audit event")?;
            file.flush().context("failed to flush audit log")?;
        }

        debug!(
            event_type = ?event.event_type,
            subject = ?event.subject,
            outcome = ?event.outcome,
            "audit event"
        );

        Ok(())
    }

    /// Record how a baseline turned into a pass threshold
    pub fn log_threshold(&self, derivation: &ThresholdDerivation) -> Result<()> {
        self.log_event(&AuditEvent::new(
            AuditEventType::ThresholdDerived,
            AuditOutcome::Success,
            Value::Object(derivation.to_record()),
        ))
    }

    // Port callbacks cannot return errors; a failed write is logged and the
    // run carries on.
    fn log_or_warn(&self, event: &AuditEvent) {
        if let Err(e) = self.log_event(event) {
            warn!(error = %e, event_type = ?event.event_type, "failed to write audit event");
        }
    }
}

impl ProgressListener for AuditLogger {
    fn on_run_complete(&self, report: &RunReport) {
        let outcome = match report.state {
            RunState::Completed => AuditOutcome::Success,
            RunState::BudgetExhausted | RunState::TerminatedEarly => AuditOutcome::Partial,
            _ => AuditOutcome::Failure,
        };
        let payload = json!({
            "kind": report.kind,
            "state": report.state,
            "configuration": report.configuration.to_record(),
            "statistics": report.statistics.to_record(),
            "latency": report.latency.to_record(),
            "planned_samples": report.planned_samples,
            "abandoned_samples": report.abandoned_samples,
            "early_stop": report.early_stop,
            "exhaustion_reason": report.exhaustion_reason,
        });
        self.log_or_warn(
            &AuditEvent::new(AuditEventType::RunCompleted, outcome, payload)
                .with_subject(report.run_id.to_string()),
        );
    }

    fn on_iteration(&self, record: &IterationRecord) {
        let outcome = if record.score.is_some() {
            AuditOutcome::Success
        } else {
            AuditOutcome::Failure
        };
        self.log_or_warn(
            &AuditEvent::new(
                AuditEventType::IterationCommitted,
                outcome,
                Value::Object(record.to_record()),
            )
            .with_subject(record.index.to_string()),
        );
    }

    fn on_optimization_terminated(&self, reason: &TerminationReason, iterations: usize) {
        let outcome = if reason.kind.is_failure() {
            AuditOutcome::Failure
        } else {
            AuditOutcome::Success
        };
        let payload = json!({
            "reason": reason.to_record(),
            "iterations": iterations,
        });
        self.log_or_warn(&AuditEvent::new(
            AuditEventType::OptimizationTerminated,
            outcome,
            payload,
        ));
    }
}

impl SummarySink for AuditLogger {
    fn emit(&self, summary: &LedgerSummary) {
        self.log_or_warn(
            &AuditEvent::new(
                AuditEventType::LedgerSummary,
                AuditOutcome::Success,
                Value::Object(summary.to_record()),
            )
            .with_subject(summary.label.clone()),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{
        FactorSuite, IntervalSidedness, IterationStatus, ScopeCeilings, Statistics,
        TerminationKind,
    };
    use crate::services::budget_ledger::BudgetLedger;
    use std::collections::BTreeMap;
    use std::time::Duration;
    use tempfile::TempDir;

    fn read_events(path: &Path) -> Vec<AuditEvent> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_audit_logger_creates_parent_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let log_path = temp_dir.path().join("logs/audit/events.jsonl");

        let _logger = AuditLogger::new(&log_path).await.unwrap();
        assert!(log_path.exists());
    }

    #[tokio::test]
    async fn test_iteration_and_termination_events_append() {
        let temp_dir = TempDir::new().unwrap();
        let log_path = temp_dir.path().join("audit.jsonl");
        let logger = AuditLogger::new(&log_path).await.unwrap();

        let record = IterationRecord {
            index: 2,
            configuration: Arc::new(FactorSuite::new().with_factor("temperature", 0.3)),
            statistics: Statistics::from_counts(
                9,
                10,
                BTreeMap::new(),
                0,
                0.95,
                IntervalSidedness::TwoSided,
            ),
            score: Some(0.9),
            status: IterationStatus::TerminatedByPolicy,
            started_at: Utc::now(),
            completed_at: Utc::now(),
        };
        logger.on_iteration(&record);
        logger.on_optimization_terminated(
            &TerminationReason::new(TerminationKind::MaxIterations, "reached 3 iterations"),
            3,
        );

        let events = read_events(&log_path);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, AuditEventType::IterationCommitted);
        assert_eq!(events[0].subject.as_deref(), Some("2"));
        assert_eq!(events[0].payload["score"], 0.9);
        assert_eq!(events[0].payload["configuration"]["temperature"], 0.3);
        assert_eq!(events[1].event_type, AuditEventType::OptimizationTerminated);
        assert_eq!(events[1].payload["iterations"], 3);
    }

    #[tokio::test]
    async fn test_ledger_summary_written_once_on_close() {
        let temp_dir = TempDir::new().unwrap();
        let log_path = temp_dir.path().join("audit.jsonl");
        let logger = AuditLogger::new(&log_path).await.unwrap();

        let ledger = BudgetLedger::new("suite", ScopeCeilings::unbounded())
            .with_sink(Arc::new(logger.clone()));
        ledger.root().record_elapsed(Duration::from_millis(40));
        ledger.root().record_sample();
        ledger.close();
        drop(ledger);

        let events = read_events(&log_path);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, AuditEventType::LedgerSummary);
        assert_eq!(events[0].subject.as_deref(), Some("suite"));
        assert_eq!(events[0].payload["total_samples"], 1);
        assert_eq!(events[0].payload["total_elapsed"], 40);
    }

    #[tokio::test]
    async fn test_threshold_provenance() {
        let temp_dir = TempDir::new().unwrap();
        let log_path = temp_dir.path().join("audit.jsonl");
        let logger = AuditLogger::new(&log_path).await.unwrap();

        let baseline = Statistics::from_counts(
            900,
            1000,
            BTreeMap::new(),
            0,
            0.95,
            IntervalSidedness::TwoSided,
        );
        let derivation = ThresholdDerivation::derive(&baseline, 100, 0.95).unwrap();
        logger.log_threshold(&derivation).unwrap();

        let events = read_events(&log_path);
        assert_eq!(events[0].event_type, AuditEventType::ThresholdDerived);
        assert_eq!(events[0].payload["baseline_samples"], 1000);
        assert_eq!(events[0].payload["test_samples"], 100);
    }
}
