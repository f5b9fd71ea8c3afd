//! Logging infrastructure
//!
//! Structured logging using tracing and tracing-subscriber:
//! - JSON or pretty stdout output, optional rolling JSON files
//! - Tracing-backed progress listener and summary sink
//! - JSON-lines audit trail of engine results

pub mod audit;
pub mod config;
pub mod listeners;
pub mod logger;

pub use audit::{AuditEvent, AuditEventType, AuditLogger, AuditOutcome};
pub use config::{LogConfig, LogFormat, RotationPolicy};
pub use listeners::{CompositeListener, TracingProgressListener, TracingSummarySink};
pub use logger::LoggerImpl;
