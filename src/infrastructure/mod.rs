//! Infrastructure layer module
//!
//! Adapters around the engine:
//! - Configuration management (figment)
//! - Logging, progress reporting and the audit trail (tracing)

pub mod config;
pub mod logging;
