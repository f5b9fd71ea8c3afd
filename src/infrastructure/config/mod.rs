//! Configuration management infrastructure
//!
//! Hierarchical configuration using figment:
//! - YAML file loading from the project's `.probatio/` directory
//! - Environment variable overrides
//! - Validation, including the execution defaults' policy checks

pub mod loader;

pub use loader::{ConfigError, ConfigLoader, CONFIG_DIR, ENV_PREFIX};
