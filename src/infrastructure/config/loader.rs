use std::path::Path;

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::errors::PolicyError;
use crate::domain::models::EngineConfig;

/// Directory, relative to the project root, holding configuration files
pub const CONFIG_DIR: &str = ".probatio";

/// Prefix for environment variable overrides
pub const ENV_PREFIX: &str = "PROBATIO_";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidLogRotation(String),

    #[error("Invalid execution defaults: {0}")]
    InvalidExecution(#[from] PolicyError),

    #[error("Invalid {0}: a configured budget must be positive")]
    ZeroBudget(&'static str),

    #[error("Audit path cannot be empty")]
    EmptyAuditPath,
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration relative to the current directory
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .probatio/config.yaml (project config)
    /// 3. .probatio/local.yaml (local overrides, optional)
    /// 4. Environment variables (PROBATIO_* prefix, `__` separates nested keys)
    pub fn load() -> Result<EngineConfig> {
        Self::load_from_dir(Path::new("."))
    }

    /// Load configuration with `root` as the project directory
    pub fn load_from_dir(root: impl AsRef<Path>) -> Result<EngineConfig> {
        let dir = root.as_ref().join(CONFIG_DIR);
        let config: EngineConfig = Figment::new()
            .merge(Serialized::defaults(EngineConfig::default()))
            .merge(Yaml::file(dir.join("config.yaml")))
            .merge(Yaml::file(dir.join("local.yaml")))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, without environment overrides
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<EngineConfig> {
        let config: EngineConfig = Figment::new()
            .merge(Serialized::defaults(EngineConfig::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.as_ref().display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &EngineConfig) -> Result<(), ConfigError> {
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidLogRotation(
                config.logging.rotation.clone(),
            ));
        }

        config.execution.to_policy()?;

        if config.budget.time_budget_ms == Some(0) {
            return Err(ConfigError::ZeroBudget("budget.time_budget_ms"));
        }
        if config.budget.cost_budget == Some(0) {
            return Err(ConfigError::ZeroBudget("budget.cost_budget"));
        }

        if config.audit.path.as_deref().is_some_and(|p| p.trim().is_empty()) {
            return Err(ConfigError::EmptyAuditPath);
        }

        Ok(())
    }
}
