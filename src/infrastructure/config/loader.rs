//! Layered configuration loading

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use std::path::Path;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Project config, created by hand or by tooling
pub const PROJECT_CONFIG: &str = ".cover-agent/config.yaml";
/// Optional local overrides, usually not committed
pub const LOCAL_CONFIG: &str = ".cover-agent/local.yaml";
/// Fallback source of the model API key
pub const API_KEY_ENV: &str = "OPENROUTER_API_KEY";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    /// `model.name` is blank
    #[error("Model name cannot be empty")]
    EmptyModelName,

    /// `model.temperature` outside `[0, 2]`
    #[error("Invalid temperature: {0}. Must be between 0.0 and 2.0")]
    InvalidTemperature(f32),

    /// `logging.level` is not a tracing level
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    /// `retry.max_retries` is zero
    #[error("Invalid max_retries: {0}. Cannot be 0")]
    InvalidMaxRetries(u32),

    #[error(
        "Invalid backoff configuration: initial_backoff_ms ({0}) must not exceed max_backoff_ms ({1})"
    )]
    /// Initial backoff above the cap
    InvalidBackoff(u64, u64),

    /// `run.max_iterations` is zero
    #[error("Invalid max_iterations: {0}. Must be at least 1")]
    InvalidMaxIterations(u32),

    /// `run.desired_coverage` outside `(0, 100]`
    #[error("Invalid desired_coverage: {0}. Must be in (0, 100]")]
    InvalidDesiredCoverage(f64),

    /// `run.max_tests_per_run` is zero
    #[error("Invalid max_tests_per_run: {0}. Must be at least 1")]
    InvalidMaxTests(usize),

    /// `run.run_tests_multiple_times` is zero
    #[error("Invalid run_tests_multiple_times: {0}. Must be at least 1")]
    InvalidTestRuns(u32),

    /// `run.command_timeout_secs` is zero
    #[error("Invalid command_timeout_secs: {0}. Must be at least 1")]
    InvalidCommandTimeout(u64),

    /// `run.insert_line_attempts` is zero
    #[error("Invalid insert_line_attempts: {0}. Must be at least 1")]
    InvalidInsertLineAttempts(u32),

    /// `--config` names a file that does not exist
    #[error("Config file not found: {0}")]
    MissingFile(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .cover-agent/config.yaml
    /// 3. .cover-agent/local.yaml
    /// 4. `explicit` file, when given (must exist)
    /// 5. Environment variables (COVER_AGENT_* prefix, `__` separates sections)
    ///
    /// The API key falls back to `OPENROUTER_API_KEY` when no layer sets it.
    pub fn load(explicit: Option<&Path>) -> Result<Config> {
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(ConfigError::MissingFile(path.display().to_string()).into());
            }
        }

        let mut config: Config = Self::figment(explicit)
            .extract()
            .context("Failed to extract configuration from figment")?;

        if config.model.api_key.as_deref().map_or(true, str::is_empty) {
            config.model.api_key = std::env::var(API_KEY_ENV).ok().filter(|key| !key.is_empty());
        }

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, without project files or environment
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    fn figment(explicit: Option<&Path>) -> Figment {
        let mut figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(PROJECT_CONFIG))
            .merge(Yaml::file(LOCAL_CONFIG));
        if let Some(path) = explicit {
            figment = figment.merge(Yaml::file(path));
        }
        figment.merge(Env::prefixed("COVER_AGENT_").split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.model.name.trim().is_empty() {
            return Err(ConfigError::EmptyModelName);
        }

        if !(0.0..=2.0).contains(&config.model.temperature) {
            return Err(ConfigError::InvalidTemperature(config.model.temperature));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        if config.retry.max_retries == 0 {
            return Err(ConfigError::InvalidMaxRetries(config.retry.max_retries));
        }

        if config.retry.initial_backoff_ms > config.retry.max_backoff_ms {
            return Err(ConfigError::InvalidBackoff(
                config.retry.initial_backoff_ms,
                config.retry.max_backoff_ms,
            ));
        }

        let run = &config.run;
        if run.max_iterations == 0 {
            return Err(ConfigError::InvalidMaxIterations(run.max_iterations));
        }

        if !(run.desired_coverage > 0.0 && run.desired_coverage <= 100.0) {
            return Err(ConfigError::InvalidDesiredCoverage(run.desired_coverage));
        }

        if run.max_tests_per_run == 0 {
            return Err(ConfigError::InvalidMaxTests(run.max_tests_per_run));
        }

        if run.run_tests_multiple_times == 0 {
            return Err(ConfigError::InvalidTestRuns(run.run_tests_multiple_times));
        }

        if run.command_timeout_secs == 0 {
            return Err(ConfigError::InvalidCommandTimeout(run.command_timeout_secs));
        }

        if run.insert_line_attempts == 0 {
            return Err(ConfigError::InvalidInsertLineAttempts(run.insert_line_attempts));
        }

        Ok(())
    }
}
