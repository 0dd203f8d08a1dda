//! Configuration sections, loaded by `infrastructure::config`

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Main configuration structure for cover-agent
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Model endpoint configuration
    #[serde(default)]
    pub model: ModelConfig,

    /// Retry policy for model calls
    #[serde(default)]
    pub retry: RetryConfig,

    /// Iteration loop settings
    #[serde(default)]
    pub run: RunConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// YAML file overriding the built-in prompt templates
    #[serde(default)]
    pub prompts_file: Option<PathBuf>,

    /// Extra file extension -> language tag entries
    #[serde(default)]
    pub languages: BTreeMap<String, String>,
}

/// Model endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ModelConfig {
    /// Model identifier sent with every request
    #[serde(default = "default_model_name")]
    pub name: String,

    /// Bearer token; falls back to `OPENROUTER_API_KEY`
    #[serde(default)]
    pub api_key: Option<String>,

    /// Base URL of the chat completions API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Value of the `HTTP-Referer` header
    #[serde(default = "default_site_url")]
    pub site_url: String,

    /// Value of the `X-Title` header
    #[serde(default = "default_site_name")]
    pub site_name: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_model_name() -> String {
    "openai/gpt-4o".to_string()
}

fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

fn default_site_url() -> String {
    "https://github.com/cover-agent/cover-agent".to_string()
}

fn default_site_name() -> String {
    "cover-agent".to_string()
}

const fn default_temperature() -> f32 {
    0.35
}

const fn default_request_timeout_secs() -> u64 {
    300
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model_name(),
            api_key: None,
            base_url: default_base_url(),
            site_url: default_site_url(),
            site_name: default_site_name(),
            temperature: default_temperature(),
            timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Retry policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RetryConfig {
    /// Additional attempts after the first one
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before the first retry
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Cap on any single delay
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Retry failures that are neither transient nor a permanent HTTP status
    #[serde(default = "default_true")]
    pub retry_unclassified: bool,
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_initial_backoff_ms() -> u64 {
    1_000
}

const fn default_max_backoff_ms() -> u64 {
    10_000
}

const fn default_true() -> bool {
    true
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            retry_unclassified: true,
        }
    }
}

/// Iteration loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RunConfig {
    /// Generate/validate rounds before giving up
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Target line coverage in percent
    #[serde(default = "default_desired_coverage")]
    pub desired_coverage: f64,

    /// Upper bound on candidates requested per generation call
    #[serde(default = "default_max_tests_per_run")]
    pub max_tests_per_run: usize,

    /// Times each candidate's test run is repeated
    #[serde(default = "default_run_tests_multiple_times")]
    pub run_tests_multiple_times: u32,

    /// Wall-clock ceiling for one test command
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,

    /// Attempts at locating the insertion lines in the test file
    #[serde(default = "default_insert_line_attempts")]
    pub insert_line_attempts: u32,

    /// Ask the model to explain failing candidate runs
    #[serde(default = "default_true")]
    pub analyze_failures: bool,

    /// Adapt the test command so it only runs the target test file
    #[serde(default)]
    pub run_each_test_separately: bool,
}

const fn default_max_iterations() -> u32 {
    5
}

const fn default_desired_coverage() -> f64 {
    80.0
}

const fn default_max_tests_per_run() -> usize {
    4
}

const fn default_run_tests_multiple_times() -> u32 {
    1
}

const fn default_command_timeout_secs() -> u64 {
    3_600
}

const fn default_insert_line_attempts() -> u32 {
    3
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            desired_coverage: default_desired_coverage(),
            max_tests_per_run: default_max_tests_per_run(),
            run_tests_multiple_times: default_run_tests_multiple_times(),
            command_timeout_secs: default_command_timeout_secs(),
            insert_line_attempts: default_insert_line_attempts(),
            analyze_failures: true,
            run_each_test_separately: false,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format for stderr
    #[serde(default)]
    pub format: LogFormat,

    /// Directory for rolling JSON log files
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// How often the log file rolls over
    #[serde(default)]
    pub rotation: RotationPolicy,
}

/// Stderr log format
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line
    Json,
    /// Human-readable
    #[default]
    Pretty,
}

/// Log file rotation interval
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RotationPolicy {
    /// New file every day
    #[default]
    Daily,
    /// New file every hour
    Hourly,
    /// Single file
    Never,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            log_dir: None,
            rotation: RotationPolicy::default(),
        }
    }
}
