//! Infrastructure layer module
//!
//! Adapters for everything outside the process:
//! - Chat completions client (OpenRouter-compatible HTTP API)
//! - Shell command execution
//! - JaCoCo coverage reports
//! - Prompt templates
//! - Configuration management
//! - Logging infrastructure
//!
//! Infrastructure implementations satisfy the port traits defined in the domain layer.

pub mod config;
pub mod coverage;
pub mod llm;
pub mod logging;
pub mod process;
pub mod templates;
