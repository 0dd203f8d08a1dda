//! cover-agent - coverage-driven unit test generation
//!
//! Repeatedly asks a language model for new unit tests of one source file,
//! splices each candidate into the live test file, runs the project's test
//! command and keeps only candidates that pass and raise line coverage in
//! the JaCoCo report.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): models, errors and the port traits
//! - **Service Layer** (`services`): completion operations, generator,
//!   validator and the coverage loop
//! - **Infrastructure Layer** (`infrastructure`): model HTTP client, process
//!   runner, coverage parser, prompt templates, config and logging
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```ignore
//! use cover_agent::services::CoverAgent;
//!
//! let report = CoverAgent::new(completion, config.run, target, "openai/gpt-4o")
//!     .run()
//!     .await?;
//! println!("final coverage: {:.2}", report.final_coverage);
//! ```

pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{AgentError, ModelCallError, ValidatorError};
pub use domain::models::{
    Config, CoverageData, FinalReport, GeneratedTest, RunTarget, ValidationOutcome,
};
pub use domain::ports::{AgentCompletion, ModelClient, RunObserver};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{CoverAgent, DefaultAgentCompletion, UnitTestGenerator, UnitTestValidator};
