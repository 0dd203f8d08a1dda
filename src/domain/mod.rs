//! Domain layer for cover-agent
//!
//! Models, the error taxonomy and the port traits that infrastructure
//! adapters implement.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{AgentError, AgentResult, CoverageError, ModelCallError, ValidatorError};
