//! Application services: the coverage loop and what it drives
//!
//! - `cover_agent`: the iteration loop
//! - `test_generator`: prompts for and parses candidate tests
//! - `test_validator`: patches, runs, measures and rolls back candidates
//! - `completion_service`: prompt rendering plus model calls
//! - `patch`: pure insertion of a candidate into test file text
//! - `source_context`: numbered sources, included files, relative paths

pub mod completion_service;
pub mod cover_agent;
pub mod patch;
pub mod source_context;
pub mod test_generator;
pub mod test_validator;

pub use completion_service::DefaultAgentCompletion;
pub use cover_agent::CoverAgent;
pub use patch::{build_patch, Patch, PatchError};
pub use test_generator::{GeneratedBatch, UnitTestGenerator};
pub use test_validator::{UnitTestValidator, ValidatorSettings, ValidatorState};
