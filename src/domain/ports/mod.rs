//! Port trait definitions (Hexagonal Architecture)
//!
//! - `ModelClient`: one prompt in, one model response out
//! - `AgentCompletion`: the four prompt-specific model operations
//! - `PromptRenderer`: template key + variables to a system/user prompt
//! - `ReportIdentifier`: resolves a source file to its coverage report entry
//! - `RunObserver`: progress events of the iteration loop

pub mod completion;
pub mod model_client;
pub mod prompt_renderer;
pub mod report_identifier;
pub mod run_observer;

pub use completion::AgentCompletion;
pub use model_client::{ChunkObserver, ModelClient};
pub use prompt_renderer::{PromptRenderer, TemplateError};
pub use report_identifier::{ReportEntry, ReportIdentifier};
pub use run_observer::{NoopObserver, RunEvent, RunObserver};
