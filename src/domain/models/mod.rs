//! Plain data shared across the loop

pub mod completion;
pub mod config;
pub mod coverage;
pub mod language;
pub mod report;
pub mod target;
pub mod test_run;
pub mod validation;

pub use completion::{
    CommandAdaptationRequest, CompletionResult, FailureAnalysisRequest, InsertLineRequest,
    ModelResponse, Prompt, TestGenerationRequest,
};
pub use config::{
    Config, LogFormat, LoggingConfig, ModelConfig, RetryConfig, RotationPolicy, RunConfig,
};
pub use coverage::CoverageData;
pub use language::{LanguageMap, UNKNOWN_LANGUAGE};
pub use report::FinalReport;
pub use target::RunTarget;
pub use test_run::{CommandResult, FailedTestRun, GeneratedTest};
pub use validation::{FailureReason, ValidationOutcome, ValidationStatus};
