//! Prompt-specific model operations

use async_trait::async_trait;

use crate::domain::models::{
    CommandAdaptationRequest, CompletionResult, FailureAnalysisRequest, InsertLineRequest,
    TestGenerationRequest,
};

/// Model-backed operations used by the generator, validator and orchestrator.
///
/// Every operation returns a result; failures come back error-tagged
/// (see [`CompletionResult::is_error`]) with whatever token usage was spent.
#[async_trait]
pub trait AgentCompletion: Send + Sync {
    /// Propose new tests. Streams the response.
    async fn generate_tests(&self, request: &TestGenerationRequest) -> CompletionResult;

    /// Explain why a candidate's test run failed.
    async fn analyze_test_failure(&self, request: &FailureAnalysisRequest) -> CompletionResult;

    /// Locate the lines after which tests and imports go.
    async fn analyze_test_insert_line(&self, request: &InsertLineRequest) -> CompletionResult;

    /// Rewrite the test command to run only one test file. The content is
    /// the new command line.
    async fn adapt_test_command(&self, request: &CommandAdaptationRequest) -> CompletionResult;
}
