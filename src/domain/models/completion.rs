//! Prompt and completion types shared by the model client and the completion service.

use serde::{Deserialize, Serialize};

/// A rendered system/user prompt pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prompt {
    /// Optional system message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    /// User message.
    pub user: String,
}

impl Prompt {
    /// Prompt with an optional system part.
    pub fn new(system: Option<String>, user: impl Into<String>) -> Self {
        Self {
            system,
            user: user.into(),
        }
    }

    /// Prompt with only a user part.
    pub fn user(user: impl Into<String>) -> Self {
        Self::new(None, user)
    }
}

/// Text and token usage of one model call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelResponse {
    /// Full answer text.
    pub text: String,
    /// Tokens billed for the prompt.
    pub prompt_tokens: u64,
    /// Tokens billed for the answer.
    pub completion_tokens: u64,
}

const ERROR_PREFIX: &str = "Error:";

/// Result of one completion-service operation.
///
/// Failures are carried in `content` as `"Error: ..."` so callers always get
/// a value and token counts back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionResult {
    /// Answer text, or `"Error: ..."` on failure.
    pub content: String,
    /// Prompt tokens consumed.
    pub input_tokens: u64,
    /// Completion tokens consumed.
    pub output_tokens: u64,
    /// User prompt that was sent, when rendering succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_prompt: Option<String>,
}

impl CompletionResult {
    /// Successful result carrying the usage of `response`.
    pub fn new(content: impl Into<String>, response: &ModelResponse, user_prompt: Option<String>) -> Self {
        Self {
            content: content.into(),
            input_tokens: response.prompt_tokens,
            output_tokens: response.completion_tokens,
            user_prompt,
        }
    }

    /// Error-tagged result with the given token usage.
    pub fn error(
        message: impl std::fmt::Display,
        input_tokens: u64,
        output_tokens: u64,
        user_prompt: Option<String>,
    ) -> Self {
        Self {
            content: format!("{ERROR_PREFIX} {message}"),
            input_tokens,
            output_tokens,
            user_prompt,
        }
    }

    /// Whether `content` carries the error tag.
    pub fn is_error(&self) -> bool {
        self.content.trim_start().starts_with(ERROR_PREFIX)
    }
}

/// Inputs of the test generation prompt.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TestGenerationRequest {
    /// Source path relative to the project root.
    pub source_file_name: String,
    /// Upper bound on tests per answer.
    pub max_tests: usize,
    /// Source text with 1-based line numbers.
    pub source_file_numbered: String,
    /// Coverage summary, or the raw report when it could not be parsed.
    pub code_coverage_report: String,
    /// Source language name.
    pub language: String,
    /// Current test file text.
    pub test_file: String,
    /// Test path relative to the project root.
    pub test_file_name: String,
    /// Testing framework detected in the test file.
    pub testing_framework: String,
    /// Rendered `--additional-instructions` section, possibly empty.
    pub additional_instructions_text: String,
    /// Rendered `--included-files` section, possibly empty.
    pub additional_includes_section: String,
    /// Previously rejected candidates with their error analysis.
    pub failed_tests_section: String,
}

/// Inputs of the failed test run analysis prompt.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FailureAnalysisRequest {
    /// Source path relative to the project root.
    pub source_file_name: String,
    /// Source file text.
    pub source_file: String,
    /// Test file with the failing candidate patched in.
    pub processed_test_file: String,
    /// Test command stdout.
    pub stdout: String,
    /// Test command stderr.
    pub stderr: String,
    /// Test path relative to the project root.
    pub test_file_name: String,
}

/// Inputs of the insertion line analysis prompt.
#[derive(Debug, Clone, Default, Serialize)]
pub struct InsertLineRequest {
    /// Test file language name.
    pub language: String,
    /// Test text with 1-based line numbers.
    pub test_file_numbered: String,
    /// Test path relative to the project root.
    pub test_file_name: String,
}

/// Inputs of the single test command adaptation prompt.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CommandAdaptationRequest {
    /// Test file path relative to the project root.
    pub test_file_relative_path: String,
    /// Command that runs the whole suite.
    pub test_command: String,
    /// Absolute project root.
    pub project_root_dir: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_results_are_tagged() {
        let result = CompletionResult::error("No response from model", 12, 0, None);
        assert_eq!(result.content, "Error: No response from model");
        assert_eq!(result.input_tokens, 12);
        assert!(result.is_error());
    }

    #[test]
    fn test_plain_content_is_not_an_error() {
        let response = ModelResponse {
            text: "mvn test -Dtest=FooTest".to_string(),
            prompt_tokens: 5,
            completion_tokens: 7,
        };
        let result = CompletionResult::new(response.text.clone(), &response, None);
        assert!(!result.is_error());
        assert_eq!(result.output_tokens, 7);
    }
}
