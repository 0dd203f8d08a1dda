//! Model-backed completion operations.
//!
//! Each operation serializes its request into template variables, renders the
//! matching prompt, calls the model and returns a [`CompletionResult`].
//! Nothing here returns an error: failures become `"Error: ..."` results.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::models::{
    CommandAdaptationRequest, CompletionResult, FailureAnalysisRequest, InsertLineRequest,
    TestGenerationRequest,
};
use crate::domain::ports::{AgentCompletion, ModelClient, PromptRenderer};
use crate::infrastructure::llm::structured::{parse_structured, text_field};

/// Template key of the test generation prompt.
pub const TEST_GENERATION_TEMPLATE: &str = "test_generation_prompt";
/// Template key of the failed run analysis prompt.
pub const FAILURE_ANALYSIS_TEMPLATE: &str = "analyze_test_run_failure";
/// Template key of the insertion line analysis prompt.
pub const INSERT_LINE_TEMPLATE: &str = "analyze_suite_test_insert_line";
/// Template key of the single test command prompt.
pub const COMMAND_ADAPTATION_TEMPLATE: &str = "adapt_test_command_for_a_single_test_via_ai";

/// [`AgentCompletion`] over a model client and a prompt renderer.
pub struct DefaultAgentCompletion {
    client: Arc<dyn ModelClient>,
    renderer: Arc<dyn PromptRenderer>,
}

impl DefaultAgentCompletion {
    /// Completion service sending prompts from `renderer` through `client`.
    pub fn new(client: Arc<dyn ModelClient>, renderer: Arc<dyn PromptRenderer>) -> Self {
        Self { client, renderer }
    }

    async fn complete<T: Serialize + Sync>(
        &self,
        template_key: &str,
        request: &T,
        streaming: bool,
    ) -> CompletionResult {
        let variables = match serde_json::to_value(request) {
            Ok(variables) => variables,
            Err(err) => return CompletionResult::error(err, 0, 0, None),
        };
        let prompt = match self.renderer.render(template_key, &variables) {
            Ok(prompt) => prompt,
            Err(err) => {
                warn!(template = template_key, "Prompt rendering failed: {}", err);
                return CompletionResult::error(err, 0, 0, None);
            }
        };

        debug!(
            template = template_key,
            streaming,
            user_chars = prompt.user.len(),
            "Calling model"
        );

        match self.client.call(&prompt, streaming).await {
            Ok(response) => CompletionResult::new(response.text.clone(), &response, Some(prompt.user)),
            Err(err) => {
                warn!(template = template_key, "{}", err);
                CompletionResult::error(err, 0, 0, Some(prompt.user))
            }
        }
    }
}

#[async_trait]
impl AgentCompletion for DefaultAgentCompletion {
    async fn generate_tests(&self, request: &TestGenerationRequest) -> CompletionResult {
        self.complete(TEST_GENERATION_TEMPLATE, request, true).await
    }

    async fn analyze_test_failure(&self, request: &FailureAnalysisRequest) -> CompletionResult {
        self.complete(FAILURE_ANALYSIS_TEMPLATE, request, false).await
    }

    async fn analyze_test_insert_line(&self, request: &InsertLineRequest) -> CompletionResult {
        self.complete(INSERT_LINE_TEMPLATE, request, false).await
    }

    async fn adapt_test_command(&self, request: &CommandAdaptationRequest) -> CompletionResult {
        let mut result = self
            .complete(COMMAND_ADAPTATION_TEMPLATE, request, false)
            .await;
        if result.is_error() {
            return result;
        }

        match parse_structured(&result.content)
            .ok()
            .and_then(|value| text_field(&value, "new_command_line"))
        {
            Some(command) => result.content = command,
            None => {
                warn!("Model answer had no new_command_line");
                result = CompletionResult::error(
                    "Could not parse command",
                    result.input_tokens,
                    result.output_tokens,
                    result.user_prompt,
                );
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::ModelCallError;
    use crate::domain::models::{ModelResponse, Prompt};
    use crate::infrastructure::templates::TemplateRenderer;
    use std::sync::Mutex;

    /// Replies with a fixed text and records every call.
    struct FakeClient {
        reply: Result<String, String>,
        calls: Mutex<Vec<(Prompt, bool)>>,
    }

    impl FakeClient {
        fn replying(text: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(text.to_string()),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn failing(message: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Err(message.to_string()),
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ModelClient for FakeClient {
        async fn call(&self, prompt: &Prompt, streaming: bool) -> Result<ModelResponse, ModelCallError> {
            self.calls.lock().unwrap().push((prompt.clone(), streaming));
            match &self.reply {
                Ok(text) => Ok(ModelResponse {
                    text: text.clone(),
                    prompt_tokens: 11,
                    completion_tokens: 7,
                }),
                Err(message) => Err(ModelCallError::new(4, message.clone())),
            }
        }

        fn model(&self) -> &str {
            "fake/model"
        }
    }

    fn service(client: Arc<FakeClient>) -> DefaultAgentCompletion {
        DefaultAgentCompletion::new(client, Arc::new(TemplateRenderer::builtin().unwrap()))
    }

    fn generation_request() -> TestGenerationRequest {
        TestGenerationRequest {
            source_file_name: "src/Calc.java".to_string(),
            max_tests: 4,
            source_file_numbered: "1 class Calc {}".to_string(),
            code_coverage_report: "Lines covered: 0".to_string(),
            language: "java".to_string(),
            test_file: "class CalcTest {}".to_string(),
            test_file_name: "test/CalcTest.java".to_string(),
            testing_framework: "JUnit4".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_generation_streams_and_counts_tokens() {
        let client = FakeClient::replying("new_tests: []");
        let result = service(client.clone()).generate_tests(&generation_request()).await;

        assert_eq!(result.content, "new_tests: []");
        assert_eq!((result.input_tokens, result.output_tokens), (11, 7));
        assert!(!result.is_error());

        let calls = client.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].1, "generation should stream");
        assert!(calls[0].0.user.contains("1 class Calc {}"));
        assert_eq!(result.user_prompt.as_deref(), Some(calls[0].0.user.as_str()));
    }

    #[tokio::test]
    async fn test_other_operations_are_buffered() {
        let client = FakeClient::replying("analysis");
        let svc = service(client.clone());

        svc.analyze_test_failure(&FailureAnalysisRequest::default()).await;
        svc.analyze_test_insert_line(&InsertLineRequest::default()).await;

        let calls = client.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|(_, streaming)| !streaming));
    }

    #[tokio::test]
    async fn test_model_failure_is_error_tagged() {
        let result = service(FakeClient::failing("503 upstream"))
            .generate_tests(&generation_request())
            .await;

        assert!(result.is_error());
        assert!(result.content.starts_with("Error: Model call failed after 4 attempt(s)"));
        assert!(result.user_prompt.is_some());
    }

    #[tokio::test]
    async fn test_adapt_command_extracts_new_command_line() {
        let client = FakeClient::replying(
            "```yaml\nprogramming_language: java\ntesting_framework: junit\nnew_command_line: mvn test -Dtest=CalcTest jacoco:report\n```",
        );
        let result = service(client)
            .adapt_test_command(&CommandAdaptationRequest {
                test_file_relative_path: "src/test/java/CalcTest.java".to_string(),
                test_command: "mvn test jacoco:report".to_string(),
                project_root_dir: "/repo".to_string(),
            })
            .await;

        assert_eq!(result.content, "mvn test -Dtest=CalcTest jacoco:report");
        assert_eq!(result.input_tokens, 11);
    }

    #[tokio::test]
    async fn test_adapt_command_without_field_is_error() {
        let result = service(FakeClient::replying("I cannot help with that."))
            .adapt_test_command(&CommandAdaptationRequest::default())
            .await;

        assert_eq!(result.content, "Error: Could not parse command");
        assert_eq!((result.input_tokens, result.output_tokens), (11, 7));
    }
}
