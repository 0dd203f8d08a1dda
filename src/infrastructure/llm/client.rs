//! HTTP client for the chat completions API

use super::errors::ModelApiError;
use super::retry::RetryPolicy;
use super::streaming::{SseLineStream, StreamAccumulator};
use super::types::{ChatRequest, ChatResponse};
use crate::domain::errors::ModelCallError;
use crate::domain::models::{ModelConfig, ModelResponse, Prompt};
use crate::domain::ports::{ChunkObserver, ModelClient};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{header, Client as ReqwestClient, Response};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, error, info, instrument};

/// Sent to the chunk observer before a retried stream replays its fragments.
pub const STREAM_RETRY_MARKER: &str = "\n[stream interrupted, retrying]\n";

/// Configuration for the chat completions HTTP client
#[derive(Debug, Clone)]
pub struct ModelClientConfig {
    /// Bearer token
    pub api_key: String,
    /// Base URL, e.g. `https://openrouter.ai/api/v1`
    pub base_url: String,
    /// Model identifier sent with every request
    pub model: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Sent as `HTTP-Referer`
    pub site_url: String,
    /// Sent as `X-Title`
    pub site_name: String,
    /// Per-request timeout
    pub timeout_secs: u64,
}

impl ModelClientConfig {
    /// Client settings from the `model` config section and a resolved key
    pub fn from_config(config: &ModelConfig, api_key: String) -> Self {
        Self {
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.name.clone(),
            temperature: config.temperature,
            site_url: config.site_url.clone(),
            site_name: config.site_name.clone(),
            timeout_secs: config.timeout_secs,
        }
    }
}

/// HTTP client for an OpenRouter-compatible chat completions endpoint
///
/// Provides:
/// - Connection pooling and reuse
/// - Exponential backoff retry logic
/// - Buffered and streamed responses
pub struct OpenRouterClient {
    http_client: ReqwestClient,
    base_url: String,
    model: String,
    temperature: f32,
    retry_policy: RetryPolicy,
    observer: Option<ChunkObserver>,
}

impl OpenRouterClient {
    /// Create a new client
    ///
    /// # Example
    /// ```no_run
    /// use cover_agent::infrastructure::llm::client::{ModelClientConfig, OpenRouterClient};
    /// use cover_agent::infrastructure::llm::retry::RetryPolicy;
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let config = ModelClientConfig {
    ///     api_key: "sk-or-...".to_string(),
    ///     base_url: "https://openrouter.ai/api/v1".to_string(),
    ///     model: "openai/gpt-4o".to_string(),
    ///     temperature: 0.35,
    ///     site_url: "https://example.com".to_string(),
    ///     site_name: "cover-agent".to_string(),
    ///     timeout_secs: 300,
    /// };
    /// let client = OpenRouterClient::new(config, RetryPolicy::default())?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(config: ModelClientConfig, retry_policy: RetryPolicy) -> Result<Self, ModelApiError> {
        let api_key_scrubbed = if config.api_key.chars().count() > 8 {
            let prefix: String = config.api_key.chars().take(8).collect();
            format!("{prefix}...[REDACTED]")
        } else {
            "[REDACTED]".to_string()
        };

        info!(
            "Initializing model client: base_url={}, model={}, timeout={}s, api_key={}",
            config.base_url, config.model, config.timeout_secs, api_key_scrubbed
        );

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&format!("Bearer {}", config.api_key))
                .map_err(|e| ModelApiError::InvalidRequest(format!("Invalid API key: {e}")))?,
        );
        headers.insert(
            "HTTP-Referer",
            header::HeaderValue::from_str(&config.site_url)
                .map_err(|e| ModelApiError::InvalidRequest(format!("Invalid site URL: {e}")))?,
        );
        headers.insert(
            "X-Title",
            header::HeaderValue::from_str(&config.site_name)
                .map_err(|e| ModelApiError::InvalidRequest(format!("Invalid site name: {e}")))?,
        );
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let http_client = ReqwestClient::builder()
            .pool_max_idle_per_host(10)
            .timeout(Duration::from_secs(config.timeout_secs))
            .tcp_nodelay(true)
            .default_headers(headers)
            .build()
            .map_err(ModelApiError::from)?;

        Ok(Self {
            http_client,
            base_url: config.base_url,
            model: config.model,
            temperature: config.temperature,
            retry_policy,
            observer: None,
        })
    }

    /// Forward streamed fragments to `observer` as they arrive
    ///
    /// Fragments already forwarded are not retracted when a stream fails
    /// part way. If a retried attempt streams again, the observer first
    /// receives [`STREAM_RETRY_MARKER`] and then the new attempt's fragments
    /// from the start.
    #[must_use]
    pub fn with_chunk_observer(mut self, observer: ChunkObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Execute a single request (called by retry logic)
    ///
    /// `streamed` is shared across the attempts of one call and records
    /// whether any fragment reached the observer yet.
    async fn execute_request(
        &self,
        request: &ChatRequest,
        streamed: &AtomicBool,
    ) -> Result<ModelResponse, ModelApiError> {
        let url = format!("{}/chat/completions", self.base_url);

        debug!("POST {}", url);

        let response = self.http_client.post(&url).json(request).send().await?;
        let status = response.status();

        debug!("Response status: {}", status);

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error response".to_string());
            return Err(ModelApiError::Http { status, body });
        }

        if request.stream {
            self.read_stream(response, streamed).await
        } else {
            Self::read_buffered(response).await
        }
    }

    async fn read_buffered(response: Response) -> Result<ModelResponse, ModelApiError> {
        let body = response.text().await?;
        let parsed: ChatResponse = serde_json::from_str(&body)?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .ok_or_else(|| ModelApiError::Protocol("response has no choices[0].message.content".to_string()))?;
        let usage = parsed.usage.unwrap_or_default();

        Ok(ModelResponse {
            text,
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
        })
    }

    async fn read_stream(
        &self,
        response: Response,
        streamed: &AtomicBool,
    ) -> Result<ModelResponse, ModelApiError> {
        let mut lines = SseLineStream::new(response.bytes_stream());
        let mut accumulator = StreamAccumulator::new();
        let mut replaying = streamed.load(Ordering::Relaxed);

        while let Some(line) = lines.next().await {
            if let Some(fragment) = accumulator.push_line(&line?)? {
                if let Some(observer) = &self.observer {
                    if replaying {
                        observer(STREAM_RETRY_MARKER);
                        replaying = false;
                    }
                    observer(&fragment);
                    streamed.store(true, Ordering::Relaxed);
                }
            }
        }

        Ok(accumulator.finish())
    }
}

#[async_trait]
impl ModelClient for OpenRouterClient {
    #[instrument(skip(self, prompt), fields(model = %self.model))]
    async fn call(&self, prompt: &Prompt, streaming: bool) -> Result<ModelResponse, ModelCallError> {
        let request = ChatRequest::from_prompt(&self.model, self.temperature, prompt, streaming);
        debug!(user_chars = prompt.user.len(), "Sending chat completion request");

        let streamed = AtomicBool::new(false);
        let result = self
            .retry_policy
            .execute(|| self.execute_request(&request, &streamed))
            .await;

        match &result {
            Ok(response) => {
                info!(
                    "Model call succeeded: prompt_tokens={}, completion_tokens={}",
                    response.prompt_tokens, response.completion_tokens
                );
            }
            Err(err) => {
                error!("Model call failed: {}", err);
            }
        }

        result
    }

    fn model(&self) -> &str {
        &self.model
    }
}
