//! Request and response types for the chat completions API

use serde::{Deserialize, Serialize};

use crate::domain::models::Prompt;

/// Chat completion request body
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    /// Model identifier
    pub model: String,
    /// Sampling temperature
    pub temperature: f32,
    /// System message (if any) then the user message
    pub messages: Vec<ChatMessage>,
    /// Request an SSE stream instead of one body
    pub stream: bool,
}

impl ChatRequest {
    /// Build a request from a prompt; an empty system part is left out.
    pub fn from_prompt(model: &str, temperature: f32, prompt: &Prompt, stream: bool) -> Self {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = prompt.system.as_deref().filter(|s| !s.trim().is_empty()) {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system.to_string(),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: prompt.user.clone(),
        });

        Self {
            model: model.to_string(),
            temperature,
            messages,
            stream,
        }
    }
}

/// One chat message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    /// `system` or `user`
    pub role: String,
    /// Message text
    pub content: String,
}

/// Token usage reported by the API
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Usage {
    /// Tokens in the prompt
    #[serde(default)]
    pub prompt_tokens: u64,
    /// Tokens in the answer
    #[serde(default)]
    pub completion_tokens: u64,
}

/// Buffered (non-streaming) response body
#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    /// Only the first choice is read
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
    /// Absent on some providers
    #[serde(default)]
    pub usage: Option<Usage>,
}

/// Choice of a buffered response
#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
    /// Assistant message
    #[serde(default)]
    pub message: Option<ChoiceMessage>,
}

/// Assistant message of a buffered response
#[derive(Debug, Clone, Deserialize)]
pub struct ChoiceMessage {
    /// Answer text
    #[serde(default)]
    pub content: Option<String>,
}

/// One `data:` frame of a streamed response
#[derive(Debug, Clone, Deserialize)]
pub struct StreamChunk {
    /// Empty on usage-only frames
    #[serde(default)]
    pub choices: Vec<StreamChoice>,
    /// Usually on the last frame only
    #[serde(default)]
    pub usage: Option<Usage>,
}

/// Choice of a stream frame
#[derive(Debug, Clone, Deserialize)]
pub struct StreamChoice {
    /// Content added by this frame
    #[serde(default)]
    pub delta: Option<Delta>,
}

/// Incremental assistant content
#[derive(Debug, Clone, Deserialize)]
pub struct Delta {
    /// Text fragment
    #[serde(default)]
    pub content: Option<String>,
}
