//! Prompt template rendering port

use thiserror::Error;

use crate::domain::models::Prompt;

/// Errors loading or rendering prompt templates.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// No template is registered under the key.
    #[error("Unknown prompt template: {0}")]
    UnknownTemplate(String),

    /// The template engine rejected the template or its variables.
    #[error("Failed to render prompt template {key}: {message}")]
    Render {
        /// Template key.
        key: String,
        /// Engine message.
        message: String,
    },

    /// A template file could not be read or parsed.
    #[error("Failed to load prompt templates: {0}")]
    Load(String),
}

/// Renders a named template into a system/user prompt pair.
pub trait PromptRenderer: Send + Sync {
    /// Render `template_key` with `variables`, a JSON object.
    fn render(&self, template_key: &str, variables: &serde_json::Value) -> Result<Prompt, TemplateError>;
}
