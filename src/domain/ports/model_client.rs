//! Single-model chat completion port

use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::errors::ModelCallError;
use crate::domain::models::{ModelResponse, Prompt};

/// Receives streamed content fragments as they arrive.
pub type ChunkObserver = Arc<dyn Fn(&str) + Send + Sync>;

/// Sends one prompt to a single configured model.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Buffered when `streaming` is false; otherwise fragments go to the
    /// client's observer and the response holds the accumulated text.
    async fn call(&self, prompt: &Prompt, streaming: bool) -> Result<ModelResponse, ModelCallError>;

    /// Model identifier sent with every request.
    fn model(&self) -> &str;
}
