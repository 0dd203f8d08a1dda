//! Chat completions client for OpenRouter-compatible endpoints
//!
//! - `client`: HTTP client with connection pooling and default headers
//! - `retry`: exponential backoff around single attempts
//! - `streaming`: SSE line splitting and fragment accumulation
//! - `errors`: per-attempt error classification
//! - `types`: request/response bodies
//! - `structured`: YAML bodies of model answers

pub mod client;
pub mod errors;
pub mod retry;
pub mod streaming;
pub mod structured;
pub mod types;

pub use client::{ModelClientConfig, OpenRouterClient, STREAM_RETRY_MARKER};
pub use errors::ModelApiError;
pub use retry::{backoff_delay, RetryPolicy};
pub use streaming::{SseLineStream, StreamAccumulator};
