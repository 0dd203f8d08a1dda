//! Per-attempt model API errors and their retry classification

use reqwest::StatusCode;
use thiserror::Error;

/// Errors from a single attempt against the chat completions API
#[derive(Error, Debug)]
pub enum ModelApiError {
    /// Invalid client configuration (header values, URL)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Connection could not be established
    #[error("Connection failed: {0}")]
    Connect(#[source] reqwest::Error),

    /// Connect or read timeout
    #[error("Request timeout: {0}")]
    Timeout(#[source] reqwest::Error),

    /// Non-2xx response
    #[error("HTTP {status}: {body}")]
    Http {
        /// Response status
        status: StatusCode,
        /// Response body, as text
        body: String,
    },

    /// Other transport failure (body read, decode, redirect)
    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    /// Response or stream frame was not valid JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Well-formed JSON without the expected content
    #[error("Malformed response: {0}")]
    Protocol(String),
}

impl From<reqwest::Error> for ModelApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err)
        } else if err.is_connect() {
            Self::Connect(err)
        } else {
            Self::Network(err)
        }
    }
}

impl ModelApiError {
    /// Returns true if this error is transient and should be retried
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Connect(_) | Self::Timeout(_) => true,
            Self::Http { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            _ => false,
        }
    }

    /// Returns true if this is a permanent error that should not be retried
    pub fn is_permanent(&self) -> bool {
        match self {
            Self::InvalidRequest(_) => true,
            Self::Http { .. } => !self.is_transient(),
            _ => false,
        }
    }
}
