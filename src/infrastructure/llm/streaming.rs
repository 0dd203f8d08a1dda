//! Server-Sent Events support for streamed chat completions
//!
//! The API sends newline-delimited frames of the form `data: {json}`. Content
//! fragments live under `choices[0].delta.content`; the final frames may carry
//! a `usage` object. A `data: [DONE]` line closes the stream.

use super::errors::ModelApiError;
use super::types::StreamChunk;
use crate::domain::models::ModelResponse;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tracing::{debug, warn};

const DATA_PREFIX: &str = "data:";
const DONE_SENTINEL: &str = "[DONE]";

/// Splits a byte stream into text lines.
///
/// Bytes are buffered until a full line is available so multi-byte
/// characters split across chunks decode intact.
pub struct SseLineStream<S> {
    inner: Pin<Box<S>>,
    buffer: Vec<u8>,
    finished: bool,
}

impl<S> SseLineStream<S>
where
    S: Stream<Item = Result<Bytes, reqwest::Error>>,
{
    /// Create a new line splitter from a byte stream
    pub fn new(stream: S) -> Self {
        Self {
            inner: Box::pin(stream),
            buffer: Vec::new(),
            finished: false,
        }
    }

    fn take_line(&mut self) -> Option<String> {
        let pos = self.buffer.iter().position(|b| *b == b'\n')?;
        let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Some(String::from_utf8_lossy(&line).into_owned())
    }
}

impl<S> Stream for SseLineStream<S>
where
    S: Stream<Item = Result<Bytes, reqwest::Error>>,
{
    type Item = Result<String, ModelApiError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if let Some(line) = self.take_line() {
                return Poll::Ready(Some(Ok(line)));
            }

            if self.finished {
                return Poll::Ready(None);
            }

            match self.inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    self.buffer.extend_from_slice(&bytes);
                }
                Poll::Ready(Some(Err(err))) => {
                    return Poll::Ready(Some(Err(ModelApiError::from(err))));
                }
                Poll::Ready(None) => {
                    self.finished = true;
                    if !self.buffer.is_empty() {
                        let rest = std::mem::take(&mut self.buffer);
                        return Poll::Ready(Some(Ok(String::from_utf8_lossy(&rest).into_owned())));
                    }
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// Folds stream frames into a [`ModelResponse`].
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    text: String,
    prompt_tokens: u64,
    completion_tokens: u64,
}

impl StreamAccumulator {
    /// Empty accumulator
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one line. Returns the content fragment it carried, if any.
    ///
    /// Lines without the `data:` marker and the `[DONE]` sentinel are skipped.
    pub fn push_line(&mut self, line: &str) -> Result<Option<String>, ModelApiError> {
        let Some(data) = line.strip_prefix(DATA_PREFIX) else {
            return Ok(None);
        };
        let data = data.trim();
        if data.is_empty() || data == DONE_SENTINEL {
            return Ok(None);
        }

        let chunk: StreamChunk = serde_json::from_str(data).map_err(|err| {
            warn!("Failed to parse stream frame: {} - Data: {}", err, data);
            ModelApiError::Json(err)
        })?;

        if let Some(usage) = chunk.usage {
            self.prompt_tokens = usage.prompt_tokens;
            self.completion_tokens = usage.completion_tokens;
        }

        let fragment = chunk
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta)
            .and_then(|delta| delta.content)
            .filter(|content| !content.is_empty());

        if let Some(content) = &fragment {
            self.text.push_str(content);
        }
        Ok(fragment)
    }

    /// Accumulated text with the last reported usage
    pub fn finish(self) -> ModelResponse {
        debug!(
            chars = self.text.len(),
            prompt_tokens = self.prompt_tokens,
            completion_tokens = self.completion_tokens,
            "Stream complete"
        );
        ModelResponse {
            text: self.text,
            prompt_tokens: self.prompt_tokens,
            completion_tokens: self.completion_tokens,
        }
    }
}
