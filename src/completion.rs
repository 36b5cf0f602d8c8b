//! Streaming chat completion abstraction.
//!
//! [`CompletionClient`] is the seam between the pipeline and the chat model.
//! The provided [`OpenAiCompletion`] streams tokens from any
//! OpenAI-compatible `/chat/completions` endpoint over server-sent events.

use std::collections::VecDeque;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::json;

use crate::config::CompletionConfig;
use crate::error::PipelineError;
use crate::models::ChatTurn;

/// A stream of answer fragments from the completion model.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String, PipelineError>> + Send>>;

/// A client that streams a chat completion for a prompt.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    fn model_name(&self) -> &str;

    /// Start a streamed completion for the system prompt and conversation.
    ///
    /// Request-level failures (auth, rate limits) surface here; mid-stream
    /// failures surface as an `Err` item on the returned stream.
    async fn stream_completion(
        &self,
        system_prompt: &str,
        turns: &[ChatTurn],
    ) -> Result<TokenStream, PipelineError>;
}

/// Streaming completion client for OpenAI-compatible HTTP APIs.
pub struct OpenAiCompletion {
    client: reqwest::Client,
    config: CompletionConfig,
    api_key: String,
}

impl OpenAiCompletion {
    pub fn new(config: CompletionConfig, api_key: String) -> Result<Self, PipelineError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PipelineError::Config(format!("http client: {e}")))?;
        Ok(Self {
            client,
            config,
            api_key,
        })
    }
}

#[async_trait]
impl CompletionClient for OpenAiCompletion {
    fn model_name(&self) -> &str {
        &self.config.model
    }

    async fn stream_completion(
        &self,
        system_prompt: &str,
        turns: &[ChatTurn],
    ) -> Result<TokenStream, PipelineError> {
        let mut messages = vec![json!({"role": "system", "content": system_prompt})];
        for turn in turns {
            messages.push(json!({"role": turn.role.as_str(), "content": turn.content}));
        }

        let url = format!(
            "{}/chat/completions",
            self.config.api_base.trim_end_matches('/')
        );
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.config.model,
                "messages": messages,
                "stream": true,
            }))
            .send()
            .await
            .map_err(|e| PipelineError::CompletionFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_error_status(status, &body));
        }

        Ok(sse_token_stream(Box::pin(response.bytes_stream())))
    }
}

/// Map a non-success completion response to an error variant.
///
/// Exhausted quota surfaces as HTTP 402 or as an `insufficient_quota` error
/// code in the body (OpenAI reports it under 429).
fn classify_error_status(status: reqwest::StatusCode, body: &str) -> PipelineError {
    if status == reqwest::StatusCode::PAYMENT_REQUIRED || body.contains("insufficient_quota") {
        return PipelineError::CompletionQuotaExceeded;
    }
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return PipelineError::CompletionRateLimited;
    }
    PipelineError::CompletionFailed(format!("status {status}: {body}"))
}

#[derive(Deserialize)]
struct ChatCompletionChunk {
    choices: Vec<ChatChunkChoice>,
}

#[derive(Deserialize)]
struct ChatChunkChoice {
    delta: ChatDelta,
}

#[derive(Deserialize, Default)]
struct ChatDelta {
    content: Option<String>,
}

#[derive(Debug, PartialEq)]
enum SseEvent {
    Token(String),
    Done,
    Ignore,
}

/// Parse one SSE line from a chat completion stream.
///
/// Lines without a `data:` prefix, keep-alive blanks, and chunks without
/// text content are ignored. `data: [DONE]` terminates the stream.
fn parse_sse_line(line: &str) -> SseEvent {
    let Some(data) = line.strip_prefix("data:") else {
        return SseEvent::Ignore;
    };
    let data = data.trim();
    if data == "[DONE]" {
        return SseEvent::Done;
    }
    match serde_json::from_str::<ChatCompletionChunk>(data) {
        Ok(chunk) => chunk
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.delta.content)
            .filter(|s| !s.is_empty())
            .map(SseEvent::Token)
            .unwrap_or(SseEvent::Ignore),
        Err(_) => SseEvent::Ignore,
    }
}

struct SseState {
    inner: Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>,
    buffer: String,
    pending: VecDeque<String>,
    done: bool,
}

fn sse_token_stream(
    inner: Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>,
) -> TokenStream {
    let state = SseState {
        inner,
        buffer: String::new(),
        pending: VecDeque::new(),
        done: false,
    };
    Box::pin(futures::stream::try_unfold(state, |mut state| async move {
        loop {
            if let Some(token) = state.pending.pop_front() {
                return Ok(Some((token, state)));
            }
            if state.done {
                return Ok(None);
            }
            match state.inner.next().await {
                Some(Ok(bytes)) => {
                    state.buffer.push_str(&String::from_utf8_lossy(&bytes));
                    while let Some(pos) = state.buffer.find('\n') {
                        let line: String = state.buffer.drain(..=pos).collect();
                        match parse_sse_line(line.trim()) {
                            SseEvent::Token(token) => state.pending.push_back(token),
                            SseEvent::Done => state.done = true,
                            SseEvent::Ignore => {}
                        }
                    }
                }
                Some(Err(e)) => {
                    return Err(PipelineError::CompletionFailed(e.to_string()));
                }
                // connection closed without [DONE]: drain what we have
                None => state.done = true,
            }
        }
    }))
}
