//! services/api/src/adapters/completion.rs
//!
//! The adapter for the remote completion backend. It implements the
//! `CompletionService` port against an OpenAI-style `/v1/chat/completions`
//! endpoint authenticated with a bearer secret.
//!
//! The backend may answer a streaming request either with an event stream or
//! with one JSON body. Both shapes are normalized into the same ordered stream
//! of text deltas; a JSON body is replayed word by word.

use async_trait::async_trait;
use bytes::Bytes;
use chat_studio_core::ports::{
    CompletionRequest, CompletionService, PortError, PortResult, TokenStream,
};
use futures::stream::{self, Stream, StreamExt};
use reqwest::{header, Client, Response};
use serde_json::{json, Value};
use std::pin::Pin;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::Config;

/// An adapter that implements `CompletionService` over HTTP.
#[derive(Clone)]
pub struct HttpCompletionAdapter {
    client: Client,
    endpoint: String,
    secret: String,
    model: Option<String>,
    typing_delay: Duration,
}

impl HttpCompletionAdapter {
    /// Creates a new adapter. `timeout` bounds each upstream call as a whole.
    pub fn new(
        base_url: &str,
        secret: &str,
        model: Option<String>,
        timeout: Duration,
        typing_delay: Duration,
    ) -> PortResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PortError::Configuration(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: format!("{}/v1/chat/completions", base_url.trim_end_matches('/')),
            secret: secret.to_string(),
            model,
            typing_delay,
        })
    }

    /// Builds the adapter from the loaded configuration. Fails with
    /// `PortError::Configuration` when the endpoint or secret is missing.
    pub fn from_config(config: &Config) -> PortResult<Self> {
        let base_url = config
            .ai_model_url
            .as_deref()
            .ok_or_else(|| PortError::Configuration("AI_MODEL_URL is not set".to_string()))?;
        let secret = config
            .ai_api_secret
            .as_deref()
            .ok_or_else(|| PortError::Configuration("AI_API_SECRET is not set".to_string()))?;
        Self::new(
            base_url,
            secret,
            config.ai_model.clone(),
            config.ai_timeout,
            config.typing_delay,
        )
    }

    fn body(&self, request: &CompletionRequest, stream: bool) -> Value {
        let mut body = json!({
            "messages": [{ "role": "user", "content": request.prompt }],
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "stream": stream,
        });
        if let Some(model) = &self.model {
            body["model"] = json!(model);
        }
        body
    }

    async fn send(&self, request: &CompletionRequest, stream: bool) -> PortResult<Response> {
        let accept = if stream {
            "text/event-stream, application/json"
        } else {
            "application/json"
        };
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.secret)
            .header(header::ACCEPT, accept)
            .json(&self.body(request, stream))
            .send()
            .await
            .map_err(upstream)?;

        let status = response.status();
        if !status.is_success() {
            let detail = response
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            warn!("Completion backend returned {}: {}", status, detail);
            return Err(PortError::Upstream(format!(
                "completion backend returned {}",
                status
            )));
        }
        Ok(response)
    }
}

fn upstream(e: reqwest::Error) -> PortError {
    if e.is_timeout() {
        PortError::Upstream("completion backend timed out".to_string())
    } else {
        PortError::Upstream(e.to_string())
    }
}

fn is_event_stream(response: &Response) -> bool {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|ct| ct.starts_with("text/event-stream") || ct.starts_with("text/plain"))
}

async fn read_body(response: Response) -> PortResult<Value> {
    response.json().await.map_err(upstream)
}

#[async_trait]
impl CompletionService for HttpCompletionAdapter {
    async fn complete(&self, request: &CompletionRequest) -> PortResult<String> {
        let response = self.send(request, false).await?;
        let body = read_body(response).await?;
        completion_text(&body)
            .ok_or_else(|| PortError::Upstream("completion response carried no content".to_string()))
    }

    async fn complete_streaming(&self, request: &CompletionRequest) -> PortResult<TokenStream> {
        let response = self.send(request, true).await?;
        if is_event_stream(&response) {
            debug!("Relaying event-stream completion");
            return Ok(Box::pin(sse_deltas(response.bytes_stream())));
        }

        debug!("Completion backend answered with a single body, replaying it word by word");
        // An empty answer is a finished turn with nothing to say, not a failure.
        let text = completion_text(&read_body(response).await?).unwrap_or_default();
        Ok(simulate_typing(text, self.typing_delay))
    }
}

//=========================================================================================
// Response Normalization
//=========================================================================================

/// The full text of a single JSON completion: a top-level `content` field or
/// the first choice's message.
pub fn completion_text(body: &Value) -> Option<String> {
    body.get("content")
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty())
        .or_else(|| {
            body.pointer("/choices/0/message/content")
                .and_then(Value::as_str)
        })
        .map(str::to_string)
}

fn delta_text(payload: &Value) -> Option<&str> {
    payload
        .pointer("/choices/0/delta/content")
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty())
        .or_else(|| payload.get("content").and_then(Value::as_str))
}

/// What a single line of an event stream contributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    Delta(String),
    Skip,
    /// The end-of-stream sentinel.
    Done,
}

/// Interprets one line of an event stream.
///
/// Malformed payloads are not fatal: a `data:` line that is not JSON, and any
/// other non-comment line, is passed through as raw text.
pub fn parse_line(line: &str) -> LineOutcome {
    let line = line.trim_end_matches('\r');
    if line.trim().is_empty() || line.starts_with(':') {
        return LineOutcome::Skip;
    }

    let Some(data) = line.strip_prefix("data:") else {
        return LineOutcome::Delta(line.to_string());
    };
    let data = data.strip_prefix(' ').unwrap_or(data);
    if data.trim() == "[DONE]" {
        return LineOutcome::Done;
    }
    if data.trim().is_empty() {
        return LineOutcome::Skip;
    }

    match serde_json::from_str::<Value>(data) {
        Ok(payload) => match delta_text(&payload) {
            Some(text) if !text.is_empty() => LineOutcome::Delta(text.to_string()),
            _ => LineOutcome::Skip,
        },
        Err(_) => LineOutcome::Delta(data.to_string()),
    }
}

/// Reassembles lines from arbitrarily split byte chunks.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn push(&mut self, chunk: &[u8]) {
        self.pending.extend_from_slice(chunk);
    }

    /// The next complete line, without its terminator.
    pub fn next_line(&mut self) -> Option<String> {
        let end = self.pending.iter().position(|b| *b == b'\n')?;
        let line: Vec<u8> = self.pending.drain(..=end).collect();
        Some(String::from_utf8_lossy(&line[..end]).into_owned())
    }

    /// Whatever is left once the byte stream has ended.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        Some(String::from_utf8_lossy(&rest).into_owned())
    }
}

struct SseState<S> {
    bytes: Pin<Box<S>>,
    lines: LineBuffer,
    finished: bool,
}

/// Turns an event-stream body into text deltas, in arrival order.
pub fn sse_deltas<S, E>(bytes: S) -> impl Stream<Item = PortResult<String>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let state = SseState {
        bytes: Box::pin(bytes),
        lines: LineBuffer::default(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if state.finished {
                return None;
            }

            if let Some(line) = state.lines.next_line() {
                match parse_line(&line) {
                    LineOutcome::Delta(text) => return Some((Ok(text), state)),
                    LineOutcome::Skip => continue,
                    LineOutcome::Done => {
                        debug!("Completion stream reached its end marker");
                        return None;
                    }
                }
            }

            match state.bytes.next().await {
                Some(Ok(chunk)) => state.lines.push(&chunk),
                Some(Err(e)) => {
                    state.finished = true;
                    return Some((Err(PortError::Upstream(e.to_string())), state));
                }
                None => {
                    state.finished = true;
                    if let Some(LineOutcome::Delta(text)) =
                        state.lines.finish().map(|rest| parse_line(&rest))
                    {
                        return Some((Ok(text), state));
                    }
                    return None;
                }
            }
        }
    })
}

/// Splits `text` on single spaces into words that concatenate back to `text`.
pub fn typing_words(text: &str) -> Vec<String> {
    let words: Vec<&str> = text.split(' ').collect();
    let last = words.len().saturating_sub(1);
    words
        .iter()
        .enumerate()
        .map(|(i, word)| {
            if i < last {
                format!("{} ", word)
            } else {
                word.to_string()
            }
        })
        .filter(|word| !word.is_empty())
        .collect()
}

/// Replays a full text as a stream of words with `delay` between them.
pub fn simulate_typing(text: String, delay: Duration) -> TokenStream {
    let words = typing_words(&text);
    Box::pin(stream::iter(words.into_iter().enumerate()).then(move |(i, word)| async move {
        if i > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok::<_, PortError>(word)
    }))
}
