//! AnthropicProvider - native Messages API streaming
//!
//! Talks to `/v1/messages` directly so the block-indexed event stream
//! (`content_block_start`, `input_json_delta`, ...) reaches the decoder
//! unchanged, including incremental tool arguments.

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{stream, Stream, StreamExt};
use serde_json::{json, Value};

use crate::logging::Logger;
use crate::types::{BlockKind, CancellationToken, StreamFrame};

use super::error::{ProviderError, ProviderResult};
use super::sse::{SseEvent, SseParser};
use super::traits::{FrameStream, ModelRequest, Provider};

const PROVIDER_NAME: &str = "anthropic";
const DEFAULT_API_BASE: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Streaming client for the Anthropic Messages API
pub struct AnthropicProvider {
    api_key: String,
    api_base: String,
    client: reqwest::Client,
    logger: Arc<dyn Logger>,
}

impl AnthropicProvider {
    /// Create a provider for the public API endpoint
    pub fn new(api_key: impl Into<String>, logger: Arc<dyn Logger>) -> ProviderResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            api_key: api_key.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            client,
            logger,
        })
    }

    /// Use a custom API base URL
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Build the JSON body for a streaming request
    pub fn request_body(request: &ModelRequest) -> Value {
        let mut body = json!({
            "model": request.model,
            "max_tokens": request.max_tokens,
            "stream": true,
            "messages": request.messages,
        });

        if let Some(system) = request.system.as_deref().filter(|s| !s.is_empty()) {
            body["system"] = json!(system);
        }

        if !request.tools.is_empty() {
            let tools: Vec<Value> = request
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "name": t.name,
                        "description": t.description,
                        "input_schema": t.input_schema,
                    })
                })
                .collect();
            body["tools"] = json!(tools);
        }

        body
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn stream_chat(
        &self,
        request: ModelRequest,
        cancel_token: CancellationToken,
    ) -> ProviderResult<FrameStream> {
        let url = format!("{}/v1/messages", self.api_base);
        self.logger.info(&format!(
            "[AnthropicProvider] stream_chat: model={}, messages={}, tools={}",
            request.model,
            request.messages.len(),
            request.tools.len()
        ));

        let body = Self::request_body(&request);
        let send = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send();

        let response = tokio::select! {
            biased;
            _ = cancel_token.cancelled() => return Err(ProviderError::Cancelled),
            response = send => response?,
        };

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            self.logger.error(&format!(
                "[AnthropicProvider] HTTP {}: {}",
                status.as_u16(),
                text
            ));
            return Err(ProviderError::api_error(PROVIDER_NAME, status.as_u16(), text));
        }

        self.logger.debug("[AnthropicProvider] Stream connected");
        Ok(sse_frames(response.bytes_stream(), cancel_token))
    }
}

struct SseState<S> {
    body: Pin<Box<S>>,
    parser: SseParser,
    pending: VecDeque<ProviderResult<StreamFrame>>,
    cancel: CancellationToken,
    done: bool,
}

/// Turn a raw SSE byte stream into frames
///
/// The first error (from the body, an `error` event or cancellation) is
/// yielded once and ends the stream.
pub fn sse_frames<S, B, E>(body: S, cancel: CancellationToken) -> FrameStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<ProviderError> + Send + 'static,
{
    let state = SseState {
        body: Box::pin(body),
        parser: SseParser::new(),
        pending: VecDeque::new(),
        cancel,
        done: false,
    };

    Box::pin(stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                if item.is_err() {
                    state.pending.clear();
                    state.done = true;
                }
                return Some((item, state));
            }
            if state.done {
                return None;
            }

            let next = {
                let cancelled = state.cancel.cancelled();
                tokio::select! {
                    biased;
                    _ = cancelled => None,
                    next = state.body.next() => Some(next),
                }
            };

            match next {
                None => {
                    state.done = true;
                    return Some((Err(ProviderError::Cancelled), state));
                }
                Some(Some(Ok(chunk))) => {
                    for event in state.parser.push(chunk.as_ref()) {
                        if let Some(frame) = parse_event(&event) {
                            state.pending.push_back(frame);
                        }
                    }
                }
                Some(Some(Err(e))) => {
                    state.done = true;
                    return Some((Err(e.into()), state));
                }
                Some(None) => {
                    state.done = true;
                    if let Some(frame) = state.parser.finish().as_ref().and_then(parse_event) {
                        state.pending.push_back(frame);
                    }
                }
            }
        }
    }))
}

/// Map one SSE event to a frame; events without data are skipped
pub fn parse_event(event: &SseEvent) -> Option<ProviderResult<StreamFrame>> {
    if event.data.trim().is_empty() {
        return None;
    }
    let value: Value = match serde_json::from_str(&event.data) {
        Ok(value) => value,
        Err(e) => return Some(Err(e.into())),
    };
    Some(frame_from_value(&value))
}

fn index_of(value: &Value) -> ProviderResult<usize> {
    value
        .get("index")
        .and_then(Value::as_u64)
        .and_then(|i| usize::try_from(i).ok())
        .ok_or_else(|| ProviderError::invalid_response(PROVIDER_NAME, "content block event without index"))
}

fn str_field<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or_default()
}

fn frame_from_value(value: &Value) -> ProviderResult<StreamFrame> {
    let kind = str_field(value, "type");
    let frame = match kind {
        "message_start" => StreamFrame::MessageStart,
        "message_stop" => StreamFrame::MessageStop,
        "content_block_start" => {
            let index = index_of(value)?;
            let block = value.get("content_block").unwrap_or(&Value::Null);
            let block = match str_field(block, "type") {
                "text" => BlockKind::Text,
                "tool_use" => BlockKind::ToolUse {
                    id: str_field(block, "id").to_string(),
                    name: str_field(block, "name").to_string(),
                },
                other => BlockKind::Other { kind: other.to_string() },
            };
            StreamFrame::BlockStart { index, block }
        }
        "content_block_delta" => {
            let index = index_of(value)?;
            let delta = value.get("delta").unwrap_or(&Value::Null);
            match str_field(delta, "type") {
                "text_delta" => StreamFrame::text(index, str_field(delta, "text")),
                "input_json_delta" => StreamFrame::input_json(index, str_field(delta, "partial_json")),
                other => StreamFrame::Unknown { kind: other.to_string() },
            }
        }
        "content_block_stop" => StreamFrame::BlockStop { index: index_of(value)? },
        "error" => {
            let error = value.get("error").unwrap_or(&Value::Null);
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            let status = match str_field(error, "type") {
                "overloaded_error" => 529,
                "rate_limit_error" => 429,
                "invalid_request_error" => 400,
                _ => 500,
            };
            return Err(ProviderError::api_error(PROVIDER_NAME, status, message));
        }
        other => StreamFrame::Unknown { kind: other.to_string() },
    };
    Ok(frame)
}
