//! Mock provider for testing
//!
//! Provides deterministic, scripted responses without network dependencies.
//! Each model call consumes one [`MockTurn`]; every request is recorded so
//! tests can assert on what the loop actually sent.

use async_trait::async_trait;
use futures::{stream, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use super::error::{ProviderError, ProviderResult};
use super::traits::{FrameStream, ModelRequest, Provider};
use crate::logging::Logger;
use crate::types::{BlockKind, CancellationToken, ChatMessage, MessageRole, StreamFrame, ToolCall};

/// Scripted response to one model call
#[derive(Debug, Clone, PartialEq)]
pub enum MockTurn {
    /// Stream exactly these frames
    Frames(Vec<StreamFrame>),
    /// Fail the call with this message
    Error(String),
}

impl MockTurn {
    /// A plain text answer, split into small deltas
    pub fn text(text: impl Into<String>) -> Self {
        let text = text.into();
        let mut frames = vec![
            StreamFrame::MessageStart,
            StreamFrame::BlockStart { index: 0, block: BlockKind::Text },
        ];
        frames.extend(split_into_chunks(&text, 10).into_iter().map(|c| StreamFrame::text(0, c)));
        frames.push(StreamFrame::BlockStop { index: 0 });
        frames.push(StreamFrame::MessageStop);
        MockTurn::Frames(frames)
    }

    /// A single tool invocation
    pub fn tool_use(id: impl Into<String>, name: impl Into<String>, input: Value) -> Self {
        Self::tool_uses(None, vec![ToolCall::new(id, name, input)])
    }

    /// Optional leading text followed by several tool invocations
    ///
    /// Each invocation's arguments are streamed in two fragments.
    pub fn tool_uses(text: Option<&str>, calls: Vec<ToolCall>) -> Self {
        let mut frames = vec![StreamFrame::MessageStart];
        let mut index = 0;
        if let Some(text) = text {
            frames.push(StreamFrame::BlockStart { index, block: BlockKind::Text });
            frames.push(StreamFrame::text(index, text));
            frames.push(StreamFrame::BlockStop { index });
            index += 1;
        }
        for call in calls {
            frames.push(StreamFrame::tool_start(index, call.id, call.name));
            let json = call.input.to_string();
            let mid = json.char_indices().map(|(i, _)| i).nth(json.chars().count() / 2).unwrap_or(0);
            let (head, tail) = json.split_at(mid);
            for fragment in [head, tail] {
                if !fragment.is_empty() {
                    frames.push(StreamFrame::input_json(index, fragment));
                }
            }
            frames.push(StreamFrame::BlockStop { index });
            index += 1;
        }
        frames.push(StreamFrame::MessageStop);
        MockTurn::Frames(frames)
    }

    /// Raw frames
    pub fn frames(frames: Vec<StreamFrame>) -> Self {
        MockTurn::Frames(frames)
    }

    /// A failing call
    pub fn error(message: impl Into<String>) -> Self {
        MockTurn::Error(message.into())
    }
}

/// Mock response mode
#[derive(Debug, Clone)]
pub enum MockMode {
    /// Echo back the last user text
    Echo,
    /// Play turns in order; calls past the end fail
    Script(Vec<MockTurn>),
    /// Answer every call with the same turn
    Repeat(MockTurn),
}

/// Mock LLM provider for testing
pub struct MockProvider {
    mode: MockMode,
    chunk_delay_ms: u64,
    calls: Mutex<usize>,
    requests: Mutex<Vec<ModelRequest>>,
    logger: Arc<dyn Logger>,
}

impl MockProvider {
    fn with_mode(mode: MockMode, logger: Arc<dyn Logger>) -> Self {
        Self {
            mode,
            chunk_delay_ms: 0,
            calls: Mutex::new(0),
            requests: Mutex::new(Vec::new()),
            logger,
        }
    }

    /// Create an echo provider (echoes back user message)
    pub fn echo(logger: Arc<dyn Logger>) -> Self {
        Self::with_mode(MockMode::Echo, logger)
    }

    /// Create a provider that plays `turns` in order
    pub fn scripted(turns: Vec<MockTurn>, logger: Arc<dyn Logger>) -> Self {
        Self::with_mode(MockMode::Script(turns), logger)
    }

    /// Create a provider that answers every call with `turn`
    pub fn repeating(turn: MockTurn, logger: Arc<dyn Logger>) -> Self {
        Self::with_mode(MockMode::Repeat(turn), logger)
    }

    /// Set delay between frames
    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.chunk_delay_ms = delay_ms;
        self
    }

    /// Number of model calls made so far
    pub fn call_count(&self) -> usize {
        *self.calls.lock()
    }

    /// Every request received, in order
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().clone()
    }

    /// Extract last user text content
    fn last_user_text(messages: &[ChatMessage]) -> String {
        messages
            .iter()
            .rev()
            .filter(|m| m.role == MessageRole::User)
            .find_map(|m| m.text().filter(|t| !t.is_empty()))
            .unwrap_or("Hello from MockProvider!")
            .to_string()
    }

    fn next_turn(&self, request: &ModelRequest, call: usize) -> MockTurn {
        match &self.mode {
            MockMode::Echo => {
                MockTurn::text(format!("Echo: {}", Self::last_user_text(&request.messages)))
            }
            MockMode::Script(turns) => turns
                .get(call)
                .cloned()
                .unwrap_or_else(|| MockTurn::error(format!("script exhausted after {} turns", turns.len()))),
            MockMode::Repeat(turn) => turn.clone(),
        }
    }
}

/// Split text into chunks of at most `size` characters
fn split_into_chunks(text: &str, size: usize) -> Vec<String> {
    if size == 0 || text.is_empty() {
        return vec![text.to_string()];
    }

    text.chars()
        .collect::<Vec<_>>()
        .chunks(size)
        .map(|c| c.iter().collect())
        .collect()
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn stream_chat(
        &self,
        request: ModelRequest,
        cancel_token: CancellationToken,
    ) -> ProviderResult<FrameStream> {
        let call = {
            let mut calls = self.calls.lock();
            *calls += 1;
            *calls - 1
        };
        let turn = self.next_turn(&request, call);
        self.requests.lock().push(request);

        self.logger.debug(&format!("[MockProvider] stream_chat call {}", call + 1));

        let frames = match turn {
            MockTurn::Frames(frames) => frames,
            MockTurn::Error(message) => {
                return Err(ProviderError::Other(format!("Mock error: {}", message)));
            }
        };

        let delay_ms = self.chunk_delay_ms;
        let stream = stream::iter(frames.into_iter().enumerate()).then(move |(i, frame)| {
            let cancel = cancel_token.clone();
            async move {
                if i > 0 && delay_ms > 0 {
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }
                if cancel.is_cancelled() {
                    return Err(ProviderError::Cancelled);
                }
                Ok(frame)
            }
        });

        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::NoOpLogger;
    use serde_json::json;

    fn test_logger() -> Arc<dyn Logger> {
        Arc::new(NoOpLogger::new())
    }

    async fn run(provider: &MockProvider, text: &str) -> Vec<ProviderResult<StreamFrame>> {
        let request = ModelRequest::new("mock-echo", vec![ChatMessage::user(text)]);
        match provider.stream_chat(request, CancellationToken::new()).await {
            Ok(stream) => stream.collect().await,
            Err(e) => vec![Err(e)],
        }
    }

    fn text_of(frames: &[ProviderResult<StreamFrame>]) -> String {
        frames
            .iter()
            .filter_map(|f| match f {
                Ok(StreamFrame::TextDelta { text, .. }) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_echo_mode() {
        let provider = MockProvider::echo(test_logger());
        let frames = run(&provider, "Hello, world!").await;

        assert_eq!(text_of(&frames), "Echo: Hello, world!");
        assert!(matches!(frames.last(), Some(Ok(StreamFrame::MessageStop))));
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_script_plays_in_order_then_fails() {
        let provider = MockProvider::scripted(
            vec![MockTurn::text("first"), MockTurn::text("second")],
            test_logger(),
        );

        assert_eq!(text_of(&run(&provider, "a").await), "first");
        assert_eq!(text_of(&run(&provider, "b").await), "second");

        let exhausted = run(&provider, "c").await;
        assert!(matches!(exhausted[0], Err(ProviderError::Other(_))));
        assert_eq!(provider.requests().len(), 3);
        assert_eq!(provider.requests()[1].messages[0].text(), Some("b"));
    }

    #[test]
    fn test_tool_use_frames() {
        let turn = MockTurn::tool_use("toolu_1", "srv__echo", json!({"x": 1}));
        let frames = match turn {
            MockTurn::Frames(frames) => frames,
            other => panic!("unexpected turn {:?}", other),
        };

        assert_eq!(frames[1], StreamFrame::tool_start(0, "toolu_1", "srv__echo"));
        let json: String = frames
            .iter()
            .filter_map(|f| match f {
                StreamFrame::InputJsonDelta { partial_json, .. } => Some(partial_json.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(json, "{\"x\":1}");
        assert_eq!(frames.last(), Some(&StreamFrame::MessageStop));
    }

    #[tokio::test]
    async fn test_error_turn() {
        let provider = MockProvider::repeating(MockTurn::error("boom"), test_logger());
        let frames = run(&provider, "hi").await;
        assert_eq!(frames.len(), 1);
        assert!(frames[0].is_err());
    }

    #[tokio::test]
    async fn test_cancellation() {
        let provider = MockProvider::repeating(MockTurn::text("Long response that should be cancelled"), test_logger())
            .with_delay(20);
        let cancel = CancellationToken::new();
        let request = ModelRequest::new("mock", vec![ChatMessage::user("hi")]);

        let mut stream = provider.stream_chat(request, cancel.clone()).await.unwrap();
        assert!(matches!(stream.next().await, Some(Ok(StreamFrame::MessageStart))));

        cancel.cancel();
        assert!(matches!(stream.next().await, Some(Err(ProviderError::Cancelled))));
    }

    #[test]
    fn test_chunk_splitting() {
        assert_eq!(split_into_chunks("Hello, world!", 5), vec!["Hello", ", wor", "ld!"]);
    }
}
