//! Tool-calling conversation loop
//!
//! One turn: call the model with the full history, forward its text as it
//! streams, dispatch every tool invocation it asked for, fold the results
//! back into the history and call the model again. Stops when a response
//! carries no invocations or after `max_rounds` dispatch rounds.
//!
//! ```text
//!   Requesting ──> Streaming ──(no calls)──> Done
//!       ^              │
//!       │              v
//!       └──────── Dispatching ──(round limit)──> Done
//!
//!   Requesting / Streaming ──(model error)──> Failed ──> Done
//! ```

use std::sync::Arc;

use futures::future::join_all;
use futures::StreamExt;

use crate::config::{AppConfig, DEFAULT_MAX_ROUNDS, DEFAULT_MAX_TOKENS};
use crate::decode::{decode, EventStream};
use crate::logging::Logger;
use crate::output::{Disconnected, OutputSender};
use crate::providers::{ModelRequest, Provider, ProviderError};
use crate::tools::ToolExecutor;
use crate::types::{
    CancellationToken, ChatMessage, ContentPart, MessageRole, StreamEvent, Tool, ToolCall, ToolResult,
};

/// Progress notice sent before a tool is called
pub fn progress_notice(tool_name: &str) -> String {
    format!("\n\n*Querying {}...*\n\n", tool_name)
}

/// Limits and model selection for one turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopSettings {
    pub model: String,
    pub max_tokens: u32,
    /// Hard bound on tool-dispatch rounds
    pub max_rounds: usize,
}

impl LoopSettings {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            max_tokens: DEFAULT_MAX_TOKENS,
            max_rounds: DEFAULT_MAX_ROUNDS,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the round limit; zero is raised to one
    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds.max(1);
        self
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.model.model.clone())
            .with_max_tokens(config.model.max_tokens)
            .with_max_rounds(config.max_rounds)
    }
}

/// Why a turn ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The model answered without asking for tools
    Completed,
    /// `max_rounds` dispatch rounds ran
    RoundLimit,
    /// The model call failed
    Failed(String),
    /// The client went away
    Disconnected,
}

/// Result of one turn
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// Dispatch rounds performed
    pub rounds: usize,
    /// The conversation, including everything appended during the turn
    pub messages: Vec<ChatMessage>,
    pub stop: StopReason,
}

/// Text and completed invocations from one model response
#[derive(Debug, Default)]
struct RoundOutput {
    text: String,
    calls: Vec<ToolCall>,
}

enum TurnState {
    Requesting,
    Streaming(EventStream),
    Dispatching(RoundOutput),
    Failed(String),
    Done(StopReason),
}

/// Drives turns against one provider and one tool executor
pub struct Orchestrator {
    provider: Arc<dyn Provider>,
    tools: Arc<dyn ToolExecutor>,
    settings: LoopSettings,
    logger: Arc<dyn Logger>,
}

impl Orchestrator {
    pub fn new(
        provider: Arc<dyn Provider>,
        tools: Arc<dyn ToolExecutor>,
        settings: LoopSettings,
        logger: Arc<dyn Logger>,
    ) -> Self {
        Self {
            provider,
            tools,
            settings,
            logger,
        }
    }

    pub fn settings(&self) -> &LoopSettings {
        &self.settings
    }

    /// Run one turn to completion
    ///
    /// Every turn ends with a `Done` event on `output` unless the receiver is
    /// gone. A failed model call produces exactly one `Error` event before it.
    /// When the receiver goes away, `cancel` is triggered and no further model
    /// calls are made.
    pub async fn run_turn(
        &self,
        messages: Vec<ChatMessage>,
        instructions: &str,
        output: &OutputSender,
        cancel: CancellationToken,
    ) -> TurnOutcome {
        let tools = self.tools.tool_definitions();
        let mut messages = messages;
        let mut rounds = 0;
        let mut state = TurnState::Requesting;

        self.logger.info(&format!(
            "[Orchestrator] Turn started: messages={}, tools={}, max_rounds={}",
            messages.len(),
            tools.len(),
            self.settings.max_rounds
        ));

        let stop = loop {
            state = match state {
                TurnState::Requesting => {
                    if cancel.is_cancelled() || output.is_closed() {
                        cancel.cancel();
                        TurnState::Done(StopReason::Disconnected)
                    } else {
                        self.request(&messages, instructions, &tools, &cancel).await
                    }
                }
                TurnState::Streaming(events) => self.stream(events, output, &cancel).await,
                TurnState::Dispatching(round) => {
                    if round.calls.is_empty() {
                        if !round.text.is_empty() {
                            messages.push(ChatMessage::assistant(round.text));
                        }
                        TurnState::Done(StopReason::Completed)
                    } else {
                        match self.dispatch(round, &mut messages, output, &cancel).await {
                            Err(Disconnected) => TurnState::Done(StopReason::Disconnected),
                            Ok(()) => {
                                rounds += 1;
                                if rounds >= self.settings.max_rounds {
                                    self.logger.warn(&format!(
                                        "[Orchestrator] Round limit {} reached",
                                        self.settings.max_rounds
                                    ));
                                    TurnState::Done(StopReason::RoundLimit)
                                } else {
                                    TurnState::Requesting
                                }
                            }
                        }
                    }
                }
                TurnState::Failed(message) => {
                    self.logger.error(&format!("[Orchestrator] Turn failed: {}", message));
                    if output.error(message.clone()).await.is_err() {
                        cancel.cancel();
                        TurnState::Done(StopReason::Disconnected)
                    } else {
                        TurnState::Done(StopReason::Failed(message))
                    }
                }
                TurnState::Done(stop) => break stop,
            };
        };

        if stop != StopReason::Disconnected && output.done().await.is_err() {
            cancel.cancel();
        }

        self.logger.info(&format!("[Orchestrator] Turn ended after {} rounds: {:?}", rounds, stop));

        TurnOutcome { rounds, messages, stop }
    }

    /// Requesting: submit one model call
    async fn request(
        &self,
        messages: &[ChatMessage],
        instructions: &str,
        tools: &[Tool],
        cancel: &CancellationToken,
    ) -> TurnState {
        let request = ModelRequest::new(self.settings.model.clone(), messages.to_vec())
            .with_system(instructions)
            .with_tools(tools.to_vec())
            .with_max_tokens(self.settings.max_tokens);

        self.logger.debug(&format!(
            "[Orchestrator] Calling {} with {} messages",
            self.provider.name(),
            messages.len()
        ));

        match self.provider.stream_chat(request, cancel.clone()).await {
            Ok(frames) => TurnState::Streaming(decode(frames, Arc::clone(&self.logger))),
            Err(ProviderError::Cancelled) => TurnState::Done(StopReason::Disconnected),
            Err(e) => TurnState::Failed(e.to_string()),
        }
    }

    /// Streaming: forward text, collect completed invocations
    async fn stream(
        &self,
        mut events: EventStream,
        output: &OutputSender,
        cancel: &CancellationToken,
    ) -> TurnState {
        let mut round = RoundOutput::default();

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return TurnState::Done(StopReason::Disconnected),
                _ = output.closed() => {
                    cancel.cancel();
                    return TurnState::Done(StopReason::Disconnected);
                }
                next = events.next() => next,
            };

            match next {
                None => return TurnState::Dispatching(round),
                Some(Ok(StreamEvent::TextDelta { text })) => {
                    if output.text(text.as_str()).await.is_err() {
                        cancel.cancel();
                        return TurnState::Done(StopReason::Disconnected);
                    }
                    round.text.push_str(&text);
                }
                Some(Ok(StreamEvent::ToolCallCompleted { tool_call })) => {
                    self.logger.debug(&format!(
                        "[Orchestrator] Tool call detected: {} ({})",
                        tool_call.name, tool_call.id
                    ));
                    round.calls.push(tool_call);
                }
                Some(Ok(_)) => {}
                Some(Err(ProviderError::Cancelled)) => return TurnState::Done(StopReason::Disconnected),
                Some(Err(e)) => return TurnState::Failed(e.to_string()),
            }
        }
    }

    /// Dispatching: call every tool concurrently and record the round
    ///
    /// Progress notices and recorded results follow detection order.
    async fn dispatch(
        &self,
        round: RoundOutput,
        messages: &mut Vec<ChatMessage>,
        output: &OutputSender,
        cancel: &CancellationToken,
    ) -> Result<(), Disconnected> {
        self.logger.info(&format!("[Orchestrator] Dispatching {} tool calls", round.calls.len()));

        for call in &round.calls {
            if let Err(e) = output.progress(progress_notice(&call.name)).await {
                cancel.cancel();
                return Err(e);
            }
        }

        let results = tokio::select! {
            biased;
            _ = output.closed() => {
                self.logger.info("[Orchestrator] Client left during dispatch");
                cancel.cancel();
                return Err(Disconnected);
            }
            results = join_all(round.calls.iter().map(|call| self.execute(call))) => results,
        };

        let mut assistant = Vec::with_capacity(round.calls.len() + 1);
        if !round.text.is_empty() {
            assistant.push(ContentPart::text(round.text));
        }
        assistant.extend(round.calls.iter().map(ToolCall::to_content_part));

        messages.push(ChatMessage::with_parts(MessageRole::Assistant, assistant));
        messages.push(ChatMessage::with_parts(
            MessageRole::User,
            results.iter().map(ToolResult::to_content_part).collect(),
        ));
        Ok(())
    }

    /// Call one tool; failures become error results
    async fn execute(&self, call: &ToolCall) -> ToolResult {
        match self.tools.call_tool(&call.name, call.input.clone()).await {
            Ok(output) => match serde_json::to_string(&output.content) {
                Ok(content) if output.is_error => ToolResult::error(&call.id, content),
                Ok(content) => ToolResult::success(&call.id, content),
                Err(e) => ToolResult::error(&call.id, format!("Tool call failed: {}", e)),
            },
            Err(e) => {
                self.logger.warn(&format!("[Orchestrator] Tool {} failed: {}", call.name, e));
                ToolResult::error(&call.id, format!("Tool call failed: {}", e))
            }
        }
    }
}
