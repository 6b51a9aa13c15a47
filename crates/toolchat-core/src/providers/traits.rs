//! Provider trait definition

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

use crate::types::{CancellationToken, ChatMessage, StreamFrame, Tool};
use super::error::ProviderResult;

/// One model call: the conversation so far plus what the model may use
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRequest {
    /// Model identifier as used by the provider's API
    pub model: String,
    /// Instruction string sent separately from the history
    pub system: Option<String>,
    /// Conversation history, alternating user/assistant
    pub messages: Vec<ChatMessage>,
    /// Tools available for the model to use
    pub tools: Vec<Tool>,
    /// Maximum tokens to generate
    pub max_tokens: u32,
}

impl ModelRequest {
    /// Create a request with no instructions and no tools
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            system: None,
            messages,
            tools: Vec::new(),
            max_tokens: crate::config::DEFAULT_MAX_TOKENS,
        }
    }

    /// Set the instruction string
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Set tools
    pub fn with_tools(mut self, tools: Vec<Tool>) -> Self {
        self.tools = tools;
        self
    }

    /// Set max tokens
    pub fn with_max_tokens(mut self, tokens: u32) -> Self {
        self.max_tokens = tokens;
        self
    }
}

/// Type alias for the streaming response
pub type FrameStream = Pin<Box<dyn Stream<Item = ProviderResult<StreamFrame>> + Send>>;

/// A streaming model endpoint
///
/// Implementations hand back raw frames; reassembling text and tool
/// invocations is the decoder's job.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Get the provider name (e.g., "anthropic", "openai")
    fn name(&self) -> &str;

    /// Start a streaming model call
    ///
    /// Errors returned here (and from the stream) are fatal to the turn.
    async fn stream_chat(
        &self,
        request: ModelRequest,
        cancel_token: CancellationToken,
    ) -> ProviderResult<FrameStream>;
}
