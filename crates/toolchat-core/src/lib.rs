//! Toolchat Core
//!
//! A tool-calling conversation loop over streaming LLM APIs.
//! The model is offered the tools of every connected MCP server; each turn
//! streams the model's text to the caller while tool invocations are
//! dispatched and their results fed back, for a bounded number of rounds.
//!
//! ## Turn flow
//!
//! ```rust,ignore
//! use toolchat_core::{ChatRequest, ChatService, EnvSecretStore, TracingLogger};
//!
//! let service = ChatService::from_config(&config, &EnvSecretStore::new(), Arc::new(TracingLogger::new()))?;
//!
//! let mut events = service.start_turn(ChatRequest::prompt("What changed in 2024?")).await?;
//! while let Some(event) = events.recv().await {
//!     print!("{}", event.to_sse());
//! }
//! ```

pub mod types;
pub mod secrets;
pub mod logging;
pub mod config;
pub mod providers;
pub mod decode;
pub mod tools;
pub mod mcp;
pub mod output;
pub mod modes;
pub mod orchestrator;
pub mod service;

// Re-export commonly used types
pub use types::{
    ChatMessage, ContentPart, MessageRole, MessageContent,
    Tool, ToolCall, ToolResult,
    StreamFrame, StreamEvent, BlockKind,
    CancellationToken,
};

pub use secrets::{SecretStore, SecretStoreError, SecretStoreResult, EnvSecretStore, MemorySecretStore};

pub use logging::{Logger, NoOpLogger, TracingLogger};

pub use config::{
    AppConfig, ConfigError, ConfigResult, ConfigLevel, FileConfigProvider,
    ModelSettings, ToolServerConfig, TransportConfig,
};

pub use providers::{
    create_provider, AnthropicProvider, GenaiProvider, MockProvider, MockTurn,
    ModelRequest, Provider, ProviderError, ProviderResult,
};

pub use decode::{decode, StreamDecoder, ToolCallAccumulator};

pub use tools::{GatewayError, GatewayResult, ToolDescriptor, ToolExecutor, ToolGateway, ToolOutput};

// MCP client using official rmcp SDK
pub use mcp::{McpClient, McpConnector, McpError, McpResult};

pub use output::{OutputEvent, OutputReceiver, OutputSender};
pub use modes::ModeTable;
pub use orchestrator::{LoopSettings, Orchestrator, StopReason, TurnOutcome};
pub use service::{ChatError, ChatRequest, ChatResult, ChatService, InboundMessage};
