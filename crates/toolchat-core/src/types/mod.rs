//! Core types for model interactions
//!
//! This module contains the shared types used by providers, the stream
//! decoder, the tool gateway and the orchestrator.

mod message;
mod tool;
mod stream;
mod cancellation;

pub use message::{ChatMessage, ContentPart, MessageRole, MessageContent};
pub use tool::{Tool, ToolCall, ToolResult};
pub use stream::{BlockKind, StreamEvent, StreamFrame};
pub use cancellation::CancellationToken;
