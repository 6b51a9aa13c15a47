//! Streaming response types
//!
//! Two layers: [`StreamFrame`] is what a provider hands over, one per
//! upstream stream chunk; [`StreamEvent`] is what the decoder produces once
//! frames have been demultiplexed and tool arguments reassembled.

use serde::{Deserialize, Serialize};
use super::tool::ToolCall;

/// Kind of content block opened by a [`StreamFrame::BlockStart`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockKind {
    /// Plain text block
    Text,
    /// Tool invocation block
    ToolUse { id: String, name: String },
    /// Any block type the decoder does not act on (thinking, etc.)
    Other { kind: String },
}

/// Low-level frame from a model stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamFrame {
    /// The model response has started
    MessageStart,
    /// A content block was opened at `index`
    BlockStart { index: usize, block: BlockKind },
    /// Text fragment for the open block at `index`
    TextDelta { index: usize, text: String },
    /// Fragment of JSON-encoded tool arguments for the block at `index`
    InputJsonDelta {
        index: usize,
        #[serde(rename = "partialJson")]
        partial_json: String,
    },
    /// The block at `index` is complete
    BlockStop { index: usize },
    /// The model response is complete
    MessageStop,
    /// Frame type with no meaning for the loop; ignored downstream
    Unknown { kind: String },
}

impl StreamFrame {
    /// Create a text delta frame
    pub fn text(index: usize, text: impl Into<String>) -> Self {
        StreamFrame::TextDelta { index, text: text.into() }
    }

    /// Create a tool-use block start frame
    pub fn tool_start(index: usize, id: impl Into<String>, name: impl Into<String>) -> Self {
        StreamFrame::BlockStart {
            index,
            block: BlockKind::ToolUse { id: id.into(), name: name.into() },
        }
    }

    /// Create a tool argument fragment frame
    pub fn input_json(index: usize, partial_json: impl Into<String>) -> Self {
        StreamFrame::InputJsonDelta { index, partial_json: partial_json.into() }
    }
}

/// Semantic event produced by the stream decoder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Text content fragment
    TextDelta { text: String },
    /// The model started a tool invocation
    ToolCallStarted { id: String, name: String },
    /// Partial JSON arguments for an open tool invocation
    ToolInputDelta {
        id: String,
        #[serde(rename = "partialJson")]
        partial_json: String,
    },
    /// A tool invocation with fully parsed input
    ToolCallCompleted {
        #[serde(rename = "toolCall")]
        tool_call: ToolCall,
    },
    /// The model finished this response
    TurnComplete,
}

impl StreamEvent {
    /// Create a text event
    pub fn text(text: impl Into<String>) -> Self {
        StreamEvent::TextDelta { text: text.into() }
    }

    /// Get the text content if this is a text event
    pub fn as_text(&self) -> Option<&str> {
        match self {
            StreamEvent::TextDelta { text } => Some(text),
            _ => None,
        }
    }

    /// Get the tool call if this is a completed invocation
    pub fn as_tool_call(&self) -> Option<&ToolCall> {
        match self {
            StreamEvent::ToolCallCompleted { tool_call } => Some(tool_call),
            _ => None,
        }
    }
}
