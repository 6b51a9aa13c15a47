//! Tool server boundary
//!
//! The gateway only needs two calls from a server: list its tools and call
//! one. Connecting is split out so tests can count or fail connections.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::ToolServerConfig;
use crate::mcp::McpResult;

/// A tool as a server reports it, under its local name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteTool {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

impl RemoteTool {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: serde_json::json!({ "type": "object" }),
        }
    }

    pub fn with_schema(mut self, schema: Value) -> Self {
        self.input_schema = schema;
        self
    }
}

/// Result payload of one tool call, passed through untouched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    /// The server's content blocks
    pub content: Value,
    /// Set when the server itself reported the call as failed
    #[serde(rename = "isError", default)]
    pub is_error: bool,
}

impl ToolOutput {
    pub fn new(content: Value) -> Self {
        Self { content, is_error: false }
    }

    pub fn error(content: Value) -> Self {
        Self { content, is_error: true }
    }
}

/// A live connection to one tool server
#[async_trait]
pub trait ToolServer: Send + Sync {
    /// Fetch the server's tools
    async fn list_tools(&self) -> McpResult<Vec<RemoteTool>>;

    /// Call a tool by its local name
    async fn call_tool(&self, name: &str, arguments: Value) -> McpResult<ToolOutput>;

    /// Close the connection; calling it twice is harmless
    async fn close(&self) -> McpResult<()>;
}

/// Opens connections to configured tool servers
#[async_trait]
pub trait ToolServerConnector: Send + Sync {
    async fn connect(&self, config: &ToolServerConfig) -> McpResult<Arc<dyn ToolServer>>;
}
