//! MCP (Model Context Protocol) client module
//!
//! Uses the official rmcp SDK to connect to tool servers.
//! Supports stdio (child process), Unix socket and HTTP transports.
//!
//! # Example
//!
//! ```rust,ignore
//! use toolchat_core::mcp::McpClient;
//! use std::sync::Arc;
//!
//! let logger: Arc<dyn Logger> = Arc::new(NoOpLogger::new());
//!
//! // Spawn a server over stdio
//! let client = McpClient::connect_stdio("uv", &["run".into(), "strategy-review-mcp".into()], &env, logger).await?;
//!
//! // List available tools
//! let tools = client.list_tools().await?;
//!
//! // Call a tool
//! let result = client.call_tool("search", json!({ "query": "funding" })).await?;
//! ```

mod client;
mod connector;

pub use client::{to_remote_tool, to_tool_output, McpClient, McpError, McpResult};
pub use connector::McpConnector;

// Re-export rmcp types that consumers might need
pub use rmcp::model::{Tool as McpTool, CallToolResult as McpToolResult};
