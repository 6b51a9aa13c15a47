//! Tool registry and tool server gateway
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  Orchestrator                               │
//! │    uses dyn ToolExecutor                    │
//! └─────────────────────────────────────────────┘
//!           │ tool_definitions / call_tool("srv__echo")
//!           ▼
//! ┌─────────────────────────────────────────────┐
//! │  ToolGateway                                │
//! │                                             │
//! │  - One shared connect-all attempt at a time │
//! │  - Qualified index: server__local           │
//! │  - Routes calls on the first "__"           │
//! └─────────────────────────────────────────────┘
//!           │ ToolServerConnector / ToolServer
//!           ▼
//! ┌─────────────────────────────────────────────┐
//! │  MCP servers (stdio, HTTP, Unix socket)     │
//! └─────────────────────────────────────────────┘
//! ```

mod descriptor;
mod error;
mod server;
mod gateway;

pub use descriptor::{qualify, split_qualified, ToolDescriptor, QUALIFIED_SEPARATOR};
pub use error::{GatewayError, GatewayResult};
pub use server::{RemoteTool, ToolOutput, ToolServer, ToolServerConnector};
pub use gateway::{ToolExecutor, ToolGateway};
