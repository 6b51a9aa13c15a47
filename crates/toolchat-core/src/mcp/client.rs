//! MCP Client using the official rmcp SDK
//!
//! Connects to MCP servers over stdio (child process), HTTP or Unix socket.

use std::collections::BTreeMap;
#[cfg(unix)]
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rmcp::{
    ServiceExt,
    model::{CallToolRequestParams, CallToolResult, ClientCapabilities, ClientInfo, Implementation, Tool},
    service::{Peer, RunningService},
    RoleClient,
};
use serde_json::Value;
use thiserror::Error;

#[cfg(unix)]
use tokio::net::UnixStream;

use crate::logging::Logger;
use crate::tools::{RemoteTool, ToolOutput, ToolServer};

/// MCP client errors
#[derive(Error, Debug)]
pub enum McpError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Tool call failed: {0}")]
    ToolCallFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),
}

pub type McpResult<T> = Result<T, McpError>;

/// MCP client for one tool server
pub struct McpClient {
    /// Request handle, usable concurrently
    peer: Peer<RoleClient>,
    /// The running service; taken on close
    service: Mutex<Option<RunningService<RoleClient, ClientInfo>>>,
    /// Logger
    logger: Arc<dyn Logger>,
}

fn client_info() -> ClientInfo {
    ClientInfo {
        meta: None,
        protocol_version: Default::default(),
        capabilities: ClientCapabilities::default(),
        client_info: Implementation {
            name: "toolchat".to_string(),
            title: Some("Toolchat".to_string()),
            version: env!("CARGO_PKG_VERSION").to_string(),
            website_url: None,
            icons: None,
        },
    }
}

impl McpClient {
    fn from_service(service: RunningService<RoleClient, ClientInfo>, logger: Arc<dyn Logger>) -> Self {
        Self {
            peer: service.peer().clone(),
            service: Mutex::new(Some(service)),
            logger,
        }
    }

    /// Launch a server as a child process and talk over its stdin/stdout
    ///
    /// The child's stderr is inherited so its diagnostics stay visible.
    pub async fn connect_stdio(
        command: &str,
        args: &[String],
        env: &BTreeMap<String, String>,
        logger: Arc<dyn Logger>,
    ) -> McpResult<Self> {
        use rmcp::transport::{ConfigureCommandExt, TokioChildProcess};

        logger.info(&format!("[McpClient] Spawning: {} {}", command, args.join(" ")));

        let transport = TokioChildProcess::new(tokio::process::Command::new(command).configure(|cmd| {
            cmd.args(args)
                .envs(env.iter())
                .stderr(std::process::Stdio::inherit());
        }))
        .map_err(|e| McpError::ConnectionFailed(format!("spawn {}: {}", command, e)))?;

        let service = client_info()
            .serve(transport)
            .await
            .map_err(|e| McpError::InitializationFailed(e.to_string()))?;

        logger.info("[McpClient] Connected and initialized successfully");

        Ok(Self::from_service(service, logger))
    }

    /// Connect to an MCP server over a Unix socket
    #[cfg(unix)]
    pub async fn connect_unix<P: AsRef<Path>>(
        socket_path: P,
        logger: Arc<dyn Logger>,
    ) -> McpResult<Self> {
        let path = socket_path.as_ref();
        logger.info(&format!("[McpClient] Connecting to Unix socket: {:?}", path));

        let stream = UnixStream::connect(path)
            .await
            .map_err(|e| McpError::ConnectionFailed(e.to_string()))?;

        let service = client_info()
            .serve(stream)
            .await
            .map_err(|e| McpError::InitializationFailed(e.to_string()))?;

        logger.info("[McpClient] Connected and initialized successfully");

        Ok(Self::from_service(service, logger))
    }

    /// Connect to an MCP server over HTTP (Streamable HTTP transport)
    pub async fn connect_http(
        url: &str,
        logger: Arc<dyn Logger>,
    ) -> McpResult<Self> {
        use rmcp::transport::StreamableHttpClientTransport;

        logger.info(&format!("[McpClient] Connecting to HTTP: {}", url));

        let transport = StreamableHttpClientTransport::from_uri(url);

        let service = client_info()
            .serve(transport)
            .await
            .map_err(|e| McpError::InitializationFailed(e.to_string()))?;

        logger.info("[McpClient] Connected and initialized successfully");

        Ok(Self::from_service(service, logger))
    }

    /// List all available tools
    pub async fn list_tools(&self) -> McpResult<Vec<Tool>> {
        let tools = self
            .peer
            .list_all_tools()
            .await
            .map_err(|e| McpError::Protocol(e.to_string()))?;

        self.logger.info(&format!("[McpClient] Listed {} tools", tools.len()));

        Ok(tools)
    }

    /// Call a tool by name
    ///
    /// Non-object arguments are sent as no arguments.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> McpResult<CallToolResult> {
        self.logger.info(&format!("[McpClient] Calling tool: {}", name));

        let params = CallToolRequestParams {
            meta: None,
            name: name.to_owned().into(),
            arguments: arguments.as_object().cloned(),
            task: None,
        };

        self.peer
            .call_tool(params)
            .await
            .map_err(|e| McpError::ToolCallFailed(e.to_string()))
    }

    /// Get server info
    pub fn server_info(&self) -> Option<&Implementation> {
        self.peer.peer_info().map(|info| &info.server_info)
    }

    /// Close the connection; later calls are no-ops
    pub async fn close(&self) -> McpResult<()> {
        let service = self.service.lock().take();
        if let Some(service) = service {
            self.logger.info("[McpClient] Closing connection");
            service
                .cancel()
                .await
                .map_err(|e| McpError::Protocol(e.to_string()))?;
        }
        Ok(())
    }
}

/// Convert an rmcp tool listing entry
pub fn to_remote_tool(tool: Tool) -> RemoteTool {
    RemoteTool {
        name: tool.name.to_string(),
        description: tool.description.map(|s| s.to_string()).unwrap_or_default(),
        input_schema: Value::Object(tool.input_schema.as_ref().clone()),
    }
}

/// Convert a call result into the payload handed back to the model
pub fn to_tool_output(result: CallToolResult) -> McpResult<ToolOutput> {
    let content = serde_json::to_value(&result.content)
        .map_err(|e| McpError::Protocol(format!("unserializable tool result: {}", e)))?;
    Ok(ToolOutput {
        content,
        is_error: result.is_error.unwrap_or(false),
    })
}

#[async_trait]
impl ToolServer for McpClient {
    async fn list_tools(&self) -> McpResult<Vec<RemoteTool>> {
        Ok(McpClient::list_tools(self)
            .await?
            .into_iter()
            .map(to_remote_tool)
            .collect())
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> McpResult<ToolOutput> {
        to_tool_output(McpClient::call_tool(self, name, arguments).await?)
    }

    async fn close(&self) -> McpResult<()> {
        McpClient::close(self).await
    }
}
