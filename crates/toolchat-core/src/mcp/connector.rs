//! Connector that opens MCP clients from configuration

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{ToolServerConfig, TransportConfig};
use crate::logging::Logger;
use crate::tools::{ToolServer, ToolServerConnector};

use super::client::{McpClient, McpError, McpResult};

/// Opens an [`McpClient`] over whichever transport a server is configured with
pub struct McpConnector {
    logger: Arc<dyn Logger>,
}

impl McpConnector {
    pub fn new(logger: Arc<dyn Logger>) -> Self {
        Self { logger }
    }
}

#[async_trait]
impl ToolServerConnector for McpConnector {
    async fn connect(&self, config: &ToolServerConfig) -> McpResult<Arc<dyn ToolServer>> {
        let logger = Arc::clone(&self.logger);
        let client = match &config.transport {
            TransportConfig::Stdio { command, args, env } => {
                McpClient::connect_stdio(command, args, env, logger).await?
            }
            TransportConfig::Http { url } => McpClient::connect_http(url, logger).await?,
            #[cfg(unix)]
            TransportConfig::Unix { path } => McpClient::connect_unix(path, logger).await?,
            #[cfg(not(unix))]
            TransportConfig::Unix { path } => {
                return Err(McpError::ConnectionFailed(format!(
                    "unix sockets are not supported on this platform: {}",
                    path.display()
                )));
            }
        };

        if let Some(info) = client.server_info() {
            self.logger.info(&format!(
                "[McpConnector] {} is {} {}",
                config.name, info.name, info.version
            ));
        }

        Ok(Arc::new(client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::NoOpLogger;

    #[tokio::test]
    async fn test_stdio_spawn_failure() {
        let connector = McpConnector::new(Arc::new(NoOpLogger::new()));
        let config = ToolServerConfig::stdio("missing", "/nonexistent/toolchat-test-server", vec![]);

        let result = connector.connect(&config).await;
        assert!(matches!(result, Err(McpError::ConnectionFailed(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unix_connect_failure() {
        let dir = tempfile::tempdir().unwrap();
        let connector = McpConnector::new(Arc::new(NoOpLogger::new()));
        let config = ToolServerConfig {
            name: "sock".to_string(),
            transport: TransportConfig::Unix { path: dir.path().join("absent.sock") },
        };

        let result = connector.connect(&config).await;
        assert!(matches!(result, Err(McpError::ConnectionFailed(_))));
    }
}
