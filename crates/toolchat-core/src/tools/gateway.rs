//! Tool server gateway
//!
//! Owns the connection to every configured tool server and the merged,
//! qualified tool index built from them. The gateway is a cheap cloneable
//! handle; every clone shares the same connections.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::{join_all, BoxFuture, FutureExt, Shared};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;

use crate::config::ToolServerConfig;
use crate::logging::Logger;
use crate::mcp::{McpConnector, McpResult};
use crate::types::Tool;

use super::descriptor::{split_qualified, ToolDescriptor, QUALIFIED_SEPARATOR};
use super::error::{GatewayError, GatewayResult};
use super::server::{ToolOutput, ToolServer, ToolServerConnector};

/// One connected server and its tools, keyed by local name
struct Connection {
    server: Arc<dyn ToolServer>,
    tools: BTreeMap<String, ToolDescriptor>,
}

type InitFuture = Shared<BoxFuture<'static, ()>>;

struct Inner {
    configs: Vec<ToolServerConfig>,
    connector: Arc<dyn ToolServerConnector>,
    connections: RwLock<BTreeMap<String, Arc<Connection>>>,
    /// The connection attempt currently in flight, tagged with its id
    in_flight: Mutex<Option<(u64, InitFuture)>>,
    next_attempt: AtomicU64,
    /// Bumped by every shutdown; attempts from an older generation are stale
    generation: AtomicU64,
    logger: Arc<dyn Logger>,
}

/// Shared handle to the set of tool server connections
#[derive(Clone)]
pub struct ToolGateway {
    inner: Arc<Inner>,
}

impl ToolGateway {
    /// Create a gateway over `configs` using `connector` to reach them
    pub fn new(
        configs: Vec<ToolServerConfig>,
        connector: Arc<dyn ToolServerConnector>,
        logger: Arc<dyn Logger>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                configs,
                connector,
                connections: RwLock::new(BTreeMap::new()),
                in_flight: Mutex::new(None),
                next_attempt: AtomicU64::new(0),
                generation: AtomicU64::new(0),
                logger,
            }),
        }
    }

    /// Create a gateway that speaks MCP to every server
    pub fn mcp(configs: Vec<ToolServerConfig>, logger: Arc<dyn Logger>) -> Self {
        let connector = Arc::new(McpConnector::new(Arc::clone(&logger)));
        Self::new(configs, connector, logger)
    }

    /// Connect every configured server that is not connected yet
    ///
    /// Concurrent callers share one attempt. Servers that fail are logged and
    /// left out; the next call tries them again.
    pub async fn initialise(&self) {
        let attempt = {
            let mut slot = self.inner.in_flight.lock();
            match slot.as_ref() {
                Some((_, attempt)) => attempt.clone(),
                None => {
                    let id = self.inner.next_attempt.fetch_add(1, Ordering::SeqCst);
                    let generation = self.inner.generation.load(Ordering::SeqCst);
                    let attempt = Inner::connect_missing(Arc::clone(&self.inner), id, generation)
                        .boxed()
                        .shared();
                    *slot = Some((id, attempt.clone()));
                    attempt
                }
            }
        };
        attempt.await;
    }

    /// Every connected server's tools, sorted by server then local name
    pub fn tool_descriptors(&self) -> Vec<ToolDescriptor> {
        self.inner
            .connections
            .read()
            .values()
            .flat_map(|conn| conn.tools.values().cloned())
            .collect()
    }

    /// Call a tool by qualified name and return the server's payload verbatim
    pub async fn call_tool(&self, qualified_name: &str, arguments: Value) -> GatewayResult<ToolOutput> {
        let (server, local) = split_qualified(qualified_name)
            .ok_or_else(|| GatewayError::InvalidToolName(qualified_name.to_string()))?;

        let connection = self
            .inner
            .connections
            .read()
            .get(server)
            .cloned()
            .ok_or_else(|| GatewayError::ServerNotFound(server.to_string()))?;

        self.inner.logger.debug(&format!(
            "[ToolGateway] Calling {} on {}",
            local, server
        ));

        connection
            .server
            .call_tool(local, arguments)
            .await
            .map_err(|source| GatewayError::Server {
                server: server.to_string(),
                source,
            })
    }

    /// Names of the connected servers, sorted
    pub fn connected_servers(&self) -> Vec<String> {
        self.inner.connections.read().keys().cloned().collect()
    }

    pub fn is_connected(&self, server: &str) -> bool {
        self.inner.connections.read().contains_key(server)
    }

    /// Close every connection and forget them
    ///
    /// Safe while an initialise attempt is still running: whatever it
    /// connects afterwards is closed instead of registered.
    pub async fn shutdown(&self) {
        let drained: Vec<(String, Arc<Connection>)> = {
            let mut connections = self.inner.connections.write();
            self.inner.generation.fetch_add(1, Ordering::SeqCst);
            std::mem::take(&mut *connections).into_iter().collect()
        };
        *self.inner.in_flight.lock() = None;

        self.inner.logger.info(&format!(
            "[ToolGateway] Shutting down {} connection(s)",
            drained.len()
        ));

        for (name, connection) in drained {
            if let Err(e) = connection.server.close().await {
                self.inner
                    .logger
                    .warn(&format!("[ToolGateway] Error closing {}: {}", name, e));
            }
        }
    }
}

impl Inner {
    async fn connect_missing(inner: Arc<Inner>, attempt: u64, generation: u64) {
        let missing: Vec<&ToolServerConfig> = {
            let connections = inner.connections.read();
            inner
                .configs
                .iter()
                .filter(|config| !connections.contains_key(&config.name))
                .collect()
        };

        if !missing.is_empty() {
            inner.logger.info(&format!(
                "[ToolGateway] Connecting to {} tool server(s)",
                missing.len()
            ));
        }

        let results = join_all(missing.iter().map(|config| inner.connect_one(config))).await;

        for (config, result) in missing.iter().zip(results) {
            match result {
                Ok(connection) => {
                    let stale = {
                        let mut connections = inner.connections.write();
                        if inner.generation.load(Ordering::SeqCst) == generation {
                            inner.logger.info(&format!(
                                "[ToolGateway] Connected to {} ({} tools)",
                                config.name,
                                connection.tools.len()
                            ));
                            connections.insert(config.name.clone(), Arc::new(connection));
                            None
                        } else {
                            Some(connection)
                        }
                    };
                    if let Some(connection) = stale {
                        inner.logger.info(&format!(
                            "[ToolGateway] Discarding connection to {} made before shutdown",
                            config.name
                        ));
                        if let Err(e) = connection.server.close().await {
                            inner.logger.warn(&format!(
                                "[ToolGateway] Error closing {}: {}",
                                config.name, e
                            ));
                        }
                    }
                }
                Err(e) => {
                    inner.logger.warn(&format!(
                        "[ToolGateway] Failed to connect to {} ({}): {}",
                        config.name,
                        config.transport.kind(),
                        e
                    ));
                }
            }
        }

        let mut slot = inner.in_flight.lock();
        if matches!(slot.as_ref(), Some((id, _)) if *id == attempt) {
            *slot = None;
        }
    }

    async fn connect_one(&self, config: &ToolServerConfig) -> McpResult<Connection> {
        let server = self.connector.connect(config).await?;

        let remote_tools = match server.list_tools().await {
            Ok(tools) => tools,
            Err(e) => {
                if let Err(close_err) = server.close().await {
                    self.logger.warn(&format!(
                        "[ToolGateway] Error closing {} after failed tool listing: {}",
                        config.name, close_err
                    ));
                }
                return Err(e);
            }
        };

        let mut tools = BTreeMap::new();
        for tool in remote_tools {
            if tool.name.contains(QUALIFIED_SEPARATOR) {
                self.logger.warn(&format!(
                    "[ToolGateway] Skipping {}/{}: local names may not contain '{}'",
                    config.name, tool.name, QUALIFIED_SEPARATOR
                ));
                continue;
            }
            let descriptor =
                ToolDescriptor::new(&config.name, &tool.name, tool.description, tool.input_schema);
            if tools.insert(tool.name.clone(), descriptor).is_some() {
                self.logger.warn(&format!(
                    "[ToolGateway] {} lists {} twice; keeping the last",
                    config.name, tool.name
                ));
            }
        }

        Ok(Connection { server, tools })
    }
}

/// What the orchestrator needs from the tool layer
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Definitions to offer the model
    fn tool_definitions(&self) -> Vec<Tool>;

    /// Call a tool by qualified name
    async fn call_tool(&self, qualified_name: &str, arguments: Value) -> GatewayResult<ToolOutput>;
}

#[async_trait]
impl ToolExecutor for ToolGateway {
    fn tool_definitions(&self) -> Vec<Tool> {
        self.tool_descriptors().iter().map(ToolDescriptor::to_tool).collect()
    }

    async fn call_tool(&self, qualified_name: &str, arguments: Value) -> GatewayResult<ToolOutput> {
        ToolGateway::call_tool(self, qualified_name, arguments).await
    }
}
