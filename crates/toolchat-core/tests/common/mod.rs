#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use toolchat_core::output::{channel, OutputEvent};
use toolchat_core::tools::{RemoteTool, ToolServer, ToolServerConnector};
use toolchat_core::{
    CancellationToken, ChatMessage, GatewayError, GatewayResult, Logger, McpError, McpResult,
    NoOpLogger, Orchestrator, Tool, ToolExecutor, ToolOutput, ToolServerConfig, TurnOutcome,
};

pub fn logger() -> Arc<dyn Logger> {
    Arc::new(NoOpLogger::new())
}

/// Run one turn and collect everything it emitted
pub async fn run_turn(orchestrator: &Orchestrator, prompt: &str) -> (TurnOutcome, Vec<OutputEvent>) {
    let (tx, rx) = channel(256);
    let outcome = orchestrator
        .run_turn(vec![ChatMessage::user(prompt)], "test instructions", &tx, CancellationToken::new())
        .await;
    drop(tx);
    (outcome, rx.collect().await)
}

/// Model text only, progress notices excluded
pub fn model_text(events: &[OutputEvent]) -> String {
    events
        .iter()
        .filter_map(|e| match e {
            OutputEvent::Text(t) => Some(t.as_str()),
            _ => None,
        })
        .collect()
}

pub fn progress(events: &[OutputEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            OutputEvent::Progress(t) => Some(t.clone()),
            _ => None,
        })
        .collect()
}

/// Tool executor with per-tool latency that records calls
#[derive(Default)]
pub struct RecordingTools {
    delays: HashMap<String, u64>,
    calls: Mutex<Vec<(String, Value)>>,
    completed: Mutex<Vec<String>>,
}

impl RecordingTools {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, tool: &str, delay_ms: u64) -> Self {
        self.delays.insert(tool.to_string(), delay_ms);
        self
    }

    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().clone()
    }

    /// Tool names in the order their calls finished
    pub fn completion_order(&self) -> Vec<String> {
        self.completed.lock().clone()
    }
}

#[async_trait]
impl ToolExecutor for RecordingTools {
    fn tool_definitions(&self) -> Vec<Tool> {
        vec![Tool::new("srv__echo", "[srv] Echo the arguments")]
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> GatewayResult<ToolOutput> {
        self.calls.lock().push((name.to_string(), arguments.clone()));
        if let Some(delay) = self.delays.get(name) {
            tokio::time::sleep(Duration::from_millis(*delay)).await;
        }
        self.completed.lock().push(name.to_string());
        if name == "srv__missing" {
            return Err(GatewayError::ServerNotFound("srv".to_string()));
        }
        Ok(ToolOutput::new(json!({ "tool": name, "args": arguments })))
    }
}

/// Server exposing `echo`, recording the calls it receives
pub struct EchoServer {
    calls: Arc<Mutex<Vec<(String, Value)>>>,
}

#[async_trait]
impl ToolServer for EchoServer {
    async fn list_tools(&self) -> McpResult<Vec<RemoteTool>> {
        Ok(vec![RemoteTool::new("echo", "Echo the arguments")])
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> McpResult<ToolOutput> {
        self.calls.lock().push((name.to_string(), arguments.clone()));
        Ok(ToolOutput::new(json!([{ "type": "text", "text": arguments.to_string() }])))
    }

    async fn close(&self) -> McpResult<()> {
        Ok(())
    }
}

/// Connector counting attempts per server
///
/// Servers named in `failures` fail that many times before connecting.
#[derive(Default)]
pub struct CountingConnector {
    attempts: Mutex<HashMap<String, usize>>,
    failures: Mutex<HashMap<String, usize>>,
    delay_ms: u64,
    total: AtomicUsize,
    pub calls: Arc<Mutex<Vec<(String, Value)>>>,
}

impl CountingConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    pub fn failing(self, server: &str, times: usize) -> Self {
        self.failures.lock().insert(server.to_string(), times);
        self
    }

    pub fn attempts(&self, server: &str) -> usize {
        self.attempts.lock().get(server).copied().unwrap_or(0)
    }

    pub fn total_attempts(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ToolServerConnector for CountingConnector {
    async fn connect(&self, config: &ToolServerConfig) -> McpResult<Arc<dyn ToolServer>> {
        *self.attempts.lock().entry(config.name.clone()).or_insert(0) += 1;
        self.total.fetch_add(1, Ordering::SeqCst);

        if self.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        }

        {
            let mut failures = self.failures.lock();
            if let Some(left) = failures.get_mut(&config.name) {
                if *left > 0 {
                    *left -= 1;
                    return Err(McpError::ConnectionFailed(format!("{} refused", config.name)));
                }
            }
        }

        Ok(Arc::new(EchoServer {
            calls: Arc::clone(&self.calls),
        }))
    }
}

pub fn http_servers(names: &[&str]) -> Vec<ToolServerConfig> {
    names
        .iter()
        .map(|name| ToolServerConfig::http(*name, format!("http://{}.test/mcp", name)))
        .collect()
}
