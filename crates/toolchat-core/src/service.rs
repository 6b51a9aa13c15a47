//! Chat service
//!
//! Entry point for front-ends: validates an inbound request, resolves its
//! mode, makes sure tool servers are connected and runs the turn on a
//! background task that writes into an output channel.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{AppConfig, ConfigError};
use crate::logging::Logger;
use crate::modes::{ModeTable, DEFAULT_MODE};
use crate::orchestrator::{LoopSettings, Orchestrator, TurnOutcome};
use crate::output::{channel, OutputReceiver, OutputSender};
use crate::providers::{create_provider, Provider, ProviderError};
use crate::secrets::SecretStore;
use crate::tools::ToolGateway;
use crate::types::{CancellationToken, ChatMessage, MessageContent, MessageRole};

/// Buffered output events per turn
const OUTPUT_CAPACITY: usize = 64;

/// Request-level errors, reported before any streaming starts
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Messages required")]
    EmptyMessages,

    #[error("Invalid request body: {0}")]
    InvalidBody(#[from] serde_json::Error),

    #[error("Unknown mode: {0}")]
    UnknownMode(String),

    #[error("Configuration error: {0}")]
    Config(ConfigError),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl From<ConfigError> for ChatError {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::UnknownMode(mode) => ChatError::UnknownMode(mode),
            other => ChatError::Config(other),
        }
    }
}

pub type ChatResult<T> = Result<T, ChatError>;

/// One prior message as sent by a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub role: MessageRole,
    pub content: String,
}

impl From<InboundMessage> for ChatMessage {
    fn from(msg: InboundMessage) -> Self {
        ChatMessage {
            role: msg.role,
            content: MessageContent::Text(msg.content),
        }
    }
}

/// Body of a chat request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub messages: Option<Vec<InboundMessage>>,
    /// Mode name; `default` when absent
    #[serde(default, alias = "skill")]
    pub mode: Option<String>,
}

impl ChatRequest {
    pub fn new(messages: Vec<InboundMessage>) -> Self {
        Self {
            messages: Some(messages),
            mode: None,
        }
    }

    /// Single user message
    pub fn prompt(text: impl Into<String>) -> Self {
        Self::new(vec![InboundMessage {
            role: MessageRole::User,
            content: text.into(),
        }])
    }

    pub fn with_mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = Some(mode.into());
        self
    }

    /// Parse a JSON request body
    pub fn from_json(body: &[u8]) -> ChatResult<Self> {
        Ok(serde_json::from_slice(body)?)
    }
}

/// A request that passed validation
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedTurn {
    pub messages: Vec<ChatMessage>,
    pub instructions: String,
}

/// Runs chat turns for a front-end
pub struct ChatService {
    orchestrator: Arc<Orchestrator>,
    gateway: ToolGateway,
    modes: ModeTable,
    logger: Arc<dyn Logger>,
}

impl ChatService {
    pub fn new(
        provider: Arc<dyn Provider>,
        gateway: ToolGateway,
        modes: ModeTable,
        settings: LoopSettings,
        logger: Arc<dyn Logger>,
    ) -> Self {
        let orchestrator = Orchestrator::new(
            provider,
            Arc::new(gateway.clone()),
            settings,
            Arc::clone(&logger),
        );
        Self {
            orchestrator: Arc::new(orchestrator),
            gateway,
            modes,
            logger,
        }
    }

    /// Build everything from configuration
    ///
    /// Fails when the provider's credentials cannot be found. Tool servers
    /// are not contacted until the first turn or an explicit `initialise`.
    pub fn from_config(
        config: &AppConfig,
        secrets: &dyn SecretStore,
        logger: Arc<dyn Logger>,
    ) -> ChatResult<Self> {
        config.validate()?;
        let provider = create_provider(&config.model, secrets, Arc::clone(&logger))?;
        let gateway = ToolGateway::mcp(config.servers.clone(), Arc::clone(&logger));
        Ok(Self::new(
            provider,
            gateway,
            ModeTable::with_overrides(&config.modes),
            LoopSettings::from_config(config),
            logger,
        ))
    }

    pub fn gateway(&self) -> &ToolGateway {
        &self.gateway
    }

    pub fn modes(&self) -> &ModeTable {
        &self.modes
    }

    pub fn settings(&self) -> &LoopSettings {
        self.orchestrator.settings()
    }

    /// Check a request and resolve its mode
    pub fn validate(&self, request: ChatRequest) -> ChatResult<PreparedTurn> {
        let messages = request.messages.unwrap_or_default();
        if messages.is_empty() {
            return Err(ChatError::EmptyMessages);
        }

        let mode = request.mode.as_deref().filter(|m| !m.is_empty()).unwrap_or(DEFAULT_MODE);
        let instructions = self.modes.instructions(mode)?.to_string();

        Ok(PreparedTurn {
            messages: messages.into_iter().map(ChatMessage::from).collect(),
            instructions,
        })
    }

    /// Validate, connect tool servers, then run the turn in the background
    ///
    /// Dropping the returned receiver cancels the turn at its next event.
    pub async fn start_turn(&self, request: ChatRequest) -> ChatResult<OutputReceiver> {
        let turn = self.validate(request)?;
        self.gateway.initialise().await;

        let (tx, rx) = channel(OUTPUT_CAPACITY);
        let orchestrator = Arc::clone(&self.orchestrator);
        let logger = Arc::clone(&self.logger);

        tokio::spawn(async move {
            let outcome = orchestrator
                .run_turn(turn.messages, &turn.instructions, &tx, CancellationToken::new())
                .await;
            logger.debug(&format!(
                "[ChatService] Background turn finished: {:?} after {} rounds",
                outcome.stop, outcome.rounds
            ));
        });

        Ok(rx)
    }

    /// Validate, connect tool servers, then run the turn on this task
    pub async fn run_turn(
        &self,
        request: ChatRequest,
        output: &OutputSender,
        cancel: CancellationToken,
    ) -> ChatResult<TurnOutcome> {
        let turn = self.validate(request)?;
        self.gateway.initialise().await;
        Ok(self
            .orchestrator
            .run_turn(turn.messages, &turn.instructions, output, cancel)
            .await)
    }

    /// Close every tool server connection
    pub async fn shutdown(&self) {
        self.logger.info("[ChatService] Shutting down");
        self.gateway.shutdown().await;
    }
}
