//! Command-line interface definition and dispatch.
//!
//! Uses [`clap`] derive macros. Without a subcommand the HTTP server is
//! started.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::info;

use toolchat_core::config::load_layered;
use toolchat_core::output::{self, OutputEvent};
use toolchat_core::{
    AppConfig, CancellationToken, ChatRequest, ChatService, ConfigLevel, EnvSecretStore,
    FileConfigProvider, StopReason, TracingLogger,
};

use crate::http;

/// Top-level CLI structure.
#[derive(Parser, Debug)]
#[command(name = "toolchat", version, about = "Chat with an LLM that can call MCP tools")]
pub struct Cli {
    /// Config file to use instead of the user and workspace files
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve the chat API over HTTP (default)
    Serve {
        /// Address to listen on, overriding the config
        #[arg(short, long)]
        listen: Option<String>,
    },
    /// Connect to every tool server and list the tools offered to the model
    Tools,
    /// Run one turn and print the answer
    Ask {
        /// The question to ask
        #[arg(required = true)]
        prompt: Vec<String>,
        /// Mode selecting the instructions
        #[arg(short, long)]
        mode: Option<String>,
    },
}

pub fn parse() -> Cli {
    Cli::parse()
}

/// Read config files, apply environment overrides and validate
///
/// An explicit path must exist. Otherwise the user config is read, then the
/// workspace config under the current directory on top of it.
pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig> {
    let layers = match explicit {
        Some(path) => {
            if !path.exists() {
                bail!("config file not found: {}", path.display());
            }
            vec![FileConfigProvider::new(path, ConfigLevel::Explicit)]
        }
        None => {
            let cwd = std::env::current_dir().context("cannot determine current directory")?;
            vec![FileConfigProvider::user(), FileConfigProvider::workspace(cwd)]
        }
    };

    for layer in layers.iter().filter(|l| l.exists()) {
        info!("Loading {} config from {}", layer.level().as_str(), layer.path().display());
    }

    let mut config = load_layered(&layers)?;
    config.apply_env_overrides()?;
    config.validate()?;
    Ok(config)
}

/// Dispatch the parsed command.
pub async fn run(cli: Cli) -> Result<()> {
    let mut config = load_config(cli.config.as_deref())?;
    let command = cli.command.unwrap_or(Commands::Serve { listen: None });

    if let Commands::Serve { listen: Some(listen) } = &command {
        config.listen = listen.clone();
    }

    let service = Arc::new(ChatService::from_config(
        &config,
        &EnvSecretStore::new(),
        Arc::new(TracingLogger::new()),
    )?);

    let result = match command {
        Commands::Serve { .. } => serve(&config, Arc::clone(&service)).await,
        Commands::Tools => list_tools(&service).await,
        Commands::Ask { prompt, mode } => ask(&service, prompt.join(" "), mode).await,
    };

    service.shutdown().await;
    result
}

async fn serve(config: &AppConfig, service: Arc<ChatService>) -> Result<()> {
    let listener = TcpListener::bind(&config.listen)
        .await
        .with_context(|| format!("failed to bind {}", config.listen))?;

    // Connect tool servers up front so the first request is not slowed down
    service.gateway().initialise().await;

    http::serve(listener, service, shutdown_signal()).await;
    Ok(())
}

async fn list_tools(service: &ChatService) -> Result<()> {
    let gateway = service.gateway();
    gateway.initialise().await;

    let tools = gateway.tool_descriptors();
    if tools.is_empty() {
        println!("No tools available.");
        return Ok(());
    }
    for tool in tools {
        println!("{}\t{}", tool.qualified_name, tool.description);
    }
    Ok(())
}

async fn ask(service: &ChatService, prompt: String, mode: Option<String>) -> Result<()> {
    let mut request = ChatRequest::prompt(prompt);
    request.mode = mode;

    let (tx, mut rx) = output::channel(64);

    let turn = async {
        let tx = tx;
        let outcome = service.run_turn(request, &tx, CancellationToken::new()).await;
        drop(tx);
        outcome
    };

    let print = async {
        let mut stdout = std::io::stdout();
        while let Some(event) = rx.recv().await {
            match event {
                OutputEvent::Text(text) | OutputEvent::Progress(text) => {
                    let _ = write!(stdout, "{}", text);
                    let _ = stdout.flush();
                }
                OutputEvent::Error(message) => eprintln!("error: {}", message),
                OutputEvent::Done => {
                    let _ = writeln!(stdout);
                }
            }
        }
    };

    let (outcome, ()) = tokio::join!(turn, print);
    let outcome = outcome?;

    match outcome.stop {
        StopReason::Failed(message) => bail!("turn failed: {}", message),
        StopReason::RoundLimit => {
            info!("Stopped after the {}-round limit", outcome.rounds);
            Ok(())
        }
        StopReason::Completed | StopReason::Disconnected => Ok(()),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_command_is_serve() {
        let cli = Cli::parse_from(["toolchat"]);
        assert!(cli.command.is_none());

        let cli = Cli::parse_from(["toolchat", "--config", "x.yaml", "ask", "what", "now", "-m", "review"]);
        assert_eq!(cli.config, Some(PathBuf::from("x.yaml")));
        match cli.command {
            Some(Commands::Ask { prompt, mode }) => {
                assert_eq!(prompt, vec!["what", "now"]);
                assert_eq!(mode.as_deref(), Some("review"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_load_explicit_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "model:\n  provider: mock\nmax_rounds: 3\n").unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.model.provider, "mock");

        assert!(load_config(Some(&dir.path().join("missing.yaml"))).is_err());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "max_rounds: 0\n").unwrap();
        assert!(load_config(Some(&path)).is_err());
    }
}
