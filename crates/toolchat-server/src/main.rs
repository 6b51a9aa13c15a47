//! Entry point for toolchat.
//!
//! Installs the tracing subscriber, parses CLI arguments via [`cli`] and
//! dispatches to the chosen subcommand.

mod cli;
mod http;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so `ask` output stays clean on stdout
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = cli::parse();
    cli::run(cli).await
}
