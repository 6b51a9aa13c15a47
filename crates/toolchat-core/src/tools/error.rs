//! Tool gateway errors

use thiserror::Error;

use crate::mcp::McpError;

/// Errors from routing or executing one tool call
///
/// All of these are recoverable: the orchestrator reports them to the model
/// as an error tool result and the turn continues.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Invalid tool name: {0}")]
    InvalidToolName(String),

    #[error("Tool server not found: {0}")]
    ServerNotFound(String),

    #[error("{server}: {source}")]
    Server {
        server: String,
        #[source]
        source: McpError,
    },
}

pub type GatewayResult<T> = Result<T, GatewayError>;
