//! Adapter between toolchat types and genai types
//!
//! genai has no notion of block-indexed streaming: text arrives as chunks and
//! tool calls are captured whole at the end of the stream. The conversions
//! here re-shape that into the frame vocabulary the decoder expects.

use std::future::Future;
use std::pin::Pin;

use genai::chat::{
    ChatMessage as GenaiMessage, ChatOptions as GenaiOptions, ChatStreamEvent,
    MessageContent as GenaiContent, Tool as GenaiTool, ToolCall as GenaiToolCall,
};
use genai::resolver::{AuthData, AuthResolver, Endpoint, ServiceTargetResolver};
use genai::{adapter::AdapterKind, Client, ModelIden, ServiceTarget};
use serde_json::Value;

use crate::types::{BlockKind, ChatMessage, ContentPart, MessageContent, MessageRole, StreamFrame, Tool};

// ============================================================================
// Message Conversion: toolchat -> genai
// ============================================================================

/// Render structured parts as text; tool blocks are flattened
fn flatten_parts(parts: Vec<ContentPart>) -> String {
    parts
        .into_iter()
        .map(|p| match p {
            ContentPart::Text { text } => text,
            ContentPart::ToolUse { id, name, input } => {
                format!("[Tool call {} ({})]: {}", name, id, input)
            }
            ContentPart::ToolResult { tool_use_id, content, is_error } => {
                if is_error {
                    format!("[Tool error for {}]: {}", tool_use_id, content)
                } else {
                    format!("[Tool result for {}]: {}", tool_use_id, content)
                }
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Convert a toolchat ChatMessage to a genai ChatMessage
pub fn to_genai_message(msg: ChatMessage) -> GenaiMessage {
    let content = match msg.content {
        MessageContent::Text(text) => GenaiContent::from(text),
        MessageContent::Parts(parts) => GenaiContent::from(flatten_parts(parts)),
    };

    match msg.role {
        MessageRole::User => GenaiMessage::user(content),
        MessageRole::Assistant => GenaiMessage::assistant(content),
    }
}

/// Convert a vector of toolchat messages to genai messages
pub fn to_genai_messages(messages: Vec<ChatMessage>) -> Vec<GenaiMessage> {
    messages.into_iter().map(to_genai_message).collect()
}

// ============================================================================
// Tool Conversion: toolchat -> genai
// ============================================================================

/// Convert a toolchat Tool to a genai Tool
pub fn to_genai_tool(tool: Tool) -> GenaiTool {
    GenaiTool::new(&tool.name)
        .with_description(&tool.description)
        .with_schema(tool.input_schema)
}

/// Convert toolchat tools to genai tools
pub fn to_genai_tools(tools: Vec<Tool>) -> Vec<GenaiTool> {
    tools.into_iter().map(to_genai_tool).collect()
}

/// Chat options for a streaming request
pub fn to_genai_options(max_tokens: u32) -> GenaiOptions {
    GenaiOptions::default()
        .with_max_tokens(max_tokens)
        // Capture tool calls in stream so we can return them
        .with_capture_tool_calls(true)
}

// ============================================================================
// Response Conversion: genai -> frames
// ============================================================================

/// Block index of the text block; captured tool calls follow it
const TEXT_BLOCK: usize = 0;

/// Frames announcing one whole tool call
pub fn tool_call_frames(index: usize, id: &str, name: &str, arguments: &Value) -> Vec<StreamFrame> {
    vec![
        StreamFrame::BlockStart {
            index,
            block: BlockKind::ToolUse {
                id: id.to_string(),
                name: name.to_string(),
            },
        },
        StreamFrame::input_json(index, arguments.to_string()),
        StreamFrame::BlockStop { index },
    ]
}

fn captured_frames(index: usize, tc: &GenaiToolCall) -> Vec<StreamFrame> {
    tool_call_frames(index, &tc.call_id, &tc.fn_name, &tc.fn_arguments)
}

/// Convert one genai stream event to frames
pub fn frames_from_genai_event(event: ChatStreamEvent) -> Vec<StreamFrame> {
    match event {
        ChatStreamEvent::Start => vec![StreamFrame::MessageStart],
        ChatStreamEvent::Chunk(chunk) => vec![StreamFrame::text(TEXT_BLOCK, chunk.content)],
        ChatStreamEvent::End(end) => {
            let mut frames = Vec::new();
            if let Some(tool_calls) = end.captured_tool_calls() {
                for (i, tc) in tool_calls.iter().enumerate() {
                    frames.extend(captured_frames(TEXT_BLOCK + 1 + i, tc));
                }
            }
            frames.push(StreamFrame::MessageStop);
            frames
        }
        // Partial tool calls are superseded by the captured ones at End
        ChatStreamEvent::ToolCallChunk(_) => vec![StreamFrame::Unknown { kind: "tool_call_chunk".to_string() }],
        _ => vec![StreamFrame::Unknown { kind: "genai".to_string() }],
    }
}

// ============================================================================
// Client Creation with Custom Auth
// ============================================================================

/// Provider routing for the genai client
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Provider identifier (e.g., "openai", "openrouter")
    pub provider: String,
    /// Resolved API key
    pub api_key: Option<String>,
    /// Custom API base URL
    pub api_base: Option<String>,
}

/// Create a genai Client with explicit auth and endpoint resolution
///
/// Keys come from the configured secret store, never from genai's own
/// environment lookup.
pub fn create_client(config: &ProviderConfig) -> Client {
    let api_key = config.api_key.clone();

    let auth_resolver = AuthResolver::from_resolver_async_fn(
        move |_model_iden: ModelIden| -> Pin<Box<dyn Future<Output = genai::resolver::Result<Option<AuthData>>> + Send>> {
            let api_key = api_key.clone();
            Box::pin(async move { Ok(api_key.map(AuthData::from_single)) })
        },
    );

    let target_provider = config.provider.to_lowercase();
    let target_api_base = config.api_base.clone();

    let target_resolver = ServiceTargetResolver::from_resolver_fn(
        move |target: ServiceTarget| -> Result<ServiceTarget, genai::resolver::Error> {
            let custom = target_api_base.as_ref().map(|u| Endpoint::from_owned(u.clone()));

            // OpenAI-compatible services without a native genai adapter
            let (endpoint, adapter_kind) = match target_provider.as_str() {
                "openrouter" => (
                    custom.unwrap_or_else(|| Endpoint::from_static("https://openrouter.ai/api/v1/")),
                    AdapterKind::OpenAI,
                ),
                "mistral" => (
                    custom.unwrap_or_else(|| Endpoint::from_static("https://api.mistral.ai/v1/")),
                    AdapterKind::OpenAI,
                ),
                _ => match custom {
                    Some(endpoint) => (endpoint, target.model.adapter_kind),
                    None => return Ok(target),
                },
            };

            Ok(ServiceTarget {
                endpoint,
                auth: target.auth,
                model: ModelIden::new(adapter_kind, target.model.model_name.clone()),
            })
        },
    );

    Client::builder()
        .with_auth_resolver(auth_resolver)
        .with_service_target_resolver(target_resolver)
        .build()
}

/// Check if a provider runs without credentials
pub fn is_keyless(provider: &str) -> bool {
    matches!(provider.to_lowercase().as_str(), "ollama")
}
