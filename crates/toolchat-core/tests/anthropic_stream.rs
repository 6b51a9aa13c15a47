mod common;

use futures::StreamExt;
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use toolchat_core::decode::decode;
use toolchat_core::{
    AnthropicProvider, CancellationToken, ChatMessage, ModelRequest, Provider, ProviderError, StreamEvent,
    Tool, ToolCall,
};

use common::logger;

fn sse(events: &[serde_json::Value]) -> String {
    events
        .iter()
        .map(|e| format!("event: {}\ndata: {}\n\n", e["type"].as_str().unwrap_or("unknown"), e))
        .collect()
}

fn tool_round_body() -> String {
    sse(&[
        json!({"type": "message_start", "message": {"usage": {"input_tokens": 15, "output_tokens": 0}}}),
        json!({"type": "content_block_start", "index": 0, "content_block": {"type": "text", "text": ""}}),
        json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "Looking "}}),
        json!({"type": "ping"}),
        json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "it up."}}),
        json!({"type": "content_block_stop", "index": 0}),
        json!({"type": "content_block_start", "index": 1, "content_block": {"type": "tool_use", "id": "toolu_01", "name": "docs__search", "input": {}}}),
        json!({"type": "content_block_delta", "index": 1, "delta": {"type": "input_json_delta", "partial_json": "{\"query\":"}}),
        json!({"type": "content_block_delta", "index": 1, "delta": {"type": "input_json_delta", "partial_json": " \"tb\"}"}}),
        json!({"type": "content_block_stop", "index": 1}),
        json!({"type": "message_delta", "delta": {"stop_reason": "tool_use"}, "usage": {"output_tokens": 8}}),
        json!({"type": "message_stop"}),
    ])
}

fn request() -> ModelRequest {
    ModelRequest::new("claude-test", vec![ChatMessage::user("What is the TB plan?")])
        .with_system("be helpful")
        .with_tools(vec![Tool::new("docs__search", "[docs] Search documents")])
}

async fn provider_for(server: &MockServer) -> AnthropicProvider {
    AnthropicProvider::new("test-key", logger())
        .unwrap()
        .with_api_base(server.uri())
}

#[tokio::test]
async fn streams_text_and_tool_calls() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "test-key"))
        .and(header("anthropic-version", "2023-06-01"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(tool_round_body())
                .append_header("content-type", "text/event-stream"),
        )
        .mount(&server)
        .await;

    let provider = provider_for(&server).await;
    let frames = provider.stream_chat(request(), CancellationToken::new()).await.unwrap();
    let events: Vec<StreamEvent> = decode(frames, logger())
        .map(|e| e.unwrap())
        .collect()
        .await;

    let text: String = events.iter().filter_map(StreamEvent::as_text).collect();
    assert_eq!(text, "Looking it up.");

    let calls: Vec<&ToolCall> = events.iter().filter_map(StreamEvent::as_tool_call).collect();
    assert_eq!(calls, vec![&ToolCall::new("toolu_01", "docs__search", json!({"query": "tb"}))]);
    assert_eq!(events.last(), Some(&StreamEvent::TurnComplete));

    let received = &server.received_requests().await.unwrap()[0];
    let body: serde_json::Value = serde_json::from_slice(&received.body).unwrap();
    assert_eq!(body["stream"], true);
    assert_eq!(body["system"], "be helpful");
    assert_eq!(body["tools"][0]["name"], "docs__search");
}

#[tokio::test]
async fn error_status_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(401).set_body_string(r#"{"error":"invalid x-api-key"}"#))
        .mount(&server)
        .await;

    let provider = provider_for(&server).await;
    match provider.stream_chat(request(), CancellationToken::new()).await {
        Err(ProviderError::ApiError { status, message, .. }) => {
            assert_eq!(status, 401);
            assert!(message.contains("invalid x-api-key"));
        }
        Err(other) => panic!("unexpected error {:?}", other),
        Ok(_) => panic!("expected an error"),
    }
}

#[tokio::test]
async fn error_event_ends_stream() {
    let server = MockServer::start().await;
    let body = sse(&[
        json!({"type": "message_start", "message": {}}),
        json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "Hi"}}),
        json!({"type": "error", "error": {"type": "overloaded_error", "message": "Overloaded"}}),
    ]);
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&server)
        .await;

    let provider = provider_for(&server).await;
    let frames = provider.stream_chat(request(), CancellationToken::new()).await.unwrap();
    let events: Vec<_> = decode(frames, logger()).collect().await;

    assert_eq!(events.len(), 2);
    assert_eq!(events[0].as_ref().unwrap().as_text(), Some("Hi"));
    assert!(matches!(
        &events[1],
        Err(ProviderError::ApiError { status: 529, .. })
    ));
}
