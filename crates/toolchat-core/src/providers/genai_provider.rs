//! GenaiProvider - every provider id without a native frame decoder
//!
//! OpenAI, Gemini, Groq, Ollama and friends are reached through the genai
//! crate; OpenAI-compatible services (OpenRouter, Mistral) are routed through
//! its ServiceTargetResolver.

use async_trait::async_trait;
use futures::{stream, Stream, StreamExt};
use std::sync::Arc;

use genai::chat::{ChatRequest, ChatStreamEvent};

use crate::logging::Logger;
use crate::types::CancellationToken;

use super::error::{ProviderError, ProviderResult};
use super::genai_adapter::{
    create_client, frames_from_genai_event, to_genai_messages, to_genai_options, to_genai_tools,
    ProviderConfig,
};
use super::traits::{FrameStream, ModelRequest, Provider};

/// Unified provider using genai for all supported LLM APIs
pub struct GenaiProvider {
    config: ProviderConfig,
    logger: Arc<dyn Logger>,
}

impl GenaiProvider {
    /// Create a new GenaiProvider
    pub fn new(provider_id: impl Into<String>, logger: Arc<dyn Logger>) -> Self {
        Self {
            config: ProviderConfig {
                provider: provider_id.into(),
                api_key: None,
                api_base: None,
            },
            logger,
        }
    }

    /// Set the API key
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    /// Set the API base URL
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.config.api_base = Some(base.into());
        self
    }

    /// Extract model name from a model string (e.g., "openai/gpt-4" -> "gpt-4")
    pub fn extract_model_name(model: &str) -> &str {
        model.split_once('/').map(|(_, name)| name).unwrap_or(model)
    }

    fn api_error(&self, message: impl Into<String>) -> ProviderError {
        ProviderError::api_error(self.config.provider.clone(), 500, message)
    }
}

#[async_trait]
impl Provider for GenaiProvider {
    fn name(&self) -> &str {
        &self.config.provider
    }

    async fn stream_chat(
        &self,
        request: ModelRequest,
        cancel_token: CancellationToken,
    ) -> ProviderResult<FrameStream> {
        self.logger.info(&format!(
            "[GenaiProvider] stream_chat called: provider={}, model={}",
            self.config.provider, request.model
        ));

        let client = create_client(&self.config);

        let mut chat_req = ChatRequest::new(to_genai_messages(request.messages));
        if let Some(system) = request.system.filter(|s| !s.is_empty()) {
            chat_req = chat_req.with_system(system);
        }
        if !request.tools.is_empty() {
            chat_req = chat_req.with_tools(to_genai_tools(request.tools));
        }

        let genai_options = to_genai_options(request.max_tokens);
        let model_name = Self::extract_model_name(&request.model);

        let chat_stream = client
            .exec_chat_stream(model_name, chat_req, Some(&genai_options))
            .await
            .map_err(|e| self.api_error(e.to_string()))?;

        self.logger.debug("[GenaiProvider] Stream started successfully");

        let logger = Arc::clone(&self.logger);
        let provider_id = self.config.provider.clone();

        let events = until_cancelled(Box::pin(chat_stream.stream), cancel_token);
        let frames = events.flat_map(move |result| {
            let items: Vec<ProviderResult<_>> = match result {
                Err(cancelled) => {
                    logger.info("[GenaiProvider] Stream cancelled");
                    vec![Err(cancelled)]
                }
                Ok(Ok(event)) => {
                    if let ChatStreamEvent::End(_) = &event {
                        logger.debug("[GenaiProvider] Stream event: End");
                    }
                    frames_from_genai_event(event).into_iter().map(Ok).collect()
                }
                Ok(Err(e)) => {
                    logger.error(&format!("[GenaiProvider] Stream error: {}", e));
                    vec![Err(ProviderError::api_error(provider_id.clone(), 500, e.to_string()))]
                }
            };
            stream::iter(items)
        });

        Ok(Box::pin(frames))
    }
}

/// Race each item against `cancel`; a cancellation yields one
/// `ProviderError::Cancelled` and ends the stream
fn until_cancelled<S>(
    events: S,
    cancel: CancellationToken,
) -> impl Stream<Item = ProviderResult<S::Item>> + Send
where
    S: Stream + Send + Unpin,
    S::Item: Send,
{
    stream::unfold(Some(events), move |state| {
        let cancel = cancel.clone();
        async move {
            let mut events = state?;
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                next = events.next() => Some(next),
            };
            match next {
                None => Some((Err(ProviderError::Cancelled), None)),
                Some(Some(item)) => Some((Ok(item), Some(events))),
                Some(None) => None,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::NoOpLogger;

    #[test]
    fn test_extract_model_name() {
        assert_eq!(GenaiProvider::extract_model_name("openai/gpt-4"), "gpt-4");
        assert_eq!(GenaiProvider::extract_model_name("gpt-4o"), "gpt-4o");
        assert_eq!(
            GenaiProvider::extract_model_name("openrouter/meta/llama"),
            "meta/llama"
        );
    }

    #[test]
    fn test_builder() {
        let provider = GenaiProvider::new("openai", Arc::new(NoOpLogger::new()))
            .with_api_key("sk-test")
            .with_api_base("http://localhost:1234/v1/");
        assert_eq!(provider.name(), "openai");
        assert_eq!(provider.config.api_key.as_deref(), Some("sk-test"));
    }

    #[tokio::test]
    async fn test_stalled_stream_observes_cancel() {
        let cancel = CancellationToken::new();
        let stalled = until_cancelled(stream::pending::<u32>(), cancel.clone());

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let items: Vec<_> = stalled.collect().await;
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(ProviderError::Cancelled)));
    }

    #[tokio::test]
    async fn test_uncancelled_stream_passes_through() {
        let items: Vec<_> = until_cancelled(stream::iter(vec![1, 2]), CancellationToken::new())
            .collect()
            .await;
        assert!(matches!(items.as_slice(), [Ok(1), Ok(2)]));
    }
}
