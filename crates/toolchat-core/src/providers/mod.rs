//! Model endpoint providers
//!
//! A provider turns a [`ModelRequest`] into a stream of low-level
//! [`StreamFrame`](crate::types::StreamFrame)s.
//!
//! ## Architecture
//!
//! - `AnthropicProvider` speaks the Messages API directly over `reqwest`, so
//!   tool arguments stream in incrementally, block by block.
//! - `GenaiProvider` covers every other provider id through the `genai` crate.
//!   genai captures tool calls whole, so they are replayed as frames at the end.
//! - `MockProvider` plays scripted turns for tests and offline runs.
//!
//! Credentials come from a [`SecretStore`](crate::secrets::SecretStore) and are
//! resolved when the provider is built, so a missing key fails at startup.

mod traits;
mod error;
mod sse;
mod anthropic;
mod genai_adapter;
mod genai_provider;
mod mock;

pub use traits::{FrameStream, ModelRequest, Provider};
pub use error::{ProviderError, ProviderResult};
pub use sse::{SseEvent, SseParser};
pub use anthropic::{sse_frames, AnthropicProvider};
pub use genai_provider::GenaiProvider;
pub use mock::{MockMode, MockProvider, MockTurn};

use std::sync::Arc;

use crate::config::ModelSettings;
use crate::logging::Logger;
use crate::secrets::SecretStore;

/// Create the provider named by `settings.provider`
///
/// `anthropic` uses the native streaming client, `mock` the echo mock, and
/// anything else goes through genai.
pub fn create_provider(
    settings: &ModelSettings,
    secrets: &dyn SecretStore,
    logger: Arc<dyn Logger>,
) -> ProviderResult<Arc<dyn Provider>> {
    let provider_id = settings.provider.to_lowercase();
    let api_key = settings
        .api_key
        .clone()
        .filter(|k| !k.is_empty())
        .or_else(|| secrets.get(&provider_id));

    logger.info(&format!(
        "[Providers] Creating provider '{}' (key from {})",
        provider_id,
        if settings.api_key.is_some() { "config" } else { secrets.name() }
    ));

    match provider_id.as_str() {
        "mock" => Ok(Arc::new(MockProvider::echo(logger))),
        "anthropic" => {
            let key = api_key.ok_or_else(|| ProviderError::missing_api_key(&provider_id))?;
            let mut provider = AnthropicProvider::new(key, logger)?;
            if let Some(base) = &settings.api_base {
                provider = provider.with_api_base(base);
            }
            Ok(Arc::new(provider))
        }
        _ => {
            let mut provider = GenaiProvider::new(&provider_id, logger);
            match api_key {
                Some(key) => provider = provider.with_api_key(key),
                None if genai_adapter::is_keyless(&provider_id) => {}
                None => return Err(ProviderError::missing_api_key(&provider_id)),
            }
            if let Some(base) = &settings.api_base {
                provider = provider.with_api_base(base);
            }
            Ok(Arc::new(provider))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::NoOpLogger;
    use crate::secrets::MemorySecretStore;

    fn settings(provider: &str) -> ModelSettings {
        ModelSettings {
            provider: provider.to_string(),
            ..ModelSettings::default()
        }
    }

    #[test]
    fn test_missing_key_fails_fast() {
        let secrets = MemorySecretStore::new();
        let result = create_provider(&settings("anthropic"), &secrets, Arc::new(NoOpLogger::new()));
        assert!(matches!(result, Err(ProviderError::MissingApiKey { .. })));

        let result = create_provider(&settings("openai"), &secrets, Arc::new(NoOpLogger::new()));
        assert!(matches!(result, Err(ProviderError::MissingApiKey { .. })));
    }

    #[test]
    fn test_factory_dispatch() {
        let secrets = MemorySecretStore::with_secret("anthropic", "sk-ant");
        let logger: Arc<dyn Logger> = Arc::new(NoOpLogger::new());

        let provider = create_provider(&settings("anthropic"), &secrets, Arc::clone(&logger)).unwrap();
        assert_eq!(provider.name(), "anthropic");

        let provider = create_provider(&settings("mock"), &secrets, Arc::clone(&logger)).unwrap();
        assert_eq!(provider.name(), "mock");

        let provider = create_provider(&settings("ollama"), &secrets, Arc::clone(&logger)).unwrap();
        assert_eq!(provider.name(), "ollama");
    }

    #[test]
    fn test_explicit_key_wins() {
        let secrets = MemorySecretStore::new();
        let settings = ModelSettings {
            provider: "openai".to_string(),
            api_key: Some("sk-config".to_string()),
            ..ModelSettings::default()
        };
        assert!(create_provider(&settings, &secrets, Arc::new(NoOpLogger::new())).is_ok());
    }
}
