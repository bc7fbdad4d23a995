//! Builds a concrete `ProviderClient` for a given `ProviderConfig`,
//! the generalization of the teacher's per-adapter `adapter_map`
//! construction in `keyvault/src/main.rs`.

use std::sync::Arc;

use crate::adapters::{anthropic::AnthropicClient, google::GoogleClient, groq::GroqClient, openai::OpenAiClient};
use crate::client::ProviderClient;
use crate::config::ProviderConfig;
use crate::rotator::KeyRotator;

pub fn build_client(config: &ProviderConfig) -> Option<Arc<dyn ProviderClient>> {
    if !config.is_enabled() {
        return None;
    }
    let rotator = Arc::new(KeyRotator::new(config.api_keys.clone()));
    let client: Arc<dyn ProviderClient> = match config.provider {
        "anthropic" => Arc::new(AnthropicClient::new(rotator, config.model_name.clone(), config.timeout_ms)),
        "openai" => Arc::new(OpenAiClient::new(rotator, config.model_name.clone(), config.timeout_ms)),
        "google" => Arc::new(GoogleClient::new(rotator, config.model_name.clone(), config.timeout_ms)),
        "groq" => Arc::new(GroqClient::new(rotator, config.model_name.clone(), config.timeout_ms)),
        other => {
            tracing::warn!(provider = other, "unknown provider in config, skipping");
            return None;
        }
    };
    Some(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(provider: &'static str, keys: Vec<String>) -> ProviderConfig {
        ProviderConfig {
            provider,
            model_name: "test-model".to_string(),
            api_keys: keys,
            temperature: 0.7,
            max_tokens: 4096,
            timeout_ms: 30_000,
            retry_attempts: 2,
            cooldown_ms: 30_000,
        }
    }

    #[test]
    fn builds_known_providers() {
        for provider in ["anthropic", "openai", "google", "groq"] {
            let client = build_client(&cfg(provider, vec!["k".to_string()]));
            assert!(client.is_some());
            assert_eq!(client.unwrap().provider_id(), provider);
        }
    }

    #[test]
    fn disabled_without_keys() {
        assert!(build_client(&cfg("anthropic", vec![])).is_none());
    }

    #[test]
    fn unknown_provider_returns_none() {
        assert!(build_client(&cfg("unknown", vec!["k".to_string()])).is_none());
    }
}
