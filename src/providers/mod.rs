// Model provider abstraction
//
// The classifier talks to an LlmProvider rather than to an HTTP client so
// tests can substitute failing or hanging providers, and so a missing API
// key degrades to rule-only classification instead of failing startup.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

pub mod claude;
pub mod retry;
pub mod types;

pub use claude::ClaudeProvider;
pub use types::{CompletionRequest, CompletionResponse, Usage};

use crate::config::ModelConfig;

/// Trait for LLM providers
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send a prompt and wait for the full response
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse>;

    /// Get the provider name (e.g., "claude")
    fn name(&self) -> &str;

    /// Get the default model for this provider
    fn default_model(&self) -> &str;

    /// Whether the provider can serve requests at all
    fn is_configured(&self) -> bool {
        true
    }
}

/// Stand-in used when no API key is configured
///
/// Every call fails immediately so the degradation chain moves straight on
/// to the rule-based strategies.
pub struct UnavailableProvider;

#[async_trait]
impl LlmProvider for UnavailableProvider {
    async fn complete(&self, _request: &CompletionRequest) -> Result<CompletionResponse> {
        anyhow::bail!("No model provider configured")
    }

    fn name(&self) -> &str {
        "unavailable"
    }

    fn default_model(&self) -> &str {
        "none"
    }

    fn is_configured(&self) -> bool {
        false
    }
}

/// Build the provider described by the model config
pub fn create_provider(config: &ModelConfig) -> Result<Arc<dyn LlmProvider>> {
    match config.api_key.as_deref().filter(|k| !k.is_empty()) {
        Some(key) => {
            let mut provider = ClaudeProvider::new(key.to_string())?
                .with_model(config.model.clone())
                .with_max_retries(config.max_retries);
            if let Some(base_url) = &config.base_url {
                provider = provider.with_base_url(base_url.clone());
            }
            tracing::info!(model = %config.model, "Using Claude provider");
            Ok(Arc::new(provider))
        }
        None => {
            tracing::warn!("{}", crate::errors::missing_api_key_warning());
            Ok(Arc::new(UnavailableProvider))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_yields_unavailable() {
        let provider = create_provider(&ModelConfig::default()).unwrap();
        assert_eq!(provider.name(), "unavailable");
        assert!(!provider.is_configured());
    }

    #[test]
    fn test_key_yields_claude() {
        let config = ModelConfig {
            api_key: Some("sk-test".to_string()),
            ..ModelConfig::default()
        };
        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.name(), "claude");
        assert!(provider.is_configured());
    }

    #[tokio::test]
    async fn test_unavailable_provider_fails_fast() {
        let result = UnavailableProvider
            .complete(&CompletionRequest::new("hello"))
            .await;
        assert!(result.is_err());
    }
}
