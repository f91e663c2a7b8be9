//! LLM client abstraction.
//!
//! Provides a unified async interface over the generator used for
//! structured state extraction. Clients hold a single async `reqwest`
//! client, so they can be built and dropped on any thread, inside a
//! runtime or not.

mod gemini;
mod openai;
pub mod prompts;

pub use gemini::GeminiClient;
pub use openai::OpenAiClient;
pub use prompts::{STATE_EXTRACTION_PROMPT, build_extraction_request};

use crate::config::{LlmConfig, LlmProviderKind};
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Trait for LLM providers.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// The provider name.
    fn name(&self) -> &'static str;

    /// Generates a completion for the given prompt.
    ///
    /// # Errors
    ///
    /// Returns an error if the completion fails.
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// Generates a completion with a system prompt.
    ///
    /// # Errors
    ///
    /// Returns an error if the completion fails.
    ///
    /// Default implementation concatenates system and user prompts.
    /// Providers should override this to use native system prompt support.
    async fn complete_with_system(&self, system: &str, user: &str) -> Result<String> {
        let combined = format!("{system}\n\n---\n\nUser message:\n{user}");
        self.complete(&combined).await
    }
}

/// HTTP client configuration for LLM providers.
#[derive(Debug, Clone, Copy)]
pub struct LlmHttpConfig {
    /// Request timeout in milliseconds (0 to disable).
    pub timeout_ms: u64,
    /// Connect timeout in milliseconds (0 to disable).
    pub connect_timeout_ms: u64,
}

impl Default for LlmHttpConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            connect_timeout_ms: 3_000,
        }
    }
}

impl LlmHttpConfig {
    /// Loads HTTP configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Loads HTTP configuration from config file settings.
    #[must_use]
    pub fn from_config(config: &LlmConfig) -> Self {
        let mut settings = Self::default();
        if let Some(timeout_ms) = config.timeout_ms {
            settings.timeout_ms = timeout_ms;
        }
        if let Some(connect_timeout_ms) = config.connect_timeout_ms {
            settings.connect_timeout_ms = connect_timeout_ms;
        }
        settings
    }

    /// Applies environment variable overrides.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(timeout_ms) = std::env::var("REFCONTEXT_LLM_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
        {
            self.timeout_ms = timeout_ms;
        }
        if let Some(connect_timeout_ms) = std::env::var("REFCONTEXT_LLM_CONNECT_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
        {
            self.connect_timeout_ms = connect_timeout_ms;
        }
        self
    }
}

/// Builds the HTTP client for LLM requests with configured timeouts.
#[must_use]
pub fn build_http_client(config: LlmHttpConfig) -> reqwest::Client {
    let mut builder = reqwest::Client::builder();
    if config.timeout_ms > 0 {
        builder = builder.timeout(Duration::from_millis(config.timeout_ms));
    }
    if config.connect_timeout_ms > 0 {
        builder = builder.connect_timeout(Duration::from_millis(config.connect_timeout_ms));
    }

    builder.build().unwrap_or_else(|err| {
        tracing::warn!("Failed to build LLM HTTP client: {err}");
        reqwest::Client::new()
    })
}

/// Error for a failed provider call.
pub(crate) fn request_failed(operation: &str, cause: impl std::fmt::Display) -> Error {
    Error::OperationFailed {
        operation: operation.to_string(),
        cause: cause.to_string(),
    }
}

/// Reads the first non-blank value among `vars`.
fn api_key_from_env(vars: &[&str]) -> Option<String> {
    vars.iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|value| !value.trim().is_empty())
}

/// Builds a Gemini client from configuration.
#[must_use]
pub fn build_gemini_client(llm_config: &LlmConfig) -> GeminiClient {
    let api_key = llm_config
        .api_key
        .clone()
        .or_else(|| api_key_from_env(&["GEMINI_API_KEY", "GOOGLE_API_KEY"]));
    let mut client =
        GeminiClient::new(api_key, LlmHttpConfig::from_config(llm_config).with_env_overrides());
    if let Some(ref model) = llm_config.model {
        client = client.with_model(model);
    }
    if let Some(ref base_url) = llm_config.base_url {
        client = client.with_endpoint(base_url);
    }
    client
}

/// Builds an `OpenAI` client from configuration.
#[must_use]
pub fn build_openai_client(llm_config: &LlmConfig) -> OpenAiClient {
    let api_key = llm_config
        .api_key
        .clone()
        .or_else(|| api_key_from_env(&["OPENAI_API_KEY"]));
    let mut client =
        OpenAiClient::new(api_key, LlmHttpConfig::from_config(llm_config).with_env_overrides());
    if let Some(ref model) = llm_config.model {
        client = client.with_model(model);
    }
    if let Some(ref base_url) = llm_config.base_url {
        client = client.with_endpoint(base_url);
    }
    client
}

/// Builds the configured LLM provider.
///
/// Returns `None` when the provider has no API key, in which case state
/// extraction runs on patterns only.
#[must_use]
pub fn build_llm_provider(llm_config: &LlmConfig) -> Option<Arc<dyn LlmProvider>> {
    let provider: Arc<dyn LlmProvider> = match llm_config.provider {
        LlmProviderKind::Gemini => {
            let client = build_gemini_client(llm_config);
            if !client.has_api_key() {
                tracing::debug!("No Gemini API key configured, LLM extraction disabled");
                return None;
            }
            Arc::new(client)
        },
        LlmProviderKind::OpenAi => {
            let client = build_openai_client(llm_config);
            if !client.has_api_key() {
                tracing::debug!("No OpenAI API key configured, LLM extraction disabled");
                return None;
            }
            Arc::new(client)
        },
    };

    tracing::debug!(provider = provider.name(), "LLM provider built");
    Some(provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoProvider;

    #[async_trait]
    impl LlmProvider for EchoProvider {
        fn name(&self) -> &'static str {
            "echo"
        }

        async fn complete(&self, prompt: &str) -> Result<String> {
            Ok(prompt.to_string())
        }
    }

    #[tokio::test]
    async fn test_default_complete_with_system_concatenates() {
        let out = EchoProvider
            .complete_with_system("SYSTEM", "hello")
            .await
            .unwrap();
        assert!(out.starts_with("SYSTEM"));
        assert!(out.ends_with("User message:\nhello"));
    }

    #[test]
    fn test_http_config_from_config() {
        let llm_config = LlmConfig {
            timeout_ms: Some(1_500),
            ..LlmConfig::default()
        };
        let http = LlmHttpConfig::from_config(&llm_config);
        assert_eq!(http.timeout_ms, 1_500);
        assert_eq!(http.connect_timeout_ms, 3_000);
    }

    #[test]
    fn test_build_provider_with_explicit_key() {
        let llm_config = LlmConfig {
            provider: LlmProviderKind::OpenAi,
            api_key: Some("sk-test".to_string()),
            ..LlmConfig::default()
        };
        let provider = build_llm_provider(&llm_config).unwrap();
        assert_eq!(provider.name(), "openai");
    }

    #[tokio::test]
    async fn test_keyed_providers_build_and_drop_inside_runtime() {
        for provider in [LlmProviderKind::Gemini, LlmProviderKind::OpenAi] {
            let llm_config = LlmConfig {
                provider,
                api_key: Some("k".to_string()),
                ..LlmConfig::default()
            };
            let built = build_llm_provider(&llm_config).unwrap();
            assert!(!built.name().is_empty());
            drop(built);
        }

        let extractor = crate::StateExtractor::new(
            build_llm_provider(&LlmConfig {
                api_key: Some("k".to_string()),
                ..LlmConfig::default()
            }),
            &crate::config::EngineConfig::default(),
        );
        assert!(extractor.uses_llm());
        drop(extractor);
    }

    #[test]
    fn test_config_key_is_used() {
        let client = build_gemini_client(&LlmConfig {
            api_key: Some("from-config".to_string()),
            ..LlmConfig::default()
        });
        assert!(client.has_api_key());
    }
}
