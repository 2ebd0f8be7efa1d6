//! LLM client abstractions and provider selection
//!
//! - **OpenAI**: any chat-completions compatible endpoint
//! - **Ollama**: local inference through `/api/chat`
//! - **Offline**: no model at all; every call fails and the fallback answers

use crate::types::{AppError, Result};
use crate::utils::toml_config::ProviderConfig;
use async_trait::async_trait;
use std::time::Duration;

/// Upper bound on any single HTTP call; the fallback policy applies tighter
/// per-attempt limits on top.
pub(crate) const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Generic LLM client trait for provider abstraction
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Generate with system prompt
    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String> {
        self.generate_with_history(&[
            ("system".to_string(), system.to_string()),
            ("user".to_string(), prompt.to_string()),
        ])
        .await
    }

    /// Generate with conversation history
    async fn generate_with_history(
        &self,
        messages: &[(String, String)], // (role, content) pairs
    ) -> Result<String>;

    /// Get the model name/identifier
    fn model_name(&self) -> &str;
}

/// Provider enum for runtime selection
#[derive(Debug, Clone, PartialEq)]
pub enum Provider {
    /// OpenAI API provider (including compatible APIs)
    ///
    /// # Example
    /// ```rust,ignore
    /// let provider = Provider::OpenAI {
    ///     api_key: "sk-...".to_string(),
    ///     api_base: "https://api.openai.com/v1".to_string(),
    ///     model: "gpt-4o-mini".to_string(),
    /// };
    /// ```
    OpenAI {
        api_key: String,
        api_base: String,
        model: String,
    },

    /// Ollama local LLM provider
    Ollama { base_url: String, model: String },

    /// No language model; free-text questions get the offline reply
    Offline,
}

impl Provider {
    /// Resolve a configured provider, reading the API key from the
    /// environment variable the config names.
    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        match config {
            ProviderConfig::OpenAI {
                api_key_env,
                api_base,
                model,
            } => {
                let api_key = std::env::var(api_key_env).map_err(|_| {
                    AppError::Configuration(format!(
                        "Environment variable '{}' is not set (OpenAI API key)",
                        api_key_env
                    ))
                })?;
                Ok(Provider::OpenAI {
                    api_key,
                    api_base: api_base.clone(),
                    model: model.clone(),
                })
            }
            ProviderConfig::Ollama { base_url, model } => Ok(Provider::Ollama {
                base_url: base_url.clone(),
                model: model.clone(),
            }),
            ProviderConfig::Offline => Ok(Provider::Offline),
        }
    }

    /// Create a client instance for this provider
    ///
    /// # Errors
    ///
    /// Returns an error if the provider's Cargo feature is disabled.
    pub fn create_client(&self) -> Result<Box<dyn LLMClient>> {
        match self {
            #[cfg(feature = "openai")]
            Provider::OpenAI {
                api_key,
                api_base,
                model,
            } => Ok(Box::new(super::openai::OpenAIClient::new(
                api_key.clone(),
                api_base.clone(),
                model.clone(),
            ))),

            #[cfg(feature = "ollama")]
            Provider::Ollama { base_url, model } => Ok(Box::new(
                super::ollama::OllamaClient::new(base_url.clone(), model.clone()),
            )),

            Provider::Offline => Ok(Box::new(OfflineClient)),

            #[allow(unreachable_patterns)]
            other => Err(AppError::Configuration(format!(
                "{} support was not compiled in; enable the '{}' feature",
                other.name(),
                other.name().to_lowercase()
            ))),
        }
    }

    /// Get a human-readable name for this provider
    pub fn name(&self) -> &'static str {
        match self {
            Provider::OpenAI { .. } => "OpenAI",
            Provider::Ollama { .. } => "Ollama",
            Provider::Offline => "Offline",
        }
    }
}

/// Client used when no provider is configured. Always fails.
pub struct OfflineClient;

#[async_trait]
impl LLMClient for OfflineClient {
    async fn generate_with_history(&self, _messages: &[(String, String)]) -> Result<String> {
        Err(AppError::LLM("No language model configured".to_string()))
    }

    fn model_name(&self) -> &str {
        "offline"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_name() {
        let openai = Provider::OpenAI {
            api_key: "".to_string(),
            api_base: "".to_string(),
            model: "".to_string(),
        };
        assert_eq!(openai.name(), "OpenAI");

        let ollama = Provider::Ollama {
            base_url: "".to_string(),
            model: "".to_string(),
        };
        assert_eq!(ollama.name(), "Ollama");
        assert_eq!(Provider::Offline.name(), "Offline");
    }

    #[test]
    fn test_missing_api_key_is_configuration_error() {
        let config = ProviderConfig::OpenAI {
            api_key_env: "CAREFLOW_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            api_base: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
        };
        let err = Provider::from_config(&config).unwrap_err();
        assert!(matches!(err, AppError::Configuration(_)));
        assert!(err.to_string().contains("CAREFLOW_TEST_KEY_THAT_IS_NEVER_SET"));
    }

    #[tokio::test]
    async fn test_offline_client_always_fails() {
        let client = Provider::Offline.create_client().unwrap();
        assert_eq!(client.model_name(), "offline");
        assert!(client.generate_with_system("sys", "hi").await.is_err());
    }
}
