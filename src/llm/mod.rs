//! LLM integration for Scholar.
//!
//! Supports:
//! - **Gemini**: `generateContent` with inline attachments and optional search grounding
//! - **Custom**: any OpenAI-compatible `chat/completions` endpoint
//!
//! Both talk HTTP through reqwest and sit behind the `LlmProvider` trait.

pub mod context;
pub mod gemini;
pub mod openai;
pub mod provider;

pub use context::{StudentContext, build_system_instruction};
pub use gemini::GeminiProvider;
pub use openai::OpenAiCompatProvider;
pub use provider::*;

use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::LlmError;
use crate::model::{AiConfig, AiProvider};

/// Resolved settings for building a provider.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub backend: AiProvider,
    pub api_key: SecretString,
    pub base_url: String,
    pub model: String,
}

impl LlmConfig {
    /// Combine a stored config with the process-level fallback key.
    pub fn resolve(config: &AiConfig, fallback_key: Option<&SecretString>) -> Result<Self, LlmError> {
        let api_key = config
            .api_key()
            .map(|k| SecretString::from(k.to_string()))
            .or_else(|| fallback_key.cloned())
            .ok_or_else(|| LlmError::MissingApiKey {
                config: config.name.clone(),
            })?;
        Ok(Self {
            backend: config.provider,
            api_key,
            base_url: config.base_url.clone(),
            model: config.model.clone(),
        })
    }
}

/// Create an LLM provider from configuration.
pub fn create_provider(config: &LlmConfig) -> Arc<dyn LlmProvider> {
    match config.backend {
        AiProvider::Gemini => {
            tracing::info!("Using Gemini (model: {})", config.model);
            Arc::new(GeminiProvider::new(
                config.api_key.clone(),
                &config.base_url,
                &config.model,
            ))
        }
        AiProvider::Custom => {
            tracing::info!("Using custom endpoint {} (model: {})", config.base_url, config.model);
            Arc::new(OpenAiCompatProvider::new(
                config.api_key.clone(),
                &config.base_url,
                &config.model,
            ))
        }
    }
}

/// Builds a provider for whichever config is active at send time.
pub trait ProviderFactory: Send + Sync {
    fn build(
        &self,
        config: &AiConfig,
        fallback_key: Option<&SecretString>,
    ) -> Result<Arc<dyn LlmProvider>, LlmError>;
}

/// Factory producing real HTTP providers.
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpProviderFactory;

impl ProviderFactory for HttpProviderFactory {
    fn build(
        &self,
        config: &AiConfig,
        fallback_key: Option<&SecretString>,
    ) -> Result<Arc<dyn LlmProvider>, LlmError> {
        let resolved = LlmConfig::resolve(config, fallback_key)?;
        Ok(create_provider(&resolved))
    }
}

/// Maximum number of characters of an error body kept in messages.
const ERROR_BODY_LIMIT: usize = 300;

/// Map non-success statuses onto `LlmError`.
pub(crate) async fn check_status(
    provider: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, LlmError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    match status.as_u16() {
        401 | 403 => Err(LlmError::AuthFailed {
            provider: provider.to_string(),
        }),
        429 => {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            Err(LlmError::RateLimited {
                provider: provider.to_string(),
                retry_after,
            })
        }
        _ => {
            let body = response.text().await.unwrap_or_default();
            let excerpt: String = body.chars().take(ERROR_BODY_LIMIT).collect();
            tracing::warn!(provider, status = %status, body = %excerpt, "Provider returned an error");
            Err(LlmError::RequestFailed {
                provider: provider.to_string(),
                reason: format!("HTTP {}: {}", status.as_u16(), excerpt.trim()),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;
    use crate::config::default_ai_config;

    #[test]
    fn config_key_wins_over_fallback() {
        let mut config = default_ai_config();
        config.api_key = Some("own".into());
        let fallback = SecretString::from("env");
        let resolved = LlmConfig::resolve(&config, Some(&fallback)).unwrap();
        assert_eq!(resolved.api_key.expose_secret(), "own");
    }

    #[test]
    fn missing_key_is_an_error() {
        let config = default_ai_config();
        let err = LlmConfig::resolve(&config, None).unwrap_err();
        assert!(matches!(err, LlmError::MissingApiKey { .. }));
    }

    #[test]
    fn factory_builds_per_provider() {
        let fallback = SecretString::from("k");
        let mut config = default_ai_config();
        let provider = HttpProviderFactory.build(&config, Some(&fallback)).unwrap();
        assert_eq!(provider.name(), "gemini");
        assert_eq!(provider.model_name(), "gemini-3-pro-preview");

        config.provider = AiProvider::Custom;
        config.base_url = "http://localhost:11434/v1".into();
        config.model = "llama3".into();
        let provider = HttpProviderFactory.build(&config, Some(&fallback)).unwrap();
        assert_eq!(provider.name(), "custom");
        assert_eq!(provider.model_name(), "llama3");
    }
}
