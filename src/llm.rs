//! LLM provider abstraction
//!
//! Backs the engine's NLU and response-generation capabilities with a
//! hosted model. The engine itself never depends on this module.

mod anthropic;
mod error;
mod nlu;
mod types;

pub use anthropic::{AnthropicModel, AnthropicService};
pub use error::{LlmError, LlmErrorKind};
pub use nlu::{extract_json_object, LlmNlu, LlmResponder};
pub use types::*;

use async_trait::async_trait;
use std::sync::Arc;

/// Common interface for LLM providers
#[async_trait]
pub trait LlmService: Send + Sync {
    /// Make a completion request
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError>;

    /// Get the model ID
    fn model_id(&self) -> &str;
}

#[async_trait]
impl<T: LlmService + ?Sized> LlmService for Arc<T> {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        (**self).complete(request).await
    }

    fn model_id(&self) -> &str {
        (**self).model_id()
    }
}

/// Configuration for LLM providers
#[derive(Debug, Clone, Default)]
pub struct LlmConfig {
    pub anthropic_api_key: Option<String>,
    /// Optional gateway URL fronting the provider API
    pub gateway: Option<String>,
    /// Model ID, e.g. `claude-4.5-haiku`
    pub model: Option<String>,
}

impl LlmConfig {
    pub fn from_env() -> Self {
        Self {
            anthropic_api_key: std::env::var("ANTHROPIC_API_KEY").ok(),
            gateway: std::env::var("LLM_GATEWAY").ok(),
            model: std::env::var("RUDDER_MODEL").ok(),
        }
    }

    /// Build the configured service, wrapped for logging. Defaults to Haiku.
    pub fn build_service(&self) -> Result<Arc<dyn LlmService>, LlmError> {
        let model = match self.model.as_deref() {
            Some(id) => AnthropicModel::from_id(id)
                .ok_or_else(|| LlmError::invalid_request(format!("Unknown model `{id}`")))?,
            None => AnthropicModel::Claude45Haiku,
        };

        // A gateway injects credentials itself
        let api_key = match (&self.anthropic_api_key, &self.gateway) {
            (Some(key), _) => key.clone(),
            (None, Some(_)) => "implicit".to_string(),
            (None, None) => return Err(LlmError::auth("ANTHROPIC_API_KEY is not set")),
        };

        let service = AnthropicService::new(api_key, model, self.gateway.as_deref())?;
        Ok(Arc::new(LoggingService::new(Arc::new(service))))
    }
}

/// Logging wrapper for LLM services
pub struct LoggingService {
    inner: Arc<dyn LlmService>,
    model_id: String,
}

impl LoggingService {
    pub fn new(inner: Arc<dyn LlmService>) -> Self {
        let model_id = inner.model_id().to_string();
        Self { inner, model_id }
    }
}

#[async_trait]
impl LlmService for LoggingService {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let start = std::time::Instant::now();
        let result = self.inner.complete(request).await;
        let duration = start.elapsed();

        match &result {
            Ok(response) => {
                tracing::info!(
                    model = %self.model_id,
                    duration_ms = %duration.as_millis(),
                    input_tokens = response.usage.input_tokens,
                    output_tokens = response.usage.output_tokens,
                    "LLM request completed"
                );
            }
            Err(e) => {
                tracing::error!(
                    model = %self.model_id,
                    duration_ms = %duration.as_millis(),
                    error = %e.message,
                    retryable = e.kind.is_retryable(),
                    "LLM request failed"
                );
            }
        }

        result
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_service_requires_credentials() {
        let err = LlmConfig::default().build_service().err().unwrap();
        assert_eq!(err.kind, LlmErrorKind::Auth);

        let config = LlmConfig {
            anthropic_api_key: Some("key".to_string()),
            model: Some("claude-4.5-sonnet".to_string()),
            ..LlmConfig::default()
        };
        assert_eq!(config.build_service().unwrap().model_id(), "claude-4.5-sonnet");

        let gateway_only = LlmConfig {
            gateway: Some("http://gateway.local".to_string()),
            ..LlmConfig::default()
        };
        assert_eq!(gateway_only.build_service().unwrap().model_id(), "claude-4.5-haiku");
    }

    #[test]
    fn test_unknown_model_is_rejected() {
        let config = LlmConfig {
            anthropic_api_key: Some("key".to_string()),
            model: Some("nope".to_string()),
            ..LlmConfig::default()
        };
        assert_eq!(config.build_service().err().unwrap().kind, LlmErrorKind::InvalidRequest);
    }
}
