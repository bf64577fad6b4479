//! Model construction.
//!
//! The engine asks a [`ModelFactory`] for model instances when spawning
//! sub-agents; the default factory routes by model-name family (`claude*` →
//! Anthropic, everything else → OpenAI-compatible). [`StaticModelFactory`]
//! serves pre-built instances for tests and replay.

use std::collections::HashMap;
use std::sync::Arc;

use planter_core::config::ReasoningEffort;

use crate::anthropic::{AnthropicProvider, types::AnthropicConfig};
use crate::errors::{ModelError, ModelResult};
use crate::openai::{OpenAiProvider, types::OpenAiConfig};
use crate::provider::Model;

/// Builds model instances on demand.
pub trait ModelFactory: Send + Sync {
    /// Build (or reuse) an instance for `model_name` at the given effort.
    fn build(
        &self,
        model_name: &str,
        effort: Option<ReasoningEffort>,
    ) -> ModelResult<Arc<dyn Model>>;
}

/// API credentials and endpoint overrides for the HTTP providers.
#[derive(Clone, Debug, Default)]
pub struct ProviderCredentials {
    /// Anthropic API key.
    pub anthropic_api_key: Option<String>,
    /// Anthropic base URL override.
    pub anthropic_base_url: Option<String>,
    /// OpenAI-compatible API key.
    pub openai_api_key: Option<String>,
    /// OpenAI-compatible base URL override.
    pub openai_base_url: Option<String>,
}

/// Default factory: routes by model-name family, shares one HTTP client.
pub struct DefaultModelFactory {
    credentials: ProviderCredentials,
    /// Context-window override applied to every instance.
    max_context_tokens: Option<u64>,
    client: reqwest::Client,
}

impl DefaultModelFactory {
    /// Create a factory.
    #[must_use]
    pub fn new(credentials: ProviderCredentials, max_context_tokens: Option<u64>) -> Self {
        Self {
            credentials,
            max_context_tokens,
            client: reqwest::Client::new(),
        }
    }

    fn missing_key(provider: &str, model: &str) -> ModelError {
        ModelError::Network {
            message: format!("no {provider} API key configured (model '{model}')"),
        }
    }
}

impl ModelFactory for DefaultModelFactory {
    fn build(
        &self,
        model_name: &str,
        effort: Option<ReasoningEffort>,
    ) -> ModelResult<Arc<dyn Model>> {
        if model_name.to_lowercase().starts_with("claude") {
            let api_key = self
                .credentials
                .anthropic_api_key
                .clone()
                .ok_or_else(|| Self::missing_key("anthropic", model_name))?;
            Ok(Arc::new(AnthropicProvider::with_client(
                AnthropicConfig {
                    model: model_name.to_owned(),
                    api_key,
                    base_url: self.credentials.anthropic_base_url.clone(),
                    max_tokens: None,
                    reasoning_effort: effort,
                    context_window: self.max_context_tokens,
                },
                self.client.clone(),
            )))
        } else {
            let api_key = self
                .credentials
                .openai_api_key
                .clone()
                .ok_or_else(|| Self::missing_key("openai", model_name))?;
            Ok(Arc::new(OpenAiProvider::with_client(
                OpenAiConfig {
                    model: model_name.to_owned(),
                    api_key,
                    base_url: self.credentials.openai_base_url.clone(),
                    max_tokens: None,
                    reasoning_effort: effort,
                    context_window: self.max_context_tokens,
                },
                self.client.clone(),
            )))
        }
    }
}

/// Factory serving pre-built instances by name (tests, replay).
#[derive(Default)]
pub struct StaticModelFactory {
    models: parking_lot::Mutex<HashMap<String, Arc<dyn Model>>>,
    fallback: Option<Arc<dyn Model>>,
}

impl StaticModelFactory {
    /// Empty factory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an instance under a model name.
    #[must_use]
    pub fn with_model(self, name: impl Into<String>, model: Arc<dyn Model>) -> Self {
        let _ = self.models.lock().insert(name.into(), model);
        self
    }

    /// Instance returned for unregistered names.
    #[must_use]
    pub fn with_fallback(mut self, model: Arc<dyn Model>) -> Self {
        self.fallback = Some(model);
        self
    }
}

impl ModelFactory for StaticModelFactory {
    fn build(
        &self,
        model_name: &str,
        _effort: Option<ReasoningEffort>,
    ) -> ModelResult<Arc<dyn Model>> {
        if let Some(model) = self.models.lock().get(model_name) {
            return Ok(Arc::clone(model));
        }
        self.fallback
            .clone()
            .ok_or_else(|| ModelError::Network {
                message: format!("no scripted model registered for '{model_name}'"),
            })
    }
}
