//! Settings types.

use serde::{Deserialize, Serialize};

use planter_core::config::EngineConfig;

/// Credentials and endpoint overrides for the HTTP providers.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProviderSettings {
    /// Anthropic API key.
    pub anthropic_api_key: Option<String>,
    /// Anthropic base URL override.
    pub anthropic_base_url: Option<String>,
    /// OpenAI-compatible API key.
    pub openai_api_key: Option<String>,
    /// OpenAI-compatible base URL override.
    pub openai_base_url: Option<String>,
}

/// The full settings bundle.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Engine configuration (immutable per solve).
    pub engine: EngineConfig,
    /// Provider credentials.
    pub providers: ProviderSettings,
}
