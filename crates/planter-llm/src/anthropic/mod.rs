//! Anthropic-native LLM provider.
//!
//! Follows the composition pattern shared across the providers:
//! `provider` (entry point) uses `types` (config and wire format) and
//! `stream` (SSE content-block events → accumulated turn).

pub mod provider;
pub mod stream;
pub mod types;

pub use provider::AnthropicProvider;
pub use types::{AnthropicConfig, AnthropicConversation};
