//! OpenAI-compatible LLM provider.
//!
//! Follows the composition pattern shared across the providers:
//! `provider` (entry point) uses `types` (config and wire format) and
//! `stream` (SSE → accumulated turn). Targets any `/chat/completions`
//! endpoint that speaks the OpenAI protocol.

pub mod provider;
pub mod stream;
pub mod types;

pub use provider::OpenAiProvider;
pub use types::{OpenAiConfig, OpenAiConversation};
