//! The provider contract.
//!
//! [`Model`] is the single interface the engine drives. Conversations are
//! opaque tagged variants ([`Conversation`]), one per provider, and every
//! operation goes through the trait so callers never inspect structure.

use std::panic::{AssertUnwindSafe, catch_unwind};

use async_trait::async_trait;
use serde_json::Value;

use planter_core::messages::{ModelTurn, ToolResult};
use planter_core::schema::ToolSchema;

use crate::anthropic::AnthropicConversation;
use crate::errors::{ModelError, ModelResult};
use crate::openai::OpenAiConversation;
use crate::scripted::ScriptedConversation;

/// Placeholder written over condensed tool-result contents.
pub const CONDENSED_PLACEHOLDER: &str = "[earlier tool output condensed]";

/// A provider-specific message list. Opaque to callers.
#[derive(Clone, Debug)]
pub enum Conversation {
    /// OpenAI-compatible chat messages.
    OpenAi(OpenAiConversation),
    /// Anthropic content-block messages.
    Anthropic(AnthropicConversation),
    /// Scripted test conversation.
    Scripted(ScriptedConversation),
}

impl Conversation {
    pub(crate) fn variant_name(&self) -> &'static str {
        match self {
            Self::OpenAi(_) => "openai",
            Self::Anthropic(_) => "anthropic",
            Self::Scripted(_) => "scripted",
        }
    }
}

/// Error for a conversation handed to the wrong provider.
pub(crate) fn foreign_conversation(expected: &str, got: &Conversation) -> ModelError {
    ModelError::MalformedResponse {
        message: format!(
            "conversation belongs to provider '{}', expected '{expected}'",
            got.variant_name()
        ),
    }
}

type HookFn = Box<dyn Fn(&str) + Send + Sync>;

/// Optional streaming/retry callbacks for one completion.
///
/// Callback panics are caught and swallowed: a broken UI callback must
/// never kill the retry loop or the stream.
#[derive(Default)]
pub struct CompletionHooks {
    /// Receives partial assistant text. Installed only at depth zero.
    pub on_content_delta: Option<HookFn>,
    /// Receives one countdown message per second during rate-limit sleeps.
    pub on_retry: Option<HookFn>,
}

impl CompletionHooks {
    /// No callbacks.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Invoke the content-delta callback, swallowing panics.
    pub fn content_delta(&self, delta: &str) {
        if let Some(hook) = &self.on_content_delta {
            let _ = catch_unwind(AssertUnwindSafe(|| hook(delta)));
        }
    }

    /// Invoke the retry callback, swallowing panics.
    pub fn retry(&self, message: &str) {
        if let Some(hook) = &self.on_retry {
            let _ = catch_unwind(AssertUnwindSafe(|| hook(message)));
        }
    }
}

impl std::fmt::Debug for CompletionHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionHooks")
            .field("on_content_delta", &self.on_content_delta.is_some())
            .field("on_retry", &self.on_retry.is_some())
            .finish()
    }
}

/// An available model advertised by a provider.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelListing {
    /// Model name.
    pub name: String,
    /// Ordinal tier hint (1 = most capable) when known.
    pub tier_hint: Option<u8>,
}

/// Uniform interface over chat/completion providers.
#[async_trait]
pub trait Model: Send + Sync + std::fmt::Debug {
    /// The model name this instance targets.
    fn name(&self) -> &str;

    /// Context window in tokens (configuration override already applied).
    fn context_window(&self) -> u64;

    /// Build a fresh conversation from a system prompt and tool catalog.
    fn create_conversation(&self, system_prompt: &str, tools: &[ToolSchema]) -> Conversation;

    /// Append a user message.
    fn append_user(&self, conversation: &mut Conversation, text: &str) -> ModelResult<()>;

    /// Perform one LLM call. May stream text via the hooks and may suspend
    /// for network I/O and rate-limit sleeps.
    async fn complete(
        &self,
        conversation: &Conversation,
        hooks: &CompletionHooks,
    ) -> ModelResult<ModelTurn>;

    /// Append an assistant turn, including the tool-call structures the
    /// provider protocol needs so later tool results pair correctly.
    fn append_assistant_turn(
        &self,
        conversation: &mut Conversation,
        turn: &ModelTurn,
    ) -> ModelResult<()>;

    /// Append tool results, in call order. Every `tool_call_id` must match a
    /// call in the last assistant turn or the append fails with
    /// [`ModelError::DanglingToolResult`].
    fn append_tool_results(
        &self,
        conversation: &mut Conversation,
        results: &[ToolResult],
    ) -> ModelResult<()>;

    /// Replace old tool-result contents with [`CONDENSED_PLACEHOLDER`],
    /// preserving IDs. Never touches the most recent assistant turn or
    /// anything after it. Idempotent. Returns how many results were
    /// condensed this pass.
    fn condense(&self, conversation: &mut Conversation) -> usize;

    /// Wire-format view of the conversation, for replay logging.
    fn snapshot(&self, conversation: &Conversation) -> Value;

    /// Models this provider can serve. May be empty.
    fn list_models(&self) -> Vec<ModelListing> {
        Vec::new()
    }
}
