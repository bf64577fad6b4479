//! OpenAI provider configuration and wire types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use planter_core::config::ReasoningEffort;

/// Default base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI-compatible provider configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenAiConfig {
    /// Model ID.
    pub model: String,
    /// Bearer API key.
    pub api_key: String,
    /// Base URL override (any OpenAI-compatible endpoint).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Max output tokens override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Reasoning effort forwarded to reasoning-capable models.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_effort: Option<ReasoningEffort>,
    /// Context window override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_window: Option<u64>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Request types
// ─────────────────────────────────────────────────────────────────────────────

/// A chat message on the wire.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// `system`, `user`, `assistant`, or `tool`.
    pub role: String,
    /// Text content (absent on pure tool-call turns).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Assistant tool calls.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<WireToolCall>>,
    /// Pairing ID on `tool` messages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    /// A plain text message.
    #[must_use]
    pub fn text(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_owned(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

/// A tool call as serialized into assistant messages.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WireToolCall {
    /// Call ID.
    pub id: String,
    /// Always `"function"`.
    #[serde(rename = "type")]
    pub call_type: String,
    /// Function name and JSON-encoded arguments.
    pub function: WireFunction,
}

/// Function payload of a wire tool call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WireFunction {
    /// Function name.
    pub name: String,
    /// JSON-encoded argument string.
    pub arguments: String,
}

/// A tool definition on the wire.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatTool {
    /// Always `"function"`.
    #[serde(rename = "type")]
    pub tool_type: String,
    /// Function definition.
    pub function: FunctionDef,
}

/// Function definition with a strict schema.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionDef {
    /// Tool name.
    pub name: String,
    /// Tool description.
    pub description: String,
    /// JSON Schema (strict form).
    pub parameters: Value,
    /// Strict-mode flag.
    pub strict: bool,
}

/// Streaming options: request usage in the final chunk.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StreamOptions {
    /// Include a usage object in the last chunk.
    pub include_usage: bool,
}

/// Request body for `/chat/completions`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Model ID.
    pub model: String,
    /// Conversation messages.
    pub messages: Vec<ChatMessage>,
    /// Tool definitions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ChatTool>>,
    /// Always true: this provider only streams.
    pub stream: bool,
    /// Streaming options.
    pub stream_options: StreamOptions,
    /// Max output tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Reasoning effort (dropped after one-shot fallback on rejection).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_effort: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// SSE chunk types
// ─────────────────────────────────────────────────────────────────────────────

/// One SSE data chunk.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ChatChunk {
    /// Streaming choices (at most one for this provider).
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
    /// Usage, present only in the final chunk.
    #[serde(default)]
    pub usage: Option<ChatUsage>,
}

/// One streamed choice.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ChunkChoice {
    /// Incremental delta.
    #[serde(default)]
    pub delta: ChunkDelta,
    /// Set on the last content chunk.
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Incremental message delta.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ChunkDelta {
    /// Text fragment.
    #[serde(default)]
    pub content: Option<String>,
    /// Tool-call fragments, keyed by index.
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCallDelta>>,
}

/// A tool-call fragment.
#[derive(Clone, Debug, Deserialize)]
pub struct ToolCallDelta {
    /// Position of the call within the turn.
    pub index: usize,
    /// Call ID (first fragment only).
    #[serde(default)]
    pub id: Option<String>,
    /// Function name / argument fragments.
    #[serde(default)]
    pub function: Option<FunctionDelta>,
}

/// Function fragment of a tool-call delta.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct FunctionDelta {
    /// Name (first fragment only).
    #[serde(default)]
    pub name: Option<String>,
    /// Partial JSON argument string.
    #[serde(default)]
    pub arguments: Option<String>,
}

/// Usage object in the final chunk.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ChatUsage {
    /// Prompt tokens.
    #[serde(default)]
    pub prompt_tokens: u64,
    /// Completion tokens.
    #[serde(default)]
    pub completion_tokens: u64,
}

// ─────────────────────────────────────────────────────────────────────────────
// Conversation
// ─────────────────────────────────────────────────────────────────────────────

/// The OpenAI-variant conversation body.
#[derive(Clone, Debug, Default)]
pub struct OpenAiConversation {
    /// Wire messages, system prompt first.
    pub(crate) messages: Vec<ChatMessage>,
    /// Converted tool definitions sent with every request.
    pub(crate) tools: Vec<ChatTool>,
}
