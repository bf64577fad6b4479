//! Anthropic provider configuration and wire types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use planter_core::config::ReasoningEffort;

/// Default base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// API version header value.
pub const API_VERSION: &str = "2023-06-01";

/// Default max output tokens.
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 8192;

/// Anthropic provider configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnthropicConfig {
    /// Model ID.
    pub model: String,
    /// `x-api-key` value.
    pub api_key: String,
    /// Base URL override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Max output tokens override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Reasoning effort, mapped onto a thinking budget.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_effort: Option<ReasoningEffort>,
    /// Context window override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_window: Option<u64>,
}

/// A message on the wire. Content is a list of raw content blocks
/// (`text`, `tool_use`, `tool_result`, `thinking`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MessageParam {
    /// `user` or `assistant`.
    pub role: String,
    /// Content blocks.
    pub content: Vec<Value>,
}

/// A tool definition on the wire.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnthropicTool {
    /// Tool name.
    pub name: String,
    /// Tool description.
    pub description: String,
    /// JSON Schema for the input object.
    pub input_schema: Value,
}

/// Request body for `/v1/messages`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnthropicRequest {
    /// Model ID.
    pub model: String,
    /// Required output token cap.
    pub max_tokens: u32,
    /// Conversation messages.
    pub messages: Vec<MessageParam>,
    /// System prompt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    /// Tool definitions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<AnthropicTool>>,
    /// Always true: this provider only streams.
    pub stream: bool,
    /// Extended thinking configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking: Option<Value>,
}

/// An SSE event from the messages stream.
///
/// Payloads stay as raw values; the stream handler picks out the fields it
/// needs so unknown additions never break parsing.
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicSseEvent {
    /// Stream opened; carries input-token usage.
    MessageStart {
        /// Message envelope with usage.
        message: Value,
    },
    /// A content block began.
    ContentBlockStart {
        /// Block index.
        index: usize,
        /// The opening block (`text` or `tool_use`).
        content_block: Value,
    },
    /// Incremental block content.
    ContentBlockDelta {
        /// Block index.
        index: usize,
        /// `text_delta`, `input_json_delta`, or `thinking_delta`.
        delta: Value,
    },
    /// A content block finished.
    ContentBlockStop {
        /// Block index.
        index: usize,
    },
    /// Final message metadata (stop reason, output tokens).
    MessageDelta {
        /// Delta with `stop_reason`.
        delta: Value,
        /// Usage with `output_tokens`.
        #[serde(default)]
        usage: Option<Value>,
    },
    /// Stream closed.
    MessageStop,
    /// Keep-alive.
    Ping,
    /// In-stream error.
    Error {
        /// Error envelope.
        error: Value,
    },
    /// Forward-compatible catch-all.
    #[serde(other)]
    Unknown,
}

/// The Anthropic-variant conversation body.
#[derive(Clone, Debug, Default)]
pub struct AnthropicConversation {
    /// System prompt sent with every request.
    pub(crate) system: String,
    /// Wire messages.
    pub(crate) messages: Vec<MessageParam>,
    /// Converted tool definitions.
    pub(crate) tools: Vec<AnthropicTool>,
}
