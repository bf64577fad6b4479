//! Provider-neutral message types.
//!
//! [`ModelTurn`] is the uniform result of one completion; [`ToolCall`] and
//! [`ToolResult`] cross the engine/tool boundary. Providers map their wire
//! formats onto these and nothing downstream ever sees provider structure.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A tool invocation requested by the model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Provider-assigned call ID; tool results must echo it.
    pub id: String,
    /// Tool name from the catalog.
    pub name: String,
    /// Parsed JSON arguments.
    pub arguments: Map<String, Value>,
}

impl ToolCall {
    /// Create a new tool call.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: Map<String, Value>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    /// Fetch a string argument.
    #[must_use]
    pub fn str_arg(&self, key: &str) -> Option<&str> {
        self.arguments.get(key).and_then(Value::as_str)
    }

    /// Fetch an unsigned integer argument.
    #[must_use]
    pub fn u64_arg(&self, key: &str) -> Option<u64> {
        self.arguments.get(key).and_then(Value::as_u64)
    }

    /// Fetch a boolean argument.
    #[must_use]
    pub fn bool_arg(&self, key: &str) -> Option<bool> {
        self.arguments.get(key).and_then(Value::as_bool)
    }
}

/// The observation returned for one tool call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// The call this result answers.
    pub tool_call_id: String,
    /// Observation text (already clipped by the dispatcher).
    pub content: String,
    /// Whether the tool failed. Failures are not fatal to the solve.
    pub is_error: bool,
}

impl ToolResult {
    /// Successful result.
    #[must_use]
    pub fn ok(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
            is_error: false,
        }
    }

    /// Error result.
    #[must_use]
    pub fn error(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
            is_error: true,
        }
    }
}

/// Why a completion stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Normal completion.
    EndTurn,
    /// The model wants tool calls dispatched.
    ToolUse,
    /// Output token limit reached.
    MaxTokens,
    /// The turn was produced after an in-flight condensation.
    Condensed,
    /// The turn was produced after rate-limit recovery.
    RateLimited,
}

impl StopReason {
    /// Stable string form used in events.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::EndTurn => "end_turn",
            Self::ToolUse => "tool_use",
            Self::MaxTokens => "max_tokens",
            Self::Condensed => "condensed",
            Self::RateLimited => "rate_limited",
        }
    }
}

/// Map an OpenAI-compatible `finish_reason` to a unified stop reason.
///
/// - `"length"` -> max tokens reached
/// - `"tool_calls"` -> model wants to call tools
/// - anything else (including `null`) -> `end_turn`
#[must_use]
pub fn map_openai_finish_reason(reason: Option<&str>) -> StopReason {
    match reason {
        Some("length") => StopReason::MaxTokens,
        Some("tool_calls") => StopReason::ToolUse,
        _ => StopReason::EndTurn,
    }
}

/// Map an Anthropic `stop_reason` to a unified stop reason.
#[must_use]
pub fn map_anthropic_stop_reason(reason: Option<&str>) -> StopReason {
    match reason {
        Some("tool_use") => StopReason::ToolUse,
        Some("max_tokens") => StopReason::MaxTokens,
        _ => StopReason::EndTurn,
    }
}

/// Token accounting for one completion.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    /// Prompt tokens consumed.
    pub input_tokens: u64,
    /// Completion tokens produced.
    pub output_tokens: u64,
}

/// One assistant response, provider-neutral.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelTurn {
    /// Assistant text (may be empty when the turn is pure tool use).
    pub text: String,
    /// Requested tool calls, in emission order.
    pub tool_calls: Vec<ToolCall>,
    /// Why the completion stopped.
    pub stop_reason: StopReason,
    /// Token accounting reported by the provider.
    pub usage: TokenUsage,
    /// Raw provider response, kept for replay logging.
    pub raw_response: Value,
}

impl ModelTurn {
    /// Whether the turn requests any tool calls.
    #[must_use]
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// Whether the turn is a final text answer (no calls, non-empty text).
    #[must_use]
    pub fn is_final_text(&self) -> bool {
        self.tool_calls.is_empty() && !self.text.trim().is_empty()
    }
}
