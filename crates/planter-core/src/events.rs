//! Engine lifecycle events.
//!
//! [`EngineEvent`] is the single event family streamed to collaborators
//! (UIs, the session event log). Events carry their depth and per-solve step
//! so the recursion tree is reconstructable from the flat stream. Low-level
//! provider streaming never reaches this enum; only assembled deltas do.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Common fields for all engine events.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseEvent {
    /// Recursion depth (0 = root solve).
    pub depth: u32,
    /// Per-solve step number at emission time.
    pub step: u64,
    /// RFC 3339 timestamp.
    pub timestamp: String,
}

impl BaseEvent {
    /// Create a base event stamped with the current UTC time.
    #[must_use]
    pub fn now(depth: u32, step: u64) -> Self {
        Self {
            depth,
            step,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Events emitted over the lifetime of a solve.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// A solve began with this objective.
    Objective {
        /// Common fields.
        base: BaseEvent,
        /// The objective text.
        objective: String,
    },
    /// A step of the loop began.
    StepStart {
        /// Common fields.
        base: BaseEvent,
    },
    /// The model requested a tool call.
    ToolCall {
        /// Common fields.
        base: BaseEvent,
        /// Provider call ID.
        tool_call_id: String,
        /// Tool name.
        name: String,
        /// Call arguments.
        arguments: Value,
    },
    /// A tool call produced an observation.
    ToolResult {
        /// Common fields.
        base: BaseEvent,
        /// Provider call ID.
        tool_call_id: String,
        /// Tool name.
        name: String,
        /// Whether the tool failed.
        is_error: bool,
        /// Observation text (clipped).
        content: String,
    },
    /// Streaming assistant text fragment (depth 0 only).
    AssistantTextDelta {
        /// Common fields.
        base: BaseEvent,
        /// Text fragment.
        delta: String,
    },
    /// A complete assistant text block.
    AssistantText {
        /// Common fields.
        base: BaseEvent,
        /// Full text.
        text: String,
    },
    /// Rate-limit countdown notice.
    RateLimit {
        /// Common fields.
        base: BaseEvent,
        /// Human-readable countdown message.
        message: String,
    },
    /// A sub-agent was spawned.
    SubSpawn {
        /// Common fields.
        base: BaseEvent,
        /// `subtask` or `execute`.
        kind: String,
        /// Resolved child model name.
        model: String,
        /// Child objective.
        objective: String,
    },
    /// A sub-agent returned to its parent.
    SubReturn {
        /// Common fields.
        base: BaseEvent,
        /// Child model name.
        model: String,
        /// Summary observation appended to the parent.
        summary: String,
        /// Acceptance verdict when judging is enabled.
        #[serde(skip_serializing_if = "Option::is_none")]
        verdict: Option<String>,
    },
    /// Step or context budget crossed a warning threshold.
    BudgetWarning {
        /// Common fields.
        base: BaseEvent,
        /// `warning` or `critical`.
        level: String,
        /// The injected tag text.
        message: String,
    },
    /// A non-fatal or fatal error surfaced.
    Error {
        /// Common fields.
        base: BaseEvent,
        /// Stable error kind string.
        kind: String,
        /// Error message.
        message: String,
    },
    /// The solve finished with this final text.
    Final {
        /// Common fields.
        base: BaseEvent,
        /// Final answer text.
        text: String,
    },
}

impl EngineEvent {
    /// The common fields.
    #[must_use]
    pub fn base(&self) -> &BaseEvent {
        match self {
            Self::Objective { base, .. }
            | Self::StepStart { base }
            | Self::ToolCall { base, .. }
            | Self::ToolResult { base, .. }
            | Self::AssistantTextDelta { base, .. }
            | Self::AssistantText { base, .. }
            | Self::RateLimit { base, .. }
            | Self::SubSpawn { base, .. }
            | Self::SubReturn { base, .. }
            | Self::BudgetWarning { base, .. }
            | Self::Error { base, .. }
            | Self::Final { base, .. } => base,
        }
    }

    /// Stable event type string (matches the serde tag).
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Objective { .. } => "objective",
            Self::StepStart { .. } => "step_start",
            Self::ToolCall { .. } => "tool_call",
            Self::ToolResult { .. } => "tool_result",
            Self::AssistantTextDelta { .. } => "assistant_text_delta",
            Self::AssistantText { .. } => "assistant_text",
            Self::RateLimit { .. } => "rate_limit",
            Self::SubSpawn { .. } => "sub_spawn",
            Self::SubReturn { .. } => "sub_return",
            Self::BudgetWarning { .. } => "budget_warning",
            Self::Error { .. } => "error",
            Self::Final { .. } => "final",
        }
    }

    /// Serialize to the on-disk event record `{type, depth, step, payload}`.
    ///
    /// The payload is the full tagged event, so each record stays
    /// self-describing under the flat outer shape.
    #[must_use]
    pub fn to_record(&self) -> Value {
        let payload = serde_json::to_value(self).unwrap_or(Value::Null);
        serde_json::json!({
            "type": self.event_type(),
            "depth": self.base().depth,
            "step": self.base().step,
            "payload": payload,
        })
    }
}
