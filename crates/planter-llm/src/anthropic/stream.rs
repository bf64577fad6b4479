//! SSE stream handling for the Anthropic messages protocol.
//!
//! Content arrives as indexed blocks: text blocks stream `text_delta`
//! fragments, tool-use blocks stream `input_json_delta` fragments that are
//! reassembled into argument objects when the stream closes.

use eventsource_stream::Eventsource;
use futures::StreamExt;
use serde_json::{Map, Value, json};
use tracing::debug;

use planter_core::messages::{
    ModelTurn, StopReason, TokenUsage, ToolCall, map_anthropic_stop_reason,
};

use super::types::AnthropicSseEvent;
use crate::errors::{ModelError, ModelResult};
use crate::provider::CompletionHooks;

/// One content block under accumulation.
#[derive(Debug)]
enum BlockState {
    Text(String),
    ToolUse {
        id: String,
        name: String,
        input_json: String,
    },
    /// Thinking and any future block kinds: accumulated nowhere.
    Other,
}

#[derive(Debug, Default)]
struct StreamState {
    blocks: Vec<BlockState>,
    stop_reason: Option<String>,
    usage: TokenUsage,
}

impl StreamState {
    fn block_at(&mut self, index: usize) -> &mut BlockState {
        while self.blocks.len() <= index {
            self.blocks.push(BlockState::Other);
        }
        &mut self.blocks[index]
    }

    fn apply(&mut self, event: AnthropicSseEvent, hooks: &CompletionHooks) -> ModelResult<()> {
        match event {
            AnthropicSseEvent::MessageStart { message } => {
                if let Some(tokens) = message
                    .pointer("/usage/input_tokens")
                    .and_then(Value::as_u64)
                {
                    self.usage.input_tokens = tokens;
                }
            }
            AnthropicSseEvent::ContentBlockStart {
                index,
                content_block,
            } => {
                let state = match content_block.get("type").and_then(Value::as_str) {
                    Some("text") => BlockState::Text(String::new()),
                    Some("tool_use") => BlockState::ToolUse {
                        id: content_block
                            .get("id")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_owned(),
                        name: content_block
                            .get("name")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_owned(),
                        input_json: String::new(),
                    },
                    _ => BlockState::Other,
                };
                *self.block_at(index) = state;
            }
            AnthropicSseEvent::ContentBlockDelta { index, delta } => {
                match delta.get("type").and_then(Value::as_str) {
                    Some("text_delta") => {
                        if let Some(text) = delta.get("text").and_then(Value::as_str) {
                            hooks.content_delta(text);
                            if let BlockState::Text(buffer) = self.block_at(index) {
                                buffer.push_str(text);
                            }
                        }
                    }
                    Some("input_json_delta") => {
                        if let Some(fragment) = delta.get("partial_json").and_then(Value::as_str) {
                            if let BlockState::ToolUse { input_json, .. } = self.block_at(index) {
                                input_json.push_str(fragment);
                            }
                        }
                    }
                    _ => {}
                }
            }
            AnthropicSseEvent::MessageDelta { delta, usage } => {
                if let Some(reason) = delta.get("stop_reason").and_then(Value::as_str) {
                    self.stop_reason = Some(reason.to_owned());
                }
                if let Some(tokens) = usage
                    .as_ref()
                    .and_then(|u| u.get("output_tokens"))
                    .and_then(Value::as_u64)
                {
                    self.usage.output_tokens = tokens;
                }
            }
            AnthropicSseEvent::Error { error } => {
                return Err(ModelError::MalformedResponse {
                    message: format!("in-stream error: {error}"),
                });
            }
            AnthropicSseEvent::ContentBlockStop { .. }
            | AnthropicSseEvent::MessageStop
            | AnthropicSseEvent::Ping
            | AnthropicSseEvent::Unknown => {}
        }
        Ok(())
    }

    fn finish(self) -> ModelResult<ModelTurn> {
        let mut text = String::new();
        let mut tool_calls = Vec::new();
        for block in self.blocks {
            match block {
                BlockState::Text(t) => text.push_str(&t),
                BlockState::ToolUse {
                    id,
                    name,
                    input_json,
                } => {
                    let arguments: Map<String, Value> = if input_json.trim().is_empty() {
                        Map::new()
                    } else {
                        serde_json::from_str(&input_json).map_err(|e| {
                            ModelError::MalformedResponse {
                                message: format!(
                                    "tool use '{name}' input is not valid JSON: {e}"
                                ),
                            }
                        })?
                    };
                    tool_calls.push(ToolCall::new(id, name, arguments));
                }
                BlockState::Other => {}
            }
        }

        let stop_reason = if tool_calls.is_empty() {
            map_anthropic_stop_reason(self.stop_reason.as_deref())
        } else {
            StopReason::ToolUse
        };

        let raw_response = json!({
            "content": text,
            "tool_calls": tool_calls,
            "stop_reason": self.stop_reason,
            "usage": self.usage,
        });

        Ok(ModelTurn {
            text,
            tool_calls,
            stop_reason,
            usage: self.usage,
            raw_response,
        })
    }
}

/// Drain an SSE response into a [`ModelTurn`].
pub(crate) async fn collect_stream(
    response: reqwest::Response,
    hooks: &CompletionHooks,
) -> ModelResult<ModelTurn> {
    let mut state = StreamState::default();
    let mut stream = response.bytes_stream().eventsource();

    while let Some(event) = stream.next().await {
        let event = event.map_err(|e| ModelError::Network {
            message: format!("SSE stream error: {e}"),
        })?;
        if event.data.trim().is_empty() {
            continue;
        }
        let parsed: AnthropicSseEvent =
            serde_json::from_str(&event.data).map_err(|e| ModelError::MalformedResponse {
                message: format!("unparseable SSE event: {e}"),
            })?;
        let done = matches!(parsed, AnthropicSseEvent::MessageStop);
        state.apply(parsed, hooks)?;
        if done {
            break;
        }
    }

    debug!(blocks = state.blocks.len(), "stream complete");
    state.finish()
}
