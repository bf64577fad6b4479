//! SSE stream handling for the OpenAI protocol.
//!
//! Consumes the event-source byte stream, reassembles tool-call argument
//! JSON fragments by index, surfaces text deltas through the hooks, and
//! produces one [`ModelTurn`] when the stream ends.

use eventsource_stream::Eventsource;
use futures::StreamExt;
use serde_json::{Map, Value, json};
use tracing::debug;

use planter_core::messages::{
    ModelTurn, StopReason, TokenUsage, ToolCall, map_openai_finish_reason,
};

use super::types::ChatChunk;
use crate::errors::{ModelError, ModelResult};
use crate::provider::CompletionHooks;

/// A tool call under reassembly.
#[derive(Debug, Default)]
struct PartialCall {
    id: String,
    name: String,
    arguments_json: String,
}

/// Accumulates chunks into a final turn.
#[derive(Debug, Default)]
struct StreamState {
    text: String,
    calls: Vec<PartialCall>,
    finish_reason: Option<String>,
    usage: TokenUsage,
}

impl StreamState {
    fn apply(&mut self, chunk: ChatChunk, hooks: &CompletionHooks) {
        if let Some(usage) = chunk.usage {
            self.usage = TokenUsage {
                input_tokens: usage.prompt_tokens,
                output_tokens: usage.completion_tokens,
            };
        }
        for choice in chunk.choices {
            if let Some(reason) = choice.finish_reason {
                self.finish_reason = Some(reason);
            }
            if let Some(content) = choice.delta.content {
                if !content.is_empty() {
                    hooks.content_delta(&content);
                    self.text.push_str(&content);
                }
            }
            for delta in choice.delta.tool_calls.unwrap_or_default() {
                while self.calls.len() <= delta.index {
                    self.calls.push(PartialCall::default());
                }
                let call = &mut self.calls[delta.index];
                if let Some(id) = delta.id {
                    call.id = id;
                }
                if let Some(function) = delta.function {
                    if let Some(name) = function.name {
                        call.name = name;
                    }
                    if let Some(fragment) = function.arguments {
                        call.arguments_json.push_str(&fragment);
                    }
                }
            }
        }
    }

    fn finish(self) -> ModelResult<ModelTurn> {
        let mut tool_calls = Vec::with_capacity(self.calls.len());
        for call in self.calls {
            let arguments: Map<String, Value> = if call.arguments_json.trim().is_empty() {
                Map::new()
            } else {
                serde_json::from_str(&call.arguments_json).map_err(|e| {
                    ModelError::MalformedResponse {
                        message: format!(
                            "tool call '{}' arguments are not valid JSON: {e}",
                            call.name
                        ),
                    }
                })?
            };
            tool_calls.push(ToolCall::new(call.id, call.name, arguments));
        }

        let stop_reason = if tool_calls.is_empty() {
            map_openai_finish_reason(self.finish_reason.as_deref())
        } else {
            StopReason::ToolUse
        };

        let raw_response = json!({
            "content": self.text,
            "tool_calls": tool_calls,
            "finish_reason": self.finish_reason,
            "usage": self.usage,
        });

        Ok(ModelTurn {
            text: self.text,
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
        if event.data.trim() == "[DONE]" {
            break;
        }
        let chunk: ChatChunk =
            serde_json::from_str(&event.data).map_err(|e| ModelError::MalformedResponse {
                message: format!("unparseable SSE chunk: {e}"),
            })?;
        state.apply(chunk, hooks);
    }

    debug!(
        text_len = state.text.len(),
        tool_calls = state.calls.len(),
        "stream complete"
    );
    state.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::from_value;

    fn chunk(v: Value) -> ChatChunk {
        from_value(v).unwrap()
    }

    #[test]
    fn reassembles_split_tool_call_arguments() {
        let mut state = StreamState::default();
        let hooks = CompletionHooks::none();
        state.apply(
            chunk(json!({"choices": [{"delta": {"tool_calls": [
                {"index": 0, "id": "call_1", "function": {"name": "read_file", "arguments": "{\"pa"}}
            ]}}]})),
            &hooks,
        );
        state.apply(
            chunk(json!({"choices": [{"delta": {"tool_calls": [
                {"index": 0, "function": {"arguments": "th\":\"notes.txt\"}"}}
            ]}}]})),
            &hooks,
        );
        state.apply(
            chunk(json!({"choices": [{"delta": {}, "finish_reason": "tool_calls"}]})),
            &hooks,
        );

        let turn = state.finish().unwrap();
        assert_eq!(turn.tool_calls.len(), 1);
        assert_eq!(turn.tool_calls[0].id, "call_1");
        assert_eq!(turn.tool_calls[0].str_arg("path"), Some("notes.txt"));
        assert_eq!(turn.stop_reason, StopReason::ToolUse);
    }

    #[test]
    fn parallel_calls_keep_index_order() {
        let mut state = StreamState::default();
        let hooks = CompletionHooks::none();
        state.apply(
            chunk(json!({"choices": [{"delta": {"tool_calls": [
                {"index": 1, "id": "call_b", "function": {"name": "b", "arguments": "{}"}},
                {"index": 0, "id": "call_a", "function": {"name": "a", "arguments": "{}"}}
            ]}}]})),
            &hooks,
        );
        let turn = state.finish().unwrap();
        assert_eq!(turn.tool_calls[0].id, "call_a");
        assert_eq!(turn.tool_calls[1].id, "call_b");
    }

    #[test]
    fn accumulates_text_and_fires_hook() {
        use parking_lot::Mutex;
        use std::sync::Arc;

        let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let hooks = CompletionHooks {
            on_content_delta: Some(Box::new(move |d| sink.lock().push(d.to_owned()))),
            on_retry: None,
        };

        let mut state = StreamState::default();
        state.apply(
            chunk(json!({"choices": [{"delta": {"content": "Hello "}}]})),
            &hooks,
        );
        state.apply(
            chunk(json!({"choices": [{"delta": {"content": "world"}, "finish_reason": "stop"}]})),
            &hooks,
        );

        let turn = state.finish().unwrap();
        assert_eq!(turn.text, "Hello world");
        assert_eq!(turn.stop_reason, StopReason::EndTurn);
        assert_eq!(*seen.lock(), vec!["Hello ", "world"]);
    }

    #[test]
    fn usage_comes_from_final_chunk() {
        let mut state = StreamState::default();
        let hooks = CompletionHooks::none();
        state.apply(
            chunk(json!({"choices": [], "usage": {"prompt_tokens": 99, "completion_tokens": 12}})),
            &hooks,
        );
        let turn = state.finish().unwrap();
        assert_eq!(turn.usage.input_tokens, 99);
        assert_eq!(turn.usage.output_tokens, 12);
    }

    #[test]
    fn empty_arguments_become_empty_map() {
        let mut state = StreamState::default();
        state.apply(
            chunk(json!({"choices": [{"delta": {"tool_calls": [
                {"index": 0, "id": "c", "function": {"name": "think", "arguments": ""}}
            ]}}]})),
            &CompletionHooks::none(),
        );
        let turn = state.finish().unwrap();
        assert!(turn.tool_calls[0].arguments.is_empty());
    }

    #[test]
    fn garbage_arguments_are_malformed() {
        let mut state = StreamState::default();
        state.apply(
            chunk(json!({"choices": [{"delta": {"tool_calls": [
                {"index": 0, "id": "c", "function": {"name": "x", "arguments": "{not json"}}
            ]}}]})),
            &CompletionHooks::none(),
        );
        assert!(matches!(
            state.finish(),
            Err(ModelError::MalformedResponse { .. })
        ));
    }
}
