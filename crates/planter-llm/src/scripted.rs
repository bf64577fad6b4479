//! Deterministic scripted provider for tests and session replay.
//!
//! [`ScriptedModel`] returns a queued sequence of [`ModelTurn`]s, one per
//! `complete()` call, while maintaining a real conversation structure so the
//! append/condense invariants are exercised exactly as with HTTP providers.

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use planter_core::messages::{ModelTurn, StopReason, TokenUsage, ToolCall, ToolResult};
use planter_core::schema::ToolSchema;

use crate::errors::{ModelError, ModelResult};
use crate::provider::{
    CONDENSED_PLACEHOLDER, CompletionHooks, Conversation, Model, foreign_conversation,
};

/// One entry of a scripted conversation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScriptedEntry {
    /// A user message.
    User {
        /// Message text.
        text: String,
    },
    /// An assistant turn.
    Assistant {
        /// Assistant text.
        text: String,
        /// Tool calls.
        tool_calls: Vec<ToolCall>,
    },
    /// A tool-result batch.
    ToolResults {
        /// Results in call order.
        results: Vec<ToolResult>,
    },
}

/// The scripted conversation body.
#[derive(Clone, Debug, Default)]
pub struct ScriptedConversation {
    /// System prompt (recorded, never interpreted).
    pub system: String,
    /// Tool catalog handed to `create_conversation`.
    pub tools: Vec<ToolSchema>,
    /// Conversation entries.
    pub entries: Vec<ScriptedEntry>,
}

/// Deterministic provider fed from a turn queue.
#[derive(Debug)]
pub struct ScriptedModel {
    name: String,
    context_window: u64,
    turns: Mutex<VecDeque<ModelTurn>>,
    /// Tokens reported per completion when the scripted turn carries none.
    default_input_tokens: u64,
}

impl ScriptedModel {
    /// Create a scripted model with a queue of turns.
    #[must_use]
    pub fn new(name: impl Into<String>, turns: Vec<ModelTurn>) -> Self {
        Self {
            name: name.into(),
            context_window: 100_000,
            turns: Mutex::new(turns.into()),
            default_input_tokens: 0,
        }
    }

    /// Override the reported context window.
    #[must_use]
    pub fn with_context_window(mut self, window: u64) -> Self {
        self.context_window = window;
        self
    }

    /// Report this input-token count on turns that carry zero usage
    /// (drives condensation-threshold tests).
    #[must_use]
    pub fn with_default_input_tokens(mut self, tokens: u64) -> Self {
        self.default_input_tokens = tokens;
        self
    }

    /// Remaining queued turns.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.turns.lock().len()
    }

    /// A plain text turn.
    #[must_use]
    pub fn text_turn(text: impl Into<String>) -> ModelTurn {
        let text = text.into();
        ModelTurn {
            raw_response: serde_json::json!({"content": text}),
            text,
            tool_calls: Vec::new(),
            stop_reason: StopReason::EndTurn,
            usage: TokenUsage::default(),
        }
    }

    /// A pure tool-call turn.
    #[must_use]
    pub fn tool_turn(calls: Vec<ToolCall>) -> ModelTurn {
        ModelTurn {
            raw_response: serde_json::json!({"tool_calls": calls}),
            text: String::new(),
            tool_calls: calls,
            stop_reason: StopReason::ToolUse,
            usage: TokenUsage::default(),
        }
    }

    /// Shorthand for a single-call turn.
    #[must_use]
    pub fn single_call(id: &str, name: &str, arguments: Value) -> ModelTurn {
        let arguments: Map<String, Value> = arguments
            .as_object()
            .cloned()
            .unwrap_or_default();
        Self::tool_turn(vec![ToolCall::new(id, name, arguments)])
    }

    fn expect_conv_mut<'a>(
        conv: &'a mut Conversation,
    ) -> ModelResult<&'a mut ScriptedConversation> {
        match conv {
            Conversation::Scripted(inner) => Ok(inner),
            other => Err(foreign_conversation("scripted", other)),
        }
    }
}

#[async_trait]
impl Model for ScriptedModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn context_window(&self) -> u64 {
        self.context_window
    }

    fn create_conversation(&self, system_prompt: &str, tools: &[ToolSchema]) -> Conversation {
        Conversation::Scripted(ScriptedConversation {
            system: system_prompt.to_owned(),
            tools: tools.to_vec(),
            entries: Vec::new(),
        })
    }

    fn append_user(&self, conversation: &mut Conversation, text: &str) -> ModelResult<()> {
        let conv = Self::expect_conv_mut(conversation)?;
        conv.entries.push(ScriptedEntry::User { text: text.to_owned() });
        Ok(())
    }

    async fn complete(
        &self,
        conversation: &Conversation,
        hooks: &CompletionHooks,
    ) -> ModelResult<ModelTurn> {
        let Conversation::Scripted(_) = conversation else {
            return Err(foreign_conversation("scripted", conversation));
        };
        let mut turn = self
            .turns
            .lock()
            .pop_front()
            .ok_or_else(|| ModelError::MalformedResponse {
                message: "scripted turn queue exhausted".into(),
            })?;
        if turn.usage.input_tokens == 0 {
            turn.usage.input_tokens = self.default_input_tokens;
        }
        if !turn.text.is_empty() {
            hooks.content_delta(&turn.text);
        }
        Ok(turn)
    }

    fn append_assistant_turn(
        &self,
        conversation: &mut Conversation,
        turn: &ModelTurn,
    ) -> ModelResult<()> {
        let conv = Self::expect_conv_mut(conversation)?;
        conv.entries.push(ScriptedEntry::Assistant {
            text: turn.text.clone(),
            tool_calls: turn.tool_calls.clone(),
        });
        Ok(())
    }

    fn append_tool_results(
        &self,
        conversation: &mut Conversation,
        results: &[ToolResult],
    ) -> ModelResult<()> {
        let conv = Self::expect_conv_mut(conversation)?;
        let open_ids: Vec<String> = conv
            .entries
            .iter()
            .rev()
            .find_map(|e| match e {
                ScriptedEntry::Assistant { tool_calls, .. } => {
                    Some(tool_calls.iter().map(|c| c.id.clone()).collect())
                }
                _ => None,
            })
            .unwrap_or_default();
        for result in results {
            if !open_ids.contains(&result.tool_call_id) {
                return Err(ModelError::DanglingToolResult {
                    tool_call_id: result.tool_call_id.clone(),
                });
            }
        }
        conv.entries.push(ScriptedEntry::ToolResults {
            results: results.to_vec(),
        });
        Ok(())
    }

    fn condense(&self, conversation: &mut Conversation) -> usize {
        let Conversation::Scripted(conv) = conversation else {
            return 0;
        };
        let Some(last_assistant) = conv
            .entries
            .iter()
            .rposition(|e| matches!(e, ScriptedEntry::Assistant { .. }))
        else {
            return 0;
        };
        let mut condensed = 0;
        for entry in &mut conv.entries[..last_assistant] {
            if let ScriptedEntry::ToolResults { results } = entry {
                for result in results {
                    if result.content != CONDENSED_PLACEHOLDER {
                        result.content = CONDENSED_PLACEHOLDER.to_owned();
                        condensed += 1;
                    }
                }
            }
        }
        condensed
    }

    fn snapshot(&self, conversation: &Conversation) -> Value {
        match conversation {
            Conversation::Scripted(conv) => {
                serde_json::to_value(&conv.entries).unwrap_or(Value::Null)
            }
            _ => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn turns_come_back_in_order() {
        let model = ScriptedModel::new(
            "scripted",
            vec![
                ScriptedModel::single_call("c1", "read_file", json!({"path": "notes.txt"})),
                ScriptedModel::text_turn("done"),
            ],
        );
        let conv = model.create_conversation("sys", &[]);

        let first = model.complete(&conv, &CompletionHooks::none()).await.unwrap();
        assert_eq!(first.tool_calls[0].name, "read_file");
        let second = model.complete(&conv, &CompletionHooks::none()).await.unwrap();
        assert_eq!(second.text, "done");
        assert_eq!(model.remaining(), 0);
    }

    #[tokio::test]
    async fn exhausted_queue_errors() {
        let model = ScriptedModel::new("scripted", vec![]);
        let conv = model.create_conversation("sys", &[]);
        let err = model
            .complete(&conv, &CompletionHooks::none())
            .await
            .unwrap_err();
        assert!(matches!(err, ModelError::MalformedResponse { .. }));
    }

    #[test]
    fn dangling_results_rejected() {
        let model = ScriptedModel::new("scripted", vec![]);
        let mut conv = model.create_conversation("sys", &[]);
        model
            .append_assistant_turn(
                &mut conv,
                &ScriptedModel::single_call("c1", "think", json!({})),
            )
            .unwrap();
        assert!(matches!(
            model.append_tool_results(&mut conv, &[ToolResult::ok("c9", "x")]),
            Err(ModelError::DanglingToolResult { .. })
        ));
    }

    #[test]
    fn condense_skips_latest_and_is_idempotent() {
        let model = ScriptedModel::new("scripted", vec![]);
        let mut conv = model.create_conversation("sys", &[]);
        model.append_user(&mut conv, "objective").unwrap();
        model
            .append_assistant_turn(&mut conv, &ScriptedModel::single_call("c1", "a", json!({})))
            .unwrap();
        model
            .append_tool_results(&mut conv, &[ToolResult::ok("c1", "old")])
            .unwrap();
        model
            .append_assistant_turn(&mut conv, &ScriptedModel::single_call("c2", "b", json!({})))
            .unwrap();
        model
            .append_tool_results(&mut conv, &[ToolResult::ok("c2", "new")])
            .unwrap();

        assert_eq!(model.condense(&mut conv), 1);
        assert_eq!(model.condense(&mut conv), 0);

        let Conversation::Scripted(inner) = &conv else {
            panic!()
        };
        let contents: Vec<&str> = inner
            .entries
            .iter()
            .filter_map(|e| match e {
                ScriptedEntry::ToolResults { results } => Some(results[0].content.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(contents, vec![CONDENSED_PLACEHOLDER, "new"]);
    }

    #[tokio::test]
    async fn default_input_tokens_reported() {
        let model = ScriptedModel::new("scripted", vec![ScriptedModel::text_turn("x")])
            .with_default_input_tokens(90_000)
            .with_context_window(100_000);
        let conv = model.create_conversation("sys", &[]);
        let turn = model.complete(&conv, &CompletionHooks::none()).await.unwrap();
        assert_eq!(turn.usage.input_tokens, 90_000);
        assert_eq!(model.context_window(), 100_000);
    }
}
