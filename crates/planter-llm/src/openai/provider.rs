//! [`Model`] implementation for OpenAI-compatible endpoints.

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{debug, instrument, warn};

use planter_core::messages::{ModelTurn, ToolResult};
use planter_core::retry::resolve_retry_secs;
use planter_core::schema::ToolSchema;

use super::stream::collect_stream;
use super::types::{
    ChatMessage, ChatRequest, ChatTool, DEFAULT_BASE_URL, FunctionDef, OpenAiConfig,
    OpenAiConversation, StreamOptions, WireFunction, WireToolCall,
};
use crate::error_parsing::{is_context_overflow, is_param_rejection, parse_api_error};
use crate::errors::{ModelError, ModelResult};
use crate::provider::{
    CONDENSED_PLACEHOLDER, CompletionHooks, Conversation, Model, ModelListing,
    foreign_conversation,
};
use crate::retry::{AttemptError, run_with_retry};
use crate::tiers::{default_context_window, model_info};

/// OpenAI-compatible LLM provider.
#[derive(Debug)]
pub struct OpenAiProvider {
    config: OpenAiConfig,
    client: reqwest::Client,
}

impl OpenAiProvider {
    /// Create a new provider.
    #[must_use]
    pub fn new(config: OpenAiConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Create a new provider with a shared HTTP client.
    #[must_use]
    pub fn with_client(config: OpenAiConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    fn base_url(&self) -> &str {
        self.config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    /// Convert a neutral schema into the strict wire form:
    /// `additionalProperties: false` and every property required.
    fn to_chat_tool(schema: &ToolSchema) -> ChatTool {
        let properties = schema
            .parameters
            .properties
            .clone()
            .unwrap_or_default();
        let required: Vec<String> = schema.parameters.property_names();
        ChatTool {
            tool_type: "function".into(),
            function: FunctionDef {
                name: schema.name.clone(),
                description: schema.description.clone(),
                parameters: json!({
                    "type": "object",
                    "properties": properties,
                    "required": required,
                    "additionalProperties": false,
                }),
                strict: true,
            },
        }
    }

    fn build_request(&self, conv: &OpenAiConversation, include_effort: bool) -> ChatRequest {
        ChatRequest {
            model: self.config.model.clone(),
            messages: conv.messages.clone(),
            tools: if conv.tools.is_empty() {
                None
            } else {
                Some(conv.tools.clone())
            },
            stream: true,
            stream_options: StreamOptions {
                include_usage: true,
            },
            max_tokens: self.config.max_tokens,
            reasoning_effort: if include_effort {
                self.config.reasoning_effort.map(|e| e.as_str().to_owned())
            } else {
                None
            },
        }
    }

    async fn attempt(
        &self,
        request: &ChatRequest,
        hooks: &CompletionHooks,
    ) -> Result<ModelTurn, AttemptError> {
        let url = format!("{}/chat/completions", self.base_url());
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    AttemptError::ConnectTimeout {
                        message: e.to_string(),
                    }
                } else {
                    AttemptError::Fatal(ModelError::Network {
                        message: e.to_string(),
                    })
                }
            })?;

        let status = response.status();
        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned);
            let body = response.text().await.unwrap_or_default();
            let info = parse_api_error(&body, 429);
            return Err(AttemptError::RateLimited {
                retry_after_secs: Some(resolve_retry_secs(retry_after.as_deref())),
                message: info.message,
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if is_context_overflow(&body) {
                return Err(AttemptError::Fatal(ModelError::ContextOverflow {
                    message: parse_api_error(&body, status.as_u16()).message,
                }));
            }
            let info = parse_api_error(&body, status.as_u16());
            warn!(status = status.as_u16(), code = info.code.as_deref().unwrap_or("unknown"), "API error");
            return Err(AttemptError::Fatal(ModelError::HttpStatus {
                status: status.as_u16(),
                body: info.message,
            }));
        }

        collect_stream(response, hooks).await.map_err(AttemptError::Fatal)
    }

    fn expect_conv<'a>(&self, conv: &'a Conversation) -> ModelResult<&'a OpenAiConversation> {
        match conv {
            Conversation::OpenAi(inner) => Ok(inner),
            other => Err(foreign_conversation("openai", other)),
        }
    }

    fn expect_conv_mut<'a>(
        &self,
        conv: &'a mut Conversation,
    ) -> ModelResult<&'a mut OpenAiConversation> {
        match conv {
            Conversation::OpenAi(inner) => Ok(inner),
            other => Err(foreign_conversation("openai", other)),
        }
    }
}

#[async_trait]
impl Model for OpenAiProvider {
    fn name(&self) -> &str {
        &self.config.model
    }

    fn context_window(&self) -> u64 {
        self.config
            .context_window
            .unwrap_or_else(|| default_context_window(&self.config.model))
    }

    fn create_conversation(&self, system_prompt: &str, tools: &[ToolSchema]) -> Conversation {
        Conversation::OpenAi(OpenAiConversation {
            messages: vec![ChatMessage::text("system", system_prompt)],
            tools: tools.iter().map(Self::to_chat_tool).collect(),
        })
    }

    fn append_user(&self, conversation: &mut Conversation, text: &str) -> ModelResult<()> {
        let conv = self.expect_conv_mut(conversation)?;
        conv.messages.push(ChatMessage::text("user", text));
        Ok(())
    }

    #[instrument(skip_all, fields(model = %self.config.model))]
    async fn complete(
        &self,
        conversation: &Conversation,
        hooks: &CompletionHooks,
    ) -> ModelResult<ModelTurn> {
        let conv = self.expect_conv(conversation)?;
        let mut include_effort = self.config.reasoning_effort.is_some();
        loop {
            let request = self.build_request(conv, include_effort);
            debug!(
                message_count = request.messages.len(),
                has_tools = request.tools.is_some(),
                "sending completion request"
            );
            let result = run_with_retry(|| self.attempt(&request, hooks), hooks).await;
            match result {
                Err(ModelError::HttpStatus { status: 400, ref body })
                    if include_effort && is_param_rejection(body, "reasoning_effort") =>
                {
                    warn!("endpoint rejected reasoning_effort, retrying without it");
                    include_effort = false;
                }
                other => return other,
            }
        }
    }

    fn append_assistant_turn(
        &self,
        conversation: &mut Conversation,
        turn: &ModelTurn,
    ) -> ModelResult<()> {
        let conv = self.expect_conv_mut(conversation)?;
        let tool_calls: Vec<WireToolCall> = turn
            .tool_calls
            .iter()
            .map(|call| WireToolCall {
                id: call.id.clone(),
                call_type: "function".into(),
                function: WireFunction {
                    name: call.name.clone(),
                    arguments: serde_json::to_string(&call.arguments).unwrap_or_else(|_| "{}".into()),
                },
            })
            .collect();
        conv.messages.push(ChatMessage {
            role: "assistant".into(),
            content: if turn.text.is_empty() {
                None
            } else {
                Some(turn.text.clone())
            },
            tool_calls: if tool_calls.is_empty() {
                None
            } else {
                Some(tool_calls)
            },
            tool_call_id: None,
        });
        Ok(())
    }

    fn append_tool_results(
        &self,
        conversation: &mut Conversation,
        results: &[ToolResult],
    ) -> ModelResult<()> {
        let conv = self.expect_conv_mut(conversation)?;
        let open_ids: Vec<String> = conv
            .messages
            .iter()
            .rev()
            .find(|m| m.role == "assistant")
            .and_then(|m| m.tool_calls.as_ref())
            .map(|calls| calls.iter().map(|c| c.id.clone()).collect())
            .unwrap_or_default();

        for result in results {
            if !open_ids.contains(&result.tool_call_id) {
                return Err(ModelError::DanglingToolResult {
                    tool_call_id: result.tool_call_id.clone(),
                });
            }
        }
        for result in results {
            conv.messages.push(ChatMessage {
                role: "tool".into(),
                content: Some(result.content.clone()),
                tool_calls: None,
                tool_call_id: Some(result.tool_call_id.clone()),
            });
        }
        Ok(())
    }

    fn condense(&self, conversation: &mut Conversation) -> usize {
        let Conversation::OpenAi(conv) = conversation else {
            return 0;
        };
        let Some(last_assistant) = conv.messages.iter().rposition(|m| m.role == "assistant")
        else {
            return 0;
        };
        let mut condensed = 0;
        for msg in &mut conv.messages[..last_assistant] {
            if msg.role == "tool" && msg.content.as_deref() != Some(CONDENSED_PLACEHOLDER) {
                msg.content = Some(CONDENSED_PLACEHOLDER.into());
                condensed += 1;
            }
        }
        condensed
    }

    fn snapshot(&self, conversation: &Conversation) -> Value {
        match conversation {
            Conversation::OpenAi(conv) => serde_json::to_value(&conv.messages).unwrap_or(Value::Null),
            _ => Value::Null,
        }
    }

    fn list_models(&self) -> Vec<ModelListing> {
        [self.config.model.as_str()]
            .into_iter()
            .map(|name| ModelListing {
                name: name.to_owned(),
                tier_hint: model_info(name).map(|i| i.tier.0),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use planter_core::config::ReasoningEffort;
    use planter_core::messages::{StopReason, TokenUsage, ToolCall};
    use planter_core::schema::SchemaObject;
    use serde_json::Map;

    fn provider(base_url: Option<String>) -> OpenAiProvider {
        OpenAiProvider::new(OpenAiConfig {
            model: "gpt-4o".into(),
            api_key: "test-key".into(),
            base_url,
            max_tokens: None,
            reasoning_effort: None,
            context_window: None,
        })
    }

    fn read_file_schema() -> ToolSchema {
        ToolSchema {
            name: "read_file".into(),
            description: "Read a file".into(),
            parameters: SchemaObject {
                schema_type: "object".into(),
                properties: Some({
                    let mut m = Map::new();
                    let _ = m.insert("path".into(), json!({"type": "string"}));
                    m
                }),
                required: Some(vec!["path".into()]),
            },
        }
    }

    fn turn_with_calls(calls: Vec<ToolCall>) -> ModelTurn {
        ModelTurn {
            text: String::new(),
            tool_calls: calls,
            stop_reason: StopReason::ToolUse,
            usage: TokenUsage::default(),
            raw_response: Value::Null,
        }
    }

    // ── Schema adaptation ───────────────────────────────────────────────

    #[test]
    fn strict_schema_has_additional_properties_false() {
        let tool = OpenAiProvider::to_chat_tool(&read_file_schema());
        assert!(tool.function.strict);
        assert_eq!(tool.function.parameters["additionalProperties"], false);
        assert_eq!(tool.function.parameters["required"][0], "path");
    }

    // ── Conversation operations ─────────────────────────────────────────

    #[test]
    fn create_conversation_starts_with_system() {
        let p = provider(None);
        let conv = p.create_conversation("You are careful.", &[read_file_schema()]);
        let Conversation::OpenAi(inner) = &conv else {
            panic!("wrong variant")
        };
        assert_eq!(inner.messages[0].role, "system");
        assert_eq!(inner.tools.len(), 1);
    }

    #[test]
    fn append_tool_results_requires_matching_call() {
        let p = provider(None);
        let mut conv = p.create_conversation("sys", &[]);
        p.append_user(&mut conv, "objective").unwrap();
        let mut args = Map::new();
        let _ = args.insert("path".into(), json!("a.txt"));
        p.append_assistant_turn(
            &mut conv,
            &turn_with_calls(vec![ToolCall::new("call_1", "read_file", args)]),
        )
        .unwrap();

        let err = p
            .append_tool_results(&mut conv, &[ToolResult::ok("call_999", "text")])
            .unwrap_err();
        assert!(matches!(err, ModelError::DanglingToolResult { .. }));

        p.append_tool_results(&mut conv, &[ToolResult::ok("call_1", "text")])
            .unwrap();
    }

    #[test]
    fn foreign_conversation_rejected() {
        let p = provider(None);
        let mut conv = Conversation::Scripted(crate::scripted::ScriptedConversation::default());
        assert!(p.append_user(&mut conv, "x").is_err());
    }

    // ── Condensation ────────────────────────────────────────────────────

    fn conv_with_two_rounds(p: &OpenAiProvider) -> Conversation {
        let mut conv = p.create_conversation("sys", &[]);
        p.append_user(&mut conv, "objective").unwrap();
        p.append_assistant_turn(
            &mut conv,
            &turn_with_calls(vec![ToolCall::new("call_1", "read_file", Map::new())]),
        )
        .unwrap();
        p.append_tool_results(&mut conv, &[ToolResult::ok("call_1", "big old output")])
            .unwrap();
        p.append_assistant_turn(
            &mut conv,
            &turn_with_calls(vec![ToolCall::new("call_2", "search", Map::new())]),
        )
        .unwrap();
        p.append_tool_results(&mut conv, &[ToolResult::ok("call_2", "recent output")])
            .unwrap();
        conv
    }

    #[test]
    fn condense_replaces_only_old_results() {
        let p = provider(None);
        let mut conv = conv_with_two_rounds(&p);
        let condensed = p.condense(&mut conv);
        assert_eq!(condensed, 1);

        let Conversation::OpenAi(inner) = &conv else {
            panic!()
        };
        let tool_messages: Vec<&ChatMessage> =
            inner.messages.iter().filter(|m| m.role == "tool").collect();
        assert_eq!(
            tool_messages[0].content.as_deref(),
            Some(CONDENSED_PLACEHOLDER)
        );
        // Result of the most recent assistant turn is untouched.
        assert_eq!(tool_messages[1].content.as_deref(), Some("recent output"));
        // Pairing IDs survive.
        assert_eq!(tool_messages[0].tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn condense_is_idempotent() {
        let p = provider(None);
        let mut conv = conv_with_two_rounds(&p);
        assert_eq!(p.condense(&mut conv), 1);
        assert_eq!(p.condense(&mut conv), 0);
    }

    #[test]
    fn condense_preserves_last_assistant_turn() {
        let p = provider(None);
        let mut conv = conv_with_two_rounds(&p);
        let before = p.snapshot(&conv);
        let _ = p.condense(&mut conv);
        let after = p.snapshot(&conv);
        // The last assistant message is bit-identical.
        let last = |v: &Value| {
            v.as_array()
                .unwrap()
                .iter()
                .filter(|m| m["role"] == "assistant")
                .next_back()
                .cloned()
                .unwrap()
        };
        assert_eq!(last(&before), last(&after));
    }

    // ── HTTP behavior (wiremock) ────────────────────────────────────────

    fn sse_body(chunks: &[Value]) -> String {
        let mut body = String::new();
        for chunk in chunks {
            body.push_str("data: ");
            body.push_str(&chunk.to_string());
            body.push_str("\n\n");
        }
        body.push_str("data: [DONE]\n\n");
        body
    }

    #[tokio::test]
    async fn completes_against_sse_endpoint() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        let body = sse_body(&[
            json!({"choices": [{"delta": {"content": "The file says: "}}]}),
            json!({"choices": [{"delta": {"content": "hello world."}, "finish_reason": "stop"}]}),
            json!({"choices": [], "usage": {"prompt_tokens": 40, "completion_tokens": 8}}),
        ]);
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_raw(body, "text/event-stream"),
            )
            .mount(&server)
            .await;

        let p = provider(Some(server.uri()));
        let mut conv = p.create_conversation("sys", &[]);
        p.append_user(&mut conv, "Read notes.txt").unwrap();
        let turn = p.complete(&conv, &CompletionHooks::none()).await.unwrap();
        assert_eq!(turn.text, "The file says: hello world.");
        assert_eq!(turn.usage.input_tokens, 40);
        assert_eq!(turn.stop_reason, StopReason::EndTurn);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_on_429_then_succeeds() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(429)
                    .insert_header("retry-after", "2")
                    .set_body_string(r#"{"error": {"message": "slow down"}}"#),
            )
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_raw(
                        sse_body(&[json!({"choices": [{"delta": {"content": "ok"}, "finish_reason": "stop"}]})]),
                        "text/event-stream",
                    ),
            )
            .mount(&server)
            .await;

        use parking_lot::Mutex;
        use std::sync::Arc;
        let countdown: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&countdown);
        let hooks = CompletionHooks {
            on_content_delta: None,
            on_retry: Some(Box::new(move |m| sink.lock().push(m.to_owned()))),
        };

        let p = provider(Some(server.uri()));
        let mut conv = p.create_conversation("sys", &[]);
        p.append_user(&mut conv, "hi").unwrap();
        let turn = p.complete(&conv, &hooks).await.unwrap();
        assert_eq!(turn.text, "ok");
        // Two sleeps of Retry-After: 2, with a countdown message per second.
        assert_eq!(countdown.lock().len(), 4);
    }

    #[tokio::test]
    async fn http_500_is_fatal_with_truncated_body() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(500).set_body_string("x".repeat(64 * 1024)))
            .mount(&server)
            .await;

        let p = provider(Some(server.uri()));
        let conv = p.create_conversation("sys", &[]);
        let err = p.complete(&conv, &CompletionHooks::none()).await.unwrap_err();
        match err {
            ModelError::HttpStatus { status, body } => {
                assert_eq!(status, 500);
                assert!(body.len() <= 8 * 1024);
            }
            other => panic!("expected http error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn context_overflow_detected_from_400() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(400).set_body_string(
                r#"{"error": {"message": "This model's maximum context length is 128000 tokens"}}"#,
            ))
            .mount(&server)
            .await;

        let p = provider(Some(server.uri()));
        let conv = p.create_conversation("sys", &[]);
        let err = p.complete(&conv, &CompletionHooks::none()).await.unwrap_err();
        assert!(matches!(err, ModelError::ContextOverflow { .. }));
    }

    #[tokio::test]
    async fn reasoning_effort_dropped_after_rejection() {
        use wiremock::matchers::{body_string_contains, method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        // Requests carrying reasoning_effort are rejected...
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_string_contains("reasoning_effort"))
            .respond_with(ResponseTemplate::new(400).set_body_string(
                r#"{"error": {"message": "Unknown parameter: 'reasoning_effort'"}}"#,
            ))
            .mount(&server)
            .await;
        // ...requests without it succeed.
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_raw(
                        sse_body(&[json!({"choices": [{"delta": {"content": "done"}, "finish_reason": "stop"}]})]),
                        "text/event-stream",
                    ),
            )
            .mount(&server)
            .await;

        let p = OpenAiProvider::new(OpenAiConfig {
            model: "gpt-4o".into(),
            api_key: "k".into(),
            base_url: Some(server.uri()),
            max_tokens: None,
            reasoning_effort: Some(ReasoningEffort::High),
            context_window: None,
        });
        let conv = p.create_conversation("sys", &[]);
        let turn = p.complete(&conv, &CompletionHooks::none()).await.unwrap();
        assert_eq!(turn.text, "done");
    }
}
