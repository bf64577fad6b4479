//! [`Model`] implementation for the Anthropic messages API.

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde_json::{Value, json};
use tracing::{debug, instrument, warn};

use planter_core::config::ReasoningEffort;
use planter_core::messages::{ModelTurn, ToolResult};
use planter_core::retry::resolve_retry_secs;
use planter_core::schema::ToolSchema;

use super::stream::collect_stream;
use super::types::{
    API_VERSION, AnthropicConfig, AnthropicConversation, AnthropicRequest, AnthropicTool,
    DEFAULT_BASE_URL, DEFAULT_MAX_OUTPUT_TOKENS, MessageParam,
};
use crate::error_parsing::{is_context_overflow, is_param_rejection, parse_api_error};
use crate::errors::{ModelError, ModelResult};
use crate::provider::{
    CONDENSED_PLACEHOLDER, CompletionHooks, Conversation, Model, ModelListing,
    foreign_conversation,
};
use crate::retry::{AttemptError, run_with_retry};
use crate::tiers::{default_context_window, model_info};

/// Anthropic LLM provider.
#[derive(Debug)]
pub struct AnthropicProvider {
    config: AnthropicConfig,
    client: reqwest::Client,
}

impl AnthropicProvider {
    /// Create a new provider.
    #[must_use]
    pub fn new(config: AnthropicConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Create a new provider with a shared HTTP client.
    #[must_use]
    pub fn with_client(config: AnthropicConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    fn base_url(&self) -> &str {
        self.config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    fn build_headers(&self) -> ModelResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        let _ = headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let _ = headers.insert("anthropic-version", HeaderValue::from_static(API_VERSION));
        let _ = headers.insert(
            "x-api-key",
            HeaderValue::from_str(&self.config.api_key).map_err(|e| ModelError::Network {
                message: format!("invalid API key header: {e}"),
            })?,
        );
        Ok(headers)
    }

    fn max_tokens(&self) -> u32 {
        self.config.max_tokens.unwrap_or(DEFAULT_MAX_OUTPUT_TOKENS)
    }

    /// Map reasoning effort onto a thinking budget: a fraction of the output
    /// cap so the budget always fits under `max_tokens`.
    fn thinking_config(&self, include_thinking: bool) -> Option<Value> {
        if !include_thinking {
            return None;
        }
        let effort = self.config.reasoning_effort?;
        let max = self.max_tokens();
        let budget = match effort {
            ReasoningEffort::Low => max / 8,
            ReasoningEffort::Medium => max / 4,
            ReasoningEffort::High => max / 2,
        };
        Some(json!({"type": "enabled", "budget_tokens": budget}))
    }

    fn to_anthropic_tool(schema: &ToolSchema) -> AnthropicTool {
        AnthropicTool {
            name: schema.name.clone(),
            description: schema.description.clone(),
            input_schema: serde_json::to_value(&schema.parameters).unwrap_or_default(),
        }
    }

    fn build_request(
        &self,
        conv: &AnthropicConversation,
        include_thinking: bool,
    ) -> AnthropicRequest {
        AnthropicRequest {
            model: self.config.model.clone(),
            max_tokens: self.max_tokens(),
            messages: conv.messages.clone(),
            system: if conv.system.is_empty() {
                None
            } else {
                Some(conv.system.clone())
            },
            tools: if conv.tools.is_empty() {
                None
            } else {
                Some(conv.tools.clone())
            },
            stream: true,
            thinking: self.thinking_config(include_thinking),
        }
    }

    async fn attempt(
        &self,
        request: &AnthropicRequest,
        hooks: &CompletionHooks,
    ) -> Result<ModelTurn, AttemptError> {
        let url = format!("{}/v1/messages", self.base_url());
        let headers = self.build_headers().map_err(AttemptError::Fatal)?;
        let response = self
            .client
            .post(&url)
            .headers(headers)
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
            warn!(
                status = status.as_u16(),
                code = info.code.as_deref().unwrap_or("unknown"),
                "API error"
            );
            return Err(AttemptError::Fatal(ModelError::HttpStatus {
                status: status.as_u16(),
                body: info.message,
            }));
        }

        collect_stream(response, hooks)
            .await
            .map_err(AttemptError::Fatal)
    }

    fn expect_conv<'a>(&self, conv: &'a Conversation) -> ModelResult<&'a AnthropicConversation> {
        match conv {
            Conversation::Anthropic(inner) => Ok(inner),
            other => Err(foreign_conversation("anthropic", other)),
        }
    }

    fn expect_conv_mut<'a>(
        &self,
        conv: &'a mut Conversation,
    ) -> ModelResult<&'a mut AnthropicConversation> {
        match conv {
            Conversation::Anthropic(inner) => Ok(inner),
            other => Err(foreign_conversation("anthropic", other)),
        }
    }
}

#[async_trait]
impl Model for AnthropicProvider {
    fn name(&self) -> &str {
        &self.config.model
    }

    fn context_window(&self) -> u64 {
        self.config
            .context_window
            .unwrap_or_else(|| default_context_window(&self.config.model))
    }

    fn create_conversation(&self, system_prompt: &str, tools: &[ToolSchema]) -> Conversation {
        Conversation::Anthropic(AnthropicConversation {
            system: system_prompt.to_owned(),
            messages: Vec::new(),
            tools: tools.iter().map(Self::to_anthropic_tool).collect(),
        })
    }

    fn append_user(&self, conversation: &mut Conversation, text: &str) -> ModelResult<()> {
        let conv = self.expect_conv_mut(conversation)?;
        conv.messages.push(MessageParam {
            role: "user".into(),
            content: vec![json!({"type": "text", "text": text})],
        });
        Ok(())
    }

    #[instrument(skip_all, fields(model = %self.config.model))]
    async fn complete(
        &self,
        conversation: &Conversation,
        hooks: &CompletionHooks,
    ) -> ModelResult<ModelTurn> {
        let conv = self.expect_conv(conversation)?;
        let mut include_thinking = self.config.reasoning_effort.is_some();
        loop {
            let request = self.build_request(conv, include_thinking);
            debug!(
                message_count = request.messages.len(),
                has_tools = request.tools.is_some(),
                has_thinking = request.thinking.is_some(),
                "sending completion request"
            );
            let result = run_with_retry(|| self.attempt(&request, hooks), hooks).await;
            match result {
                Err(ModelError::HttpStatus {
                    status: 400,
                    ref body,
                }) if include_thinking && is_param_rejection(body, "thinking") => {
                    warn!("endpoint rejected thinking, retrying without it");
                    include_thinking = false;
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
        let mut content = Vec::new();
        if !turn.text.is_empty() {
            content.push(json!({"type": "text", "text": turn.text}));
        }
        for call in &turn.tool_calls {
            content.push(json!({
                "type": "tool_use",
                "id": call.id,
                "name": call.name,
                "input": call.arguments,
            }));
        }
        if content.is_empty() {
            content.push(json!({"type": "text", "text": ""}));
        }
        conv.messages.push(MessageParam {
            role: "assistant".into(),
            content,
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
            .map(|m| {
                m.content
                    .iter()
                    .filter(|b| b.get("type").and_then(Value::as_str) == Some("tool_use"))
                    .filter_map(|b| b.get("id").and_then(Value::as_str))
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default();

        for result in results {
            if !open_ids.contains(&result.tool_call_id) {
                return Err(ModelError::DanglingToolResult {
                    tool_call_id: result.tool_call_id.clone(),
                });
            }
        }
        let blocks: Vec<Value> = results
            .iter()
            .map(|r| {
                json!({
                    "type": "tool_result",
                    "tool_use_id": r.tool_call_id,
                    "content": r.content,
                    "is_error": r.is_error,
                })
            })
            .collect();
        conv.messages.push(MessageParam {
            role: "user".into(),
            content: blocks,
        });
        Ok(())
    }

    fn condense(&self, conversation: &mut Conversation) -> usize {
        let Conversation::Anthropic(conv) = conversation else {
            return 0;
        };
        let Some(last_assistant) = conv.messages.iter().rposition(|m| m.role == "assistant")
        else {
            return 0;
        };
        let mut condensed = 0;
        for msg in &mut conv.messages[..last_assistant] {
            if msg.role != "user" {
                continue;
            }
            for block in &mut msg.content {
                if block.get("type").and_then(Value::as_str) != Some("tool_result") {
                    continue;
                }
                if block.get("content").and_then(Value::as_str) == Some(CONDENSED_PLACEHOLDER) {
                    continue;
                }
                if let Some(obj) = block.as_object_mut() {
                    let _ = obj.insert("content".into(), json!(CONDENSED_PLACEHOLDER));
                    condensed += 1;
                }
            }
        }
        condensed
    }

    fn snapshot(&self, conversation: &Conversation) -> Value {
        match conversation {
            Conversation::Anthropic(conv) => json!({
                "system": conv.system,
                "messages": conv.messages,
            }),
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
