//! Non-spawn tool execution.
//!
//! One call in, one result out: look the tool up in the catalog, run it
//! under its timeout, map errors onto `is_error` observations, and record
//! metrics. Spawn calls never come through here: the engine intercepts
//! them before dispatch.

use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use planter_core::messages::{ToolCall, ToolResult};
use planter_core::text::clip_observation;
use planter_tools::{ToolContext, ToolError, ToolRegistry};

/// A dispatched result plus the finality flag `finish` can set.
#[derive(Clone, Debug)]
pub struct DispatchResult {
    /// The observation result, clipped.
    pub result: ToolResult,
    /// Whether the tool marked the turn final.
    pub is_final: bool,
}

impl DispatchResult {
    /// Build an error result from a policy or dispatch failure.
    #[must_use]
    pub fn from_error(call_id: &str, error: &ToolError) -> Self {
        Self {
            result: ToolResult::error(call_id, error.observation()),
            is_final: false,
        }
    }
}

/// Execute one non-spawn tool call.
#[instrument(skip_all, fields(tool = %call.name, tool_call_id = %call.id))]
pub async fn execute_tool_call(
    call: &ToolCall,
    registry: &ToolRegistry,
    ctx: &ToolContext,
) -> DispatchResult {
    let start = Instant::now();

    let Some(tool) = registry.get(&call.name) else {
        warn!(tool = %call.name, "unknown tool");
        return DispatchResult::from_error(
            &call.id,
            &ToolError::invalid(format!("unknown tool: {}", call.name)),
        );
    };

    // run_shell may carry its own (longer) timeout argument; honor it with a
    // small grace so the subprocess timeout fires first.
    let timeout = if call.name == "run_shell" {
        call.u64_arg("timeout")
            .map_or(ctx.timeout, |secs| Duration::from_secs(secs + 5))
            .max(ctx.timeout)
    } else {
        ctx.timeout
    };

    let args = Value::Object(call.arguments.clone());
    let outcome = tokio::time::timeout(timeout, tool.execute(args, ctx)).await;

    let elapsed = start.elapsed();
    counter!("tool_executions_total", "tool" => call.name.clone()).increment(1);
    histogram!("tool_execution_duration_seconds", "tool" => call.name.clone())
        .record(elapsed.as_secs_f64());

    match outcome {
        Ok(Ok(outcome)) => {
            info!(tool = %call.name, duration_ms = elapsed.as_millis() as u64, "tool executed");
            DispatchResult {
                result: ToolResult::ok(
                    &call.id,
                    clip_observation(&outcome.observation, ctx.max_observation_chars),
                ),
                is_final: outcome.is_final,
            }
        }
        Ok(Err(error)) => {
            debug!(tool = %call.name, kind = error.kind(), "tool error");
            DispatchResult::from_error(&call.id, &error)
        }
        Err(_elapsed) => {
            warn!(tool = %call.name, "tool call timed out");
            DispatchResult::from_error(
                &call.id,
                &ToolError::Timeout {
                    seconds: timeout.as_secs(),
                },
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use planter_tools::standard_registry;
    use planter_tools::testutil::{test_context, write_fixture};
    use serde_json::Map;
    use serde_json::json;

    fn call(name: &str, args: Value) -> ToolCall {
        let args: Map<String, Value> = args.as_object().cloned().unwrap_or_default();
        ToolCall::new("c1", name, args)
    }

    #[tokio::test]
    async fn successful_dispatch() {
        let registry = standard_registry();
        let (ctx, dir) = test_context();
        write_fixture(dir.path(), "notes.txt", "hello world");

        let result =
            execute_tool_call(&call("read_file", json!({"path": "notes.txt"})), &registry, &ctx)
                .await;
        assert!(!result.result.is_error);
        assert_eq!(result.result.content, "hello world");
        assert_eq!(result.result.tool_call_id, "c1");
    }

    #[tokio::test]
    async fn unknown_tool_is_error_result() {
        let registry = standard_registry();
        let (ctx, _dir) = test_context();
        let result = execute_tool_call(&call("teleport", json!({})), &registry, &ctx).await;
        assert!(result.result.is_error);
        assert!(result.result.content.contains("unknown tool"));
    }

    #[tokio::test]
    async fn tool_error_becomes_error_result_not_panic() {
        let registry = standard_registry();
        let (ctx, _dir) = test_context();
        let result = execute_tool_call(
            &call("write_file", json!({"path": "../../escape", "content": "x"})),
            &registry,
            &ctx,
        )
        .await;
        assert!(result.result.is_error);
        assert!(result.result.content.starts_with("path_escape:"));
    }

    #[tokio::test]
    async fn finish_sets_final_flag() {
        let registry = standard_registry();
        let (ctx, _dir) = test_context();
        let result =
            execute_tool_call(&call("finish", json!({"text": "done"})), &registry, &ctx).await;
        assert!(result.is_final);
        assert_eq!(result.result.content, "done");
    }

    #[tokio::test]
    async fn slow_command_times_out() {
        let registry = standard_registry();
        let (ctx, _dir) = test_context();
        let result = execute_tool_call(
            &call("run_shell", json!({"command": "sleep 30", "timeout": 1})),
            &registry,
            &ctx,
        )
        .await;
        assert!(result.result.is_error);
        assert!(result.result.content.starts_with("timeout:"));
    }
}
