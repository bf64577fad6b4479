//! Reasoning and control tools: `think`, `finish`, plan capture/injection,
//! and the spawn catalog entries the engine intercepts.

use async_trait::async_trait;
use serde_json::{Value, json};

use planter_core::schema::ToolSchema;

use crate::errors::ToolError;
use crate::traits::{PlanterTool, SpawnKind, ToolContext, ToolOutcome};
use crate::utils::schema::SchemaBuilder;

/// Record a thought. No side effects beyond the observation log.
pub struct ThinkTool;

#[async_trait]
impl PlanterTool for ThinkTool {
    fn name(&self) -> &str {
        "think"
    }

    fn definition(&self) -> ToolSchema {
        SchemaBuilder::new(
            "think",
            "Write down your reasoning. Nothing happens; the thought is recorded.",
        )
        .required("text", json!({"type": "string", "description": "The thought"}))
        .build()
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<ToolOutcome, ToolError> {
        let _ = args
            .get("text")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::invalid("missing required parameter: text"))?;
        Ok(ToolOutcome::observation("thought recorded"))
    }
}

/// End the turn with a final answer.
pub struct FinishTool;

#[async_trait]
impl PlanterTool for FinishTool {
    fn name(&self) -> &str {
        "finish"
    }

    fn definition(&self) -> ToolSchema {
        SchemaBuilder::new(
            "finish",
            "Finish the task and return your final answer.",
        )
        .required("text", json!({"type": "string", "description": "The final answer"}))
        .build()
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<ToolOutcome, ToolError> {
        let text = args
            .get("text")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::invalid("missing required parameter: text"))?;
        Ok(ToolOutcome::final_answer(text))
    }
}

/// Capture an investigation plan for persistence and later injection.
pub struct PlanAssembleTool;

#[async_trait]
impl PlanterTool for PlanAssembleTool {
    fn name(&self) -> &str {
        "plan_assemble"
    }

    fn definition(&self) -> ToolSchema {
        SchemaBuilder::new(
            "plan_assemble",
            "Store an investigation plan. The newest plan is injected into the next solve.",
        )
        .required("plan", json!({"type": "string", "description": "The plan text (markdown)"}))
        .build()
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolOutcome, ToolError> {
        let plan = args
            .get("plan")
            .and_then(Value::as_str)
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| ToolError::invalid("missing required parameter: plan"))?;
        ctx.plans.push(plan);
        Ok(ToolOutcome::observation(format!(
            "plan captured ({} chars)",
            plan.len()
        )))
    }
}

/// Surface the newest captured plan into the observation stream.
pub struct PlanInjectTool;

#[async_trait]
impl PlanterTool for PlanInjectTool {
    fn name(&self) -> &str {
        "plan_inject"
    }

    fn definition(&self) -> ToolSchema {
        SchemaBuilder::new("plan_inject", "Recall the newest stored investigation plan.").build()
    }

    async fn execute(&self, _args: Value, ctx: &ToolContext) -> Result<ToolOutcome, ToolError> {
        match ctx.plans.latest() {
            Some(plan) => Ok(ToolOutcome::observation(plan)),
            None => Ok(ToolOutcome::observation("no plan stored yet")),
        }
    }
}

/// Spawn a sub-agent on an explicit model. Dispatched by the engine.
pub struct SubtaskTool;

#[async_trait]
impl PlanterTool for SubtaskTool {
    fn name(&self) -> &str {
        "subtask"
    }

    fn definition(&self) -> ToolSchema {
        SchemaBuilder::new(
            "subtask",
            "Delegate an objective to a sub-agent running on the named model. The model must \
             be at your own tier or cheaper.",
        )
        .required("objective", json!({"type": "string", "description": "What the sub-agent should do"}))
        .required("model", json!({"type": "string", "description": "Model name for the sub-agent"}))
        .optional("acceptance_criteria", json!({"type": "string", "description": "Checklist the result is judged against"}))
        .build()
    }

    fn spawn_kind(&self) -> Option<SpawnKind> {
        Some(SpawnKind::Subtask)
    }

    async fn execute(&self, _args: Value, _ctx: &ToolContext) -> Result<ToolOutcome, ToolError> {
        Err(ToolError::internal("subtask is dispatched by the engine"))
    }
}

/// Spawn a lowest-tier executor sub-agent. Dispatched by the engine.
pub struct ExecuteTool;

#[async_trait]
impl PlanterTool for ExecuteTool {
    fn name(&self) -> &str {
        "execute"
    }

    fn definition(&self) -> ToolSchema {
        SchemaBuilder::new(
            "execute",
            "Delegate a mechanical objective to a cheap leaf executor.",
        )
        .required("objective", json!({"type": "string", "description": "What the executor should do"}))
        .optional("acceptance_criteria", json!({"type": "string", "description": "Checklist the result is judged against"}))
        .build()
    }

    fn spawn_kind(&self) -> Option<SpawnKind> {
        Some(SpawnKind::Execute)
    }

    async fn execute(&self, _args: Value, _ctx: &ToolContext) -> Result<ToolOutcome, ToolError> {
        Err(ToolError::internal("execute is dispatched by the engine"))
    }
}
