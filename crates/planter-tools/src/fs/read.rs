//! `read_file`: returns file text and records the path in the read set.

use async_trait::async_trait;
use serde_json::{Value, json};

use planter_core::schema::ToolSchema;
use planter_core::text::clip_observation;

use crate::errors::ToolError;
use crate::traits::{PlanterTool, ToolContext, ToolOutcome};
use crate::utils::schema::SchemaBuilder;

/// Read a file, optionally a 1-based line range.
pub struct ReadFileTool;

#[async_trait]
impl PlanterTool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn definition(&self) -> ToolSchema {
        SchemaBuilder::new(
            "read_file",
            "Read a file from the workspace. Reading a file is required before overwriting it.",
        )
        .required("path", json!({"type": "string", "description": "Path relative to the workspace"}))
        .optional("start_line", json!({"type": "integer", "description": "First line to return (1-based)"}))
        .optional("end_line", json!({"type": "integer", "description": "Last line to return (inclusive)"}))
        .build()
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolOutcome, ToolError> {
        let raw_path = args
            .get("path")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::invalid("missing required parameter: path"))?;
        let path = ctx.workspace.confine(raw_path)?;

        let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
            ToolError::internal(format!("cannot read {}: {e}", path.display()))
        })?;

        let text = match (
            args.get("start_line").and_then(Value::as_u64),
            args.get("end_line").and_then(Value::as_u64),
        ) {
            (None, None) => content,
            (start, end) => {
                let start = start.unwrap_or(1).max(1) as usize;
                let lines: Vec<&str> = content.lines().collect();
                let end = end.map_or(lines.len(), |e| (e as usize).min(lines.len()));
                if start > lines.len() || start > end {
                    return Err(ToolError::invalid(format!(
                        "line range {start}..{end} is outside the file ({} lines)",
                        lines.len()
                    )));
                }
                lines[start - 1..end].join("\n")
            }
        };

        // Only successful reads unlock overwrites.
        ctx.read_set.insert(path);

        Ok(ToolOutcome::observation(clip_observation(
            &text,
            ctx.max_observation_chars,
        )))
    }
}
