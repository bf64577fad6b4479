//! `list_dir`: depth-limited tree listing.

use async_trait::async_trait;
use serde_json::{Value, json};
use walkdir::WalkDir;

use planter_core::schema::ToolSchema;
use planter_core::text::clip_observation;

use crate::errors::ToolError;
use crate::traits::{PlanterTool, ToolContext, ToolOutcome};
use crate::utils::schema::SchemaBuilder;

/// Entry cap before the listing is elided.
const MAX_ENTRIES: usize = 500;

/// List a directory as an indented tree.
pub struct ListDirTool;

#[async_trait]
impl PlanterTool for ListDirTool {
    fn name(&self) -> &str {
        "list_dir"
    }

    fn definition(&self) -> ToolSchema {
        SchemaBuilder::new("list_dir", "List a directory tree inside the workspace.")
            .required("path", json!({"type": "string", "description": "Directory to list"}))
            .optional("depth", json!({"type": "integer", "description": "Max depth (default 2)"}))
            .build()
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolOutcome, ToolError> {
        let raw_path = args
            .get("path")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::invalid("missing required parameter: path"))?;
        let depth = args.get("depth").and_then(Value::as_u64).unwrap_or(2) as usize;
        let root = ctx.workspace.confine(raw_path)?;
        if !root.is_dir() {
            return Err(ToolError::invalid(format!("{raw_path} is not a directory")));
        }

        let mut out = String::new();
        let mut shown = 0usize;
        let mut elided = 0usize;
        for entry in WalkDir::new(&root)
            .min_depth(1)
            .max_depth(depth.max(1))
            .sort_by(|a, b| {
                // Directories first, then names.
                b.file_type()
                    .is_dir()
                    .cmp(&a.file_type().is_dir())
                    .then_with(|| a.file_name().cmp(b.file_name()))
            })
            .into_iter()
            .filter_entry(|e| e.file_name() != ".git")
            .filter_map(Result::ok)
        {
            if shown >= MAX_ENTRIES {
                elided += 1;
                continue;
            }
            let indent = "  ".repeat(entry.depth().saturating_sub(1));
            let name = entry.file_name().to_string_lossy();
            let marker = if entry.file_type().is_dir() { "/" } else { "" };
            out.push_str(&format!("{indent}{name}{marker}\n"));
            shown += 1;
        }
        if elided > 0 {
            out.push_str(&format!("... ({elided} more entries)\n"));
        }
        if out.is_empty() {
            out.push_str("(empty directory)\n");
        }

        Ok(ToolOutcome::observation(clip_observation(
            &out,
            ctx.max_observation_chars,
        )))
    }
}
