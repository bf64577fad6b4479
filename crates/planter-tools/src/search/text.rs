//! `search`: regex content search ranked by path then line.

use async_trait::async_trait;
use globset::{Glob, GlobMatcher};
use serde_json::{Value, json};
use walkdir::WalkDir;

use planter_core::schema::ToolSchema;
use planter_core::text::clip_observation;

use crate::errors::ToolError;
use crate::traits::{PlanterTool, ToolContext, ToolOutcome};
use crate::utils::schema::SchemaBuilder;

/// Result cap.
const MAX_RESULTS: usize = 100;

/// Bytes sniffed for binary detection.
const SNIFF_BYTES: usize = 1024;

fn looks_binary(bytes: &[u8]) -> bool {
    bytes.iter().take(SNIFF_BYTES).any(|&b| b == 0)
}

/// Regex search over workspace files.
pub struct SearchTool;

#[async_trait]
impl PlanterTool for SearchTool {
    fn name(&self) -> &str {
        "search"
    }

    fn definition(&self) -> ToolSchema {
        SchemaBuilder::new(
            "search",
            "Search file contents with a regular expression. Results are ranked by path, \
             then line number.",
        )
        .required("pattern", json!({"type": "string", "description": "Regular expression"}))
        .optional("path", json!({"type": "string", "description": "Scope directory (default: workspace root)"}))
        .optional("filetype", json!({"type": "string", "description": "Extension filter, e.g. 'rs' or 'csv'"}))
        .optional("max_results", json!({"type": "integer", "description": "Result cap (default 100)"}))
        .build()
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolOutcome, ToolError> {
        let pattern = args
            .get("pattern")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::invalid("missing required parameter: pattern"))?;
        let regex = regex::Regex::new(pattern)
            .map_err(|e| ToolError::invalid(format!("invalid regex: {e}")))?;
        let scope = args.get("path").and_then(Value::as_str).unwrap_or(".");
        let root = ctx.workspace.confine(scope)?;
        let cap = args
            .get("max_results")
            .and_then(Value::as_u64)
            .map_or(MAX_RESULTS, |n| (n as usize).clamp(1, MAX_RESULTS));

        let matcher: Option<GlobMatcher> = match args.get("filetype").and_then(Value::as_str) {
            Some(ft) => Some(
                Glob::new(&format!("*.{}", ft.trim_start_matches('.')))
                    .map_err(|e| ToolError::invalid(format!("invalid filetype: {e}")))?
                    .compile_matcher(),
            ),
            None => None,
        };

        let mut hits: Vec<(String, usize, String)> = Vec::new();
        for entry in WalkDir::new(&root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.file_name() != ".git" && e.file_name() != "target")
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
        {
            if let Some(matcher) = &matcher {
                if !matcher.is_match(entry.file_name()) {
                    continue;
                }
            }
            let Ok(bytes) = std::fs::read(entry.path()) else {
                continue;
            };
            if looks_binary(&bytes) {
                continue;
            }
            let content = String::from_utf8_lossy(&bytes);
            let rel = entry
                .path()
                .strip_prefix(ctx.workspace.root())
                .unwrap_or(entry.path())
                .display()
                .to_string();
            for (line_no, line) in content.lines().enumerate() {
                if regex.is_match(line) {
                    hits.push((rel.clone(), line_no + 1, line.trim_end().to_owned()));
                }
            }
        }

        hits.sort();
        let total = hits.len();
        hits.truncate(cap);

        if hits.is_empty() {
            return Ok(ToolOutcome::observation(format!(
                "no matches for /{pattern}/"
            )));
        }
        let mut out = String::new();
        for (path, line_no, line) in &hits {
            out.push_str(&format!("{path}:{line_no}: {line}\n"));
        }
        if total > cap {
            out.push_str(&format!("... ({} more matches)\n", total - cap));
        }
        Ok(ToolOutcome::observation(clip_observation(
            &out,
            ctx.max_observation_chars,
        )))
    }
}
