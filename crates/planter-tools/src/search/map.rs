//! `repo_map`: heuristic symbol extraction.
//!
//! Pulls declaration-shaped lines out of source files with per-language
//! regexes. Heuristic by design: good enough to orient the model, no parse
//! trees involved.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde_json::{Value, json};
use walkdir::WalkDir;

use planter_core::schema::ToolSchema;
use planter_core::text::clip_observation;

use crate::errors::ToolError;
use crate::traits::{PlanterTool, ToolContext, ToolOutcome};
use crate::utils::schema::SchemaBuilder;

/// File cap before the map is elided.
const MAX_FILES: usize = 200;

static RUST_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:async\s+)?(?:fn|struct|enum|trait|impl|mod|const|static|type)\s+\w").expect("static regex")
});
static PYTHON_DECL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:def|class)\s+\w").expect("static regex"));
static JS_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:export\s+)?(?:default\s+)?(?:async\s+)?(?:function|class|interface|type|const|enum)\s+\w")
        .expect("static regex")
});
static GO_DECL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:func|type|var|const)\s+\w").expect("static regex"));

fn decl_regex(extension: &str) -> Option<&'static Regex> {
    match extension {
        "rs" => Some(&RUST_DECL),
        "py" => Some(&PYTHON_DECL),
        "js" | "jsx" | "ts" | "tsx" | "mjs" => Some(&JS_DECL),
        "go" => Some(&GO_DECL),
        _ => None,
    }
}

/// Build a declaration map of a source tree.
pub struct RepoMapTool;

#[async_trait]
impl PlanterTool for RepoMapTool {
    fn name(&self) -> &str {
        "repo_map"
    }

    fn definition(&self) -> ToolSchema {
        SchemaBuilder::new(
            "repo_map",
            "Summarize a source tree as a map of files and their top-level declarations. \
             Heuristic line matching, not a parser.",
        )
        .optional("root", json!({"type": "string", "description": "Tree root (default: workspace root)"}))
        .build()
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolOutcome, ToolError> {
        let scope = args.get("root").and_then(Value::as_str).unwrap_or(".");
        let root = ctx.workspace.confine(scope)?;

        let mut out = String::new();
        let mut files = 0usize;
        for entry in WalkDir::new(&root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.file_name() != ".git" && e.file_name() != "target")
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
        {
            let extension = entry
                .path()
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or_default();
            let Some(regex) = decl_regex(extension) else {
                continue;
            };
            let Ok(content) = std::fs::read_to_string(entry.path()) else {
                continue;
            };
            let declarations: Vec<(usize, &str)> = content
                .lines()
                .enumerate()
                .filter(|(_, line)| regex.is_match(line))
                .map(|(i, line)| (i + 1, line.trim()))
                .collect();
            if declarations.is_empty() {
                continue;
            }
            if files >= MAX_FILES {
                out.push_str("... (more files elided)\n");
                break;
            }
            files += 1;
            let rel = entry
                .path()
                .strip_prefix(ctx.workspace.root())
                .unwrap_or(entry.path())
                .display();
            out.push_str(&format!("{rel}\n"));
            for (line_no, decl) in declarations {
                out.push_str(&format!("  {line_no}: {decl}\n"));
            }
        }

        if out.is_empty() {
            out.push_str("no recognized source files under the given root\n");
        }
        Ok(ToolOutcome::observation(clip_observation(
            &out,
            ctx.max_observation_chars,
        )))
    }
}
