//! `write_file`: creates or overwrites files under the two safety
//! invariants: read-before-overwrite and sibling write-conflict detection.

use async_trait::async_trait;
use serde_json::{Value, json};

use planter_core::schema::ToolSchema;

use crate::errors::ToolError;
use crate::traits::{PlanterTool, ToolContext, ToolOutcome};
use crate::utils::schema::SchemaBuilder;

/// Create or overwrite a file.
pub struct WriteFileTool;

#[async_trait]
impl PlanterTool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn definition(&self) -> ToolSchema {
        SchemaBuilder::new(
            "write_file",
            "Write content to a file. Creates parent directories. Overwriting an existing \
             file requires reading it first.",
        )
        .required("path", json!({"type": "string", "description": "Path relative to the workspace"}))
        .required("content", json!({"type": "string", "description": "The full file content"}))
        .build()
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolOutcome, ToolError> {
        let raw_path = args
            .get("path")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::invalid("missing required parameter: path"))?;
        let content = match args.get("content") {
            Some(Value::String(s)) => s.as_str(),
            Some(Value::Null) | None => {
                return Err(ToolError::invalid("missing required parameter: content"));
            }
            Some(_) => return Err(ToolError::invalid("content must be a string")),
        };

        let path = ctx.workspace.confine(raw_path)?;
        // Claim first: when siblings race on one path, the loser must see
        // write_conflict even if the winner's write already landed on disk.
        ctx.write_guard.claim(&path, &ctx.claimant)?;
        let existed = path.exists();
        if existed && !ctx.read_set.contains(&path) {
            return Err(ToolError::UnreadOverwrite {
                path: raw_path.to_owned(),
            });
        }

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                ToolError::internal(format!("cannot create {}: {e}", parent.display()))
            })?;
        }
        tokio::fs::write(&path, content.as_bytes())
            .await
            .map_err(|e| ToolError::internal(format!("cannot write {}: {e}", path.display())))?;

        Ok(ToolOutcome::observation(format!(
            "wrote {} bytes to {} ({})",
            content.len(),
            raw_path,
            if existed { "overwritten" } else { "created" }
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::read::ReadFileTool;
    use crate::testutil::{test_context, write_fixture};

    #[tokio::test]
    async fn creates_new_file_with_parents() {
        let (ctx, dir) = test_context();
        let outcome = WriteFileTool
            .execute(json!({"path": "a/b/new.txt", "content": "data"}), &ctx)
            .await
            .unwrap();
        assert!(outcome.observation.contains("created"));
        assert_eq!(
            std::fs::read_to_string(dir.path().join("a/b/new.txt")).unwrap(),
            "data"
        );
    }

    #[tokio::test]
    async fn unread_overwrite_blocked() {
        let (ctx, dir) = test_context();
        write_fixture(dir.path(), "data.csv", "old");
        let err = WriteFileTool
            .execute(json!({"path": "data.csv", "content": "new"}), &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "unread_overwrite");
        // Original content untouched.
        assert_eq!(
            std::fs::read_to_string(dir.path().join("data.csv")).unwrap(),
            "old"
        );
    }

    #[tokio::test]
    async fn overwrite_allowed_after_read() {
        let (ctx, dir) = test_context();
        write_fixture(dir.path(), "data.csv", "old");
        let _ = ReadFileTool
            .execute(json!({"path": "data.csv"}), &ctx)
            .await
            .unwrap();
        let outcome = WriteFileTool
            .execute(json!({"path": "data.csv", "content": "new"}), &ctx)
            .await
            .unwrap();
        assert!(outcome.observation.contains("overwritten"));
        assert_eq!(
            std::fs::read_to_string(dir.path().join("data.csv")).unwrap(),
            "new"
        );
    }

    #[tokio::test]
    async fn racing_siblings_conflict() {
        let (ctx, dir) = test_context();
        let mut sibling = ctx.clone();
        sibling.claimant = "other-child".into();

        // Both writers target the same never-read path concurrently; the
        // guard must hand exactly one of them write_conflict regardless of
        // which write lands on disk first.
        let (a, b) = tokio::join!(
            WriteFileTool.execute(json!({"path": "out.txt", "content": "mine"}), &ctx),
            WriteFileTool.execute(json!({"path": "out.txt", "content": "theirs"}), &sibling),
        );
        let (winner, loser) = match (a, b) {
            (Ok(ok), Err(err)) | (Err(err), Ok(ok)) => (ok, err),
            other => panic!("expected one winner and one conflict, got {other:?}"),
        };
        assert!(winner.observation.contains("out.txt"));
        assert_eq!(loser.kind(), "write_conflict");

        let content = std::fs::read_to_string(dir.path().join("out.txt")).unwrap();
        assert!(content == "mine" || content == "theirs");
    }

    #[tokio::test]
    async fn late_sibling_conflicts_even_after_write_landed() {
        let (ctx, _dir) = test_context();
        let mut sibling = ctx.clone();
        sibling.claimant = "other-child".into();

        let _ = WriteFileTool
            .execute(json!({"path": "out.txt", "content": "mine"}), &ctx)
            .await
            .unwrap();
        // The file now exists on disk; the sibling still reports the race
        // as a conflict, not as an unread overwrite.
        let err = WriteFileTool
            .execute(json!({"path": "out.txt", "content": "theirs"}), &sibling)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "write_conflict");
    }

    #[tokio::test]
    async fn same_solve_can_rewrite_created_file() {
        let (ctx, _dir) = test_context();
        let _ = WriteFileTool
            .execute(json!({"path": "out.txt", "content": "v1"}), &ctx)
            .await
            .unwrap();
        // The file now exists on disk; rewriting still requires a read first.
        let err = WriteFileTool
            .execute(json!({"path": "out.txt", "content": "v2"}), &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "unread_overwrite");
    }

    #[tokio::test]
    async fn missing_content_rejected() {
        let (ctx, _dir) = test_context();
        let err = WriteFileTool
            .execute(json!({"path": "x.txt"}), &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "tool_argument");
    }

    #[tokio::test]
    async fn escape_rejected() {
        let (ctx, _dir) = test_context();
        let err = WriteFileTool
            .execute(json!({"path": "../escape.txt", "content": "x"}), &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "path_escape");
    }
}
