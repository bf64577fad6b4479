//! The `run_shell`, `shell_status`, `shell_cancel`, and `shell_output`
//! catalog tools.
//!
//! Policy screening (heredocs, banned programs, repetition) happens in the
//! engine before dispatch reaches these tools.

use async_trait::async_trait;
use serde_json::{Value, json};

use planter_core::schema::ToolSchema;
use planter_core::text::clip_observation;

use super::runner::{ProcessOptions, run_command};
use crate::errors::ToolError;
use crate::traits::{PlanterTool, ToolContext, ToolOutcome};
use crate::utils::schema::SchemaBuilder;

fn required_str<'a>(args: &'a Value, key: &str) -> Result<&'a str, ToolError> {
    args.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ToolError::invalid(format!("missing required parameter: {key}")))
}

/// Execute a shell command in the workspace.
pub struct RunShellTool;

#[async_trait]
impl PlanterTool for RunShellTool {
    fn name(&self) -> &str {
        "run_shell"
    }

    fn definition(&self) -> ToolSchema {
        SchemaBuilder::new(
            "run_shell",
            "Execute a shell command in the workspace directory. Set background=true for \
             long-running commands; you get a job_id to poll with shell_status/shell_output.",
        )
        .required("command", json!({"type": "string", "description": "The command to run"}))
        .optional("timeout", json!({"type": "integer", "description": "Timeout in seconds"}))
        .optional("background", json!({"type": "boolean", "description": "Run as a background job"}))
        .build()
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolOutcome, ToolError> {
        let command = required_str(&args, "command")?;
        let background = args.get("background").and_then(Value::as_bool).unwrap_or(false);
        let working_directory = ctx.workspace.root().display().to_string();

        if background {
            let id = ctx.jobs.spawn(command, &working_directory, &ctx.shell_env)?;
            return Ok(ToolOutcome::observation(format!(
                "started background job {id}"
            )));
        }

        let timeout_secs = args
            .get("timeout")
            .and_then(Value::as_u64)
            .unwrap_or(ctx.timeout.as_secs());
        let output = run_command(
            command,
            &ProcessOptions {
                working_directory,
                timeout_ms: timeout_secs.saturating_mul(1000),
                cancellation: ctx.cancellation.clone(),
                env: ctx.shell_env.clone(),
            },
        )
        .await?;

        if output.timed_out {
            return Err(ToolError::Timeout {
                seconds: timeout_secs,
            });
        }
        if output.interrupted {
            return Err(ToolError::internal("command cancelled"));
        }

        let mut observation = String::new();
        if !output.stdout.is_empty() {
            observation.push_str(&output.stdout);
        }
        if !output.stderr.is_empty() {
            if !observation.is_empty() {
                observation.push('\n');
            }
            observation.push_str("stderr:\n");
            observation.push_str(&output.stderr);
        }
        if observation.is_empty() {
            observation.push_str("(no output)");
        }
        observation.push_str(&format!("\nexit code: {}", output.exit_code));

        Ok(ToolOutcome::observation(clip_observation(
            &observation,
            ctx.max_observation_chars,
        )))
    }
}

/// Report a background job's status.
pub struct ShellStatusTool;

#[async_trait]
impl PlanterTool for ShellStatusTool {
    fn name(&self) -> &str {
        "shell_status"
    }

    fn definition(&self) -> ToolSchema {
        SchemaBuilder::new("shell_status", "Check the status of a background shell job.")
            .required("job_id", json!({"type": "string", "description": "The job to check"}))
            .build()
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolOutcome, ToolError> {
        let job_id = required_str(&args, "job_id")?;
        let status = ctx.jobs.status(job_id)?;
        let command = ctx.jobs.command(job_id)?;
        Ok(ToolOutcome::observation(format!(
            "job {job_id} ({command}): {}",
            status.describe()
        )))
    }
}

/// Cancel a background job.
pub struct ShellCancelTool;

#[async_trait]
impl PlanterTool for ShellCancelTool {
    fn name(&self) -> &str {
        "shell_cancel"
    }

    fn definition(&self) -> ToolSchema {
        SchemaBuilder::new(
            "shell_cancel",
            "Cancel a background shell job (SIGTERM, then hard kill).",
        )
        .required("job_id", json!({"type": "string", "description": "The job to cancel"}))
        .build()
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolOutcome, ToolError> {
        let job_id = required_str(&args, "job_id")?;
        ctx.jobs.cancel(job_id)?;
        Ok(ToolOutcome::observation(format!(
            "cancellation requested for job {job_id}"
        )))
    }
}

/// Fetch a background job's accumulated output.
pub struct ShellOutputTool;

#[async_trait]
impl PlanterTool for ShellOutputTool {
    fn name(&self) -> &str {
        "shell_output"
    }

    fn definition(&self) -> ToolSchema {
        SchemaBuilder::new(
            "shell_output",
            "Fetch the accumulated output of a background shell job.",
        )
        .required("job_id", json!({"type": "string", "description": "The job to read"}))
        .build()
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolOutcome, ToolError> {
        let job_id = required_str(&args, "job_id")?;
        let (output, overflowed) = ctx.jobs.output(job_id)?;
        let status = ctx.jobs.status(job_id)?;
        let mut observation = if output.is_empty() {
            "(no output yet)".to_owned()
        } else {
            output
        };
        if overflowed {
            observation.push_str("\n[job buffer overflowed, oldest output kept]");
        }
        observation.push_str(&format!("\njob status: {}", status.describe()));
        Ok(ToolOutcome::observation(clip_observation(
            &observation,
            ctx.max_observation_chars,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::jobs::JobStatus;
    use crate::testutil::test_context;

    #[tokio::test]
    async fn foreground_command_reports_output_and_exit() {
        let (ctx, _dir) = test_context();
        let outcome = RunShellTool
            .execute(json!({"command": "echo hi; exit 2"}), &ctx)
            .await
            .unwrap();
        assert!(outcome.observation.contains("hi"));
        assert!(outcome.observation.contains("exit code: 2"));
        assert!(!outcome.is_final);
    }

    #[tokio::test]
    async fn foreground_timeout_maps_to_timeout_error() {
        let (ctx, _dir) = test_context();
        let err = RunShellTool
            .execute(json!({"command": "sleep 30", "timeout": 1}), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Timeout { seconds: 1 }));
    }

    #[tokio::test]
    async fn missing_command_is_invalid() {
        let (ctx, _dir) = test_context();
        let err = RunShellTool.execute(json!({}), &ctx).await.unwrap_err();
        assert_eq!(err.kind(), "tool_argument");
    }

    #[tokio::test]
    async fn background_job_lifecycle_via_tools() {
        let (ctx, _dir) = test_context();
        let outcome = RunShellTool
            .execute(json!({"command": "echo bg_done", "background": true}), &ctx)
            .await
            .unwrap();
        let job_id = outcome
            .observation
            .rsplit(' ')
            .next()
            .unwrap()
            .to_owned();

        // Wait for exit.
        for _ in 0..100 {
            if matches!(ctx.jobs.status(&job_id), Ok(JobStatus::Exited(0))) {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }

        let status = ShellStatusTool
            .execute(json!({"job_id": job_id}), &ctx)
            .await
            .unwrap();
        assert!(status.observation.contains("exited with code 0"));

        let output = ShellOutputTool
            .execute(json!({"job_id": job_id}), &ctx)
            .await
            .unwrap();
        assert!(output.observation.contains("bg_done"));
    }

    #[tokio::test]
    async fn cancel_tool_requests_cancellation() {
        let (ctx, _dir) = test_context();
        let outcome = RunShellTool
            .execute(json!({"command": "sleep 60", "background": true}), &ctx)
            .await
            .unwrap();
        let job_id = outcome.observation.rsplit(' ').next().unwrap().to_owned();

        let cancelled = ShellCancelTool
            .execute(json!({"job_id": job_id}), &ctx)
            .await
            .unwrap();
        assert!(cancelled.observation.contains("cancellation requested"));

        for _ in 0..100 {
            if matches!(ctx.jobs.status(&job_id), Ok(JobStatus::Cancelled)) {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        panic!("job was not cancelled");
    }
}
