//! Foreground subprocess execution via `tokio::process::Command`.
//!
//! Output captured before a timeout or cancellation is kept: the command is
//! killed and reaped, the pipes close, and whatever the drain task already
//! read comes back in the result. A truncated observation beats an empty
//! one when a long-running command gets cut off.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::errors::ToolError;

/// How long to wait for the pipe drain after the child is gone.
const DRAIN_GRACE_MS: u64 = 250;

/// Options for one foreground command.
#[derive(Clone, Debug)]
pub struct ProcessOptions {
    /// Working directory.
    pub working_directory: String,
    /// Timeout in milliseconds.
    pub timeout_ms: u64,
    /// Cooperative cancellation.
    pub cancellation: CancellationToken,
    /// Extra environment variables.
    pub env: BTreeMap<String, String>,
}

/// Captured output of a finished command.
#[derive(Clone, Debug)]
pub struct ProcessOutput {
    /// Captured stdout (possibly partial on timeout/cancel).
    pub stdout: String,
    /// Captured stderr (possibly partial on timeout/cancel).
    pub stderr: String,
    /// Exit code (-1 when killed).
    pub exit_code: i32,
    /// Wall-clock duration.
    pub duration_ms: u64,
    /// Whether the timeout fired.
    pub timed_out: bool,
    /// Whether cancellation fired.
    pub interrupted: bool,
}

/// How the child's lifetime ended.
#[derive(Clone, Copy)]
enum Ending {
    Finished(i32),
    TimedOut,
    Interrupted,
}

/// Run `command` under `bash -c`, capturing output with timeout and
/// cancellation. The child is always reaped; nothing is left orphaned.
pub async fn run_command(
    command: &str,
    opts: &ProcessOptions,
) -> Result<ProcessOutput, ToolError> {
    let start = Instant::now();

    let mut cmd = tokio::process::Command::new("bash");
    let _ = cmd
        .arg("-c")
        .arg(command)
        .current_dir(&opts.working_directory)
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped());
    for (key, value) in &opts.env {
        let _ = cmd.env(key, value);
    }

    debug!(command, working_dir = %opts.working_directory, "spawning process");

    let mut child = cmd
        .spawn()
        .map_err(|e| ToolError::internal(format!("failed to spawn process: {e}")))?;

    // One task owns both pipes and returns whatever it managed to read,
    // even when the child is killed mid-stream.
    let stdout_pipe = child.stdout.take();
    let stderr_pipe = child.stderr.take();
    let mut drain = tokio::spawn(async move {
        let read_stdout = async {
            let mut buf = Vec::new();
            if let Some(mut pipe) = stdout_pipe {
                let _ = pipe.read_to_end(&mut buf).await;
            }
            buf
        };
        let read_stderr = async {
            let mut buf = Vec::new();
            if let Some(mut pipe) = stderr_pipe {
                let _ = pipe.read_to_end(&mut buf).await;
            }
            buf
        };
        tokio::join!(read_stdout, read_stderr)
    });

    let ending = tokio::select! {
        status = child.wait() => {
            let status = status
                .map_err(|e| ToolError::internal(format!("process wait failed: {e}")))?;
            Ending::Finished(status.code().unwrap_or(-1))
        }
        () = tokio::time::sleep(Duration::from_millis(opts.timeout_ms)) => Ending::TimedOut,
        () = opts.cancellation.cancelled() => Ending::Interrupted,
    };

    if !matches!(ending, Ending::Finished(_)) {
        // Kill and reap so the pipes close and the drain task can finish.
        let _ = child.start_kill();
        let _ = child.wait().await;
    }

    // The drain normally completes the moment the pipes close. A child that
    // handed its pipes to a surviving grandchild would stall it, so give up
    // after a short grace and keep nothing rather than hang the step.
    let (stdout_bytes, stderr_bytes) =
        match tokio::time::timeout(Duration::from_millis(DRAIN_GRACE_MS), &mut drain).await {
            Ok(Ok(buffers)) => buffers,
            Ok(Err(_)) | Err(_) => {
                drain.abort();
                (Vec::new(), Vec::new())
            }
        };

    let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
    let output = ProcessOutput {
        stdout: String::from_utf8_lossy(&stdout_bytes).into_owned(),
        stderr: String::from_utf8_lossy(&stderr_bytes).into_owned(),
        exit_code: match ending {
            Ending::Finished(code) => code,
            _ => -1,
        },
        duration_ms,
        timed_out: matches!(ending, Ending::TimedOut),
        interrupted: matches!(ending, Ending::Interrupted),
    };

    match &ending {
        Ending::Finished(code) => debug!(command, code, duration_ms, "process completed"),
        Ending::TimedOut => warn!(command, timeout_ms = opts.timeout_ms, "process timed out"),
        Ending::Interrupted => debug!(command, "process cancelled"),
    }
    Ok(output)
}
