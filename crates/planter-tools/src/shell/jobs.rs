//! Background shell job table.
//!
//! `run_shell` with background mode registers a job here and returns its ID
//! immediately. Output accumulates in a bounded buffer; cancellation is
//! cooperative (SIGTERM) with a hard-kill fallback after a grace period.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use planter_core::ids::JobId;

use crate::errors::ToolError;

/// Cap on a job's accumulated output.
const MAX_JOB_BUFFER_BYTES: usize = 1024 * 1024;

/// Grace period between SIGTERM and SIGKILL.
const KILL_GRACE_MS: u64 = 2_000;

/// Lifecycle state of a background job.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JobStatus {
    /// Still running.
    Running,
    /// Exited on its own with this code.
    Exited(i32),
    /// Cancelled (SIGTERM or the hard-kill fallback).
    Cancelled,
    /// Could not be spawned or waited on.
    Failed(String),
}

impl JobStatus {
    /// Human form used in observations.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Running => "running".into(),
            Self::Exited(code) => format!("exited with code {code}"),
            Self::Cancelled => "cancelled".into(),
            Self::Failed(message) => format!("failed: {message}"),
        }
    }
}

/// Bounded output buffer shared with the reader tasks.
#[derive(Debug, Default)]
struct JobBuffer {
    data: String,
    truncated: bool,
}

impl JobBuffer {
    fn append(&mut self, line: &str) {
        if self.data.len() >= MAX_JOB_BUFFER_BYTES {
            self.truncated = true;
            return;
        }
        self.data.push_str(line);
        self.data.push('\n');
    }
}

struct JobEntry {
    command: String,
    status: Mutex<JobStatus>,
    buffer: Arc<Mutex<JobBuffer>>,
    cancel: CancellationToken,
}

/// Registry of background jobs. One per engine; jobs outlive the step that
/// launched them.
#[derive(Default)]
pub struct JobTable {
    jobs: Mutex<HashMap<String, Arc<JobEntry>>>,
}

impl JobTable {
    /// Empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a background job. Returns its ID immediately.
    pub fn spawn(
        &self,
        command: &str,
        working_directory: &str,
        env: &BTreeMap<String, String>,
    ) -> Result<JobId, ToolError> {
        let mut cmd = tokio::process::Command::new("bash");
        let _ = cmd
            .arg("-c")
            .arg(command)
            .current_dir(working_directory)
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped());
        for (key, value) in env {
            let _ = cmd.env(key, value);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| ToolError::internal(format!("failed to spawn background job: {e}")))?;

        let id = JobId::generate();
        let entry = Arc::new(JobEntry {
            command: command.to_owned(),
            status: Mutex::new(JobStatus::Running),
            buffer: Arc::new(Mutex::new(JobBuffer::default())),
            cancel: CancellationToken::new(),
        });
        let _ = self.jobs.lock().insert(id.as_str().to_owned(), Arc::clone(&entry));

        if let Some(pipe) = child.stdout.take() {
            let buffer = Arc::clone(&entry.buffer);
            let _handle = tokio::spawn(async move {
                let mut lines = BufReader::new(pipe).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    buffer.lock().append(&line);
                }
            });
        }
        if let Some(pipe) = child.stderr.take() {
            let buffer = Arc::clone(&entry.buffer);
            let _handle = tokio::spawn(async move {
                let mut lines = BufReader::new(pipe).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    buffer.lock().append(&line);
                }
            });
        }

        let pid = child.id();
        let watcher = Arc::clone(&entry);
        let job_id = id.clone();
        let _handle = tokio::spawn(async move {
            tokio::select! {
                status = child.wait() => {
                    let new_status = match status {
                        Ok(s) => JobStatus::Exited(s.code().unwrap_or(-1)),
                        Err(e) => JobStatus::Failed(e.to_string()),
                    };
                    debug!(job = %job_id, status = %new_status.describe(), "background job finished");
                    *watcher.status.lock() = new_status;
                }
                () = watcher.cancel.cancelled() => {
                    // Cooperative first: SIGTERM, then hard kill after the grace period.
                    if let Some(pid) = pid {
                        let _ = tokio::process::Command::new("kill")
                            .args(["-TERM", &pid.to_string()])
                            .status()
                            .await;
                    }
                    let graceful = tokio::time::timeout(
                        std::time::Duration::from_millis(KILL_GRACE_MS),
                        child.wait(),
                    )
                    .await;
                    if graceful.is_err() {
                        warn!(job = %job_id, "job ignored SIGTERM, hard killing");
                        let _ = child.kill().await;
                    }
                    *watcher.status.lock() = JobStatus::Cancelled;
                }
            }
        });

        Ok(id)
    }

    fn entry(&self, job_id: &str) -> Result<Arc<JobEntry>, ToolError> {
        self.jobs
            .lock()
            .get(job_id)
            .cloned()
            .ok_or_else(|| ToolError::invalid(format!("unknown job id: {job_id}")))
    }

    /// Current status of a job.
    pub fn status(&self, job_id: &str) -> Result<JobStatus, ToolError> {
        Ok(self.entry(job_id)?.status.lock().clone())
    }

    /// The command a job is running.
    pub fn command(&self, job_id: &str) -> Result<String, ToolError> {
        Ok(self.entry(job_id)?.command.clone())
    }

    /// Accumulated output. The flag reports whether the buffer overflowed.
    pub fn output(&self, job_id: &str) -> Result<(String, bool), ToolError> {
        let entry = self.entry(job_id)?;
        let buffer = entry.buffer.lock();
        Ok((buffer.data.clone(), buffer.truncated))
    }

    /// Request cancellation. Returns immediately; the watcher task performs
    /// SIGTERM-then-kill.
    pub fn cancel(&self, job_id: &str) -> Result<(), ToolError> {
        self.entry(job_id)?.cancel.cancel();
        Ok(())
    }

    /// Number of registered jobs (any status).
    #[must_use]
    pub fn len(&self) -> usize {
        self.jobs.lock().len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.jobs.lock().is_empty()
    }
}
