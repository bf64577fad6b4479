//! Shell tools: foreground execution, background jobs, job control.

pub mod jobs;
pub mod runner;
pub mod tools;

pub use jobs::{JobStatus, JobTable};
pub use tools::{RunShellTool, ShellCancelTool, ShellOutputTool, ShellStatusTool};
