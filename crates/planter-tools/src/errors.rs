//! Tool layer error taxonomy.
//!
//! Every variant carries a stable `kind()` string that prefixes the error
//! observation handed back to the model. Tool errors are never fatal to a
//! solve: the dispatcher turns them into `is_error` tool results.

use thiserror::Error;

/// Errors raised by tool implementations and the policy layer.
#[derive(Debug, Error)]
pub enum ToolError {
    /// A path argument resolves outside the workspace root.
    #[error("path escapes the workspace: {path}")]
    PathEscape {
        /// The offending path as given.
        path: String,
    },

    /// Overwrite attempted on a file never read in this solve.
    #[error("refusing to overwrite unread file: {path} (read it first)")]
    UnreadOverwrite {
        /// The target path.
        path: String,
    },

    /// Two sibling sub-agents wrote the same path in one parent step.
    #[error("write conflict: {path} was already written by a sibling agent")]
    WriteConflict {
        /// The contested path.
        path: String,
    },

    /// The shell command violates policy (heredoc, banned program).
    #[error("{message}")]
    ShellPolicy {
        /// What was rejected and why.
        message: String,
    },

    /// The same shell command was repeated too often at this depth.
    #[error("command repeated too many times: {command}")]
    RepetitionLimit {
        /// The repeated command.
        command: String,
    },

    /// Spawning would exceed the recursion bound.
    #[error("sub-agent recursion limit reached (max depth {limit})")]
    MaxDepth {
        /// The configured bound.
        limit: u32,
    },

    /// The tool exceeded its per-call timeout.
    #[error("tool timed out after {seconds}s")]
    Timeout {
        /// The timeout that expired.
        seconds: u64,
    },

    /// Missing or ill-typed tool arguments.
    #[error("{message}")]
    InvalidArgument {
        /// What is wrong with the arguments.
        message: String,
    },

    /// Everything else (I/O failures, subprocess trouble, HTTP errors).
    #[error("{message}")]
    Internal {
        /// Failure description.
        message: String,
    },
}

impl ToolError {
    /// Stable kind string for observations and events.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PathEscape { .. } => "path_escape",
            Self::UnreadOverwrite { .. } => "unread_overwrite",
            Self::WriteConflict { .. } => "write_conflict",
            Self::ShellPolicy { .. } => "shell_policy",
            Self::RepetitionLimit { .. } => "repetition_limit",
            Self::MaxDepth { .. } => "max_depth",
            Self::Timeout { .. } => "timeout",
            Self::InvalidArgument { .. } => "tool_argument",
            Self::Internal { .. } => "internal",
        }
    }

    /// The error as an observation string: `kind: message`.
    #[must_use]
    pub fn observation(&self) -> String {
        format!("{}: {self}", self.kind())
    }

    /// Shorthand for an invalid-argument error.
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Shorthand for an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for ToolError {
    fn from(e: std::io::Error) -> Self {
        Self::Internal {
            message: format!("I/O error: {e}"),
        }
    }
}
