//! Session layer errors.

use thiserror::Error;

/// Errors from session persistence.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Filesystem trouble.
    #[error("session I/O error: {message}")]
    Io {
        /// Failure description.
        message: String,
    },

    /// No session with the given ID.
    #[error("no such session: {id}")]
    NotFound {
        /// The requested ID.
        id: String,
    },

    /// A persisted file could not be parsed.
    #[error("corrupt session data: {message}")]
    Corrupt {
        /// What failed to parse.
        message: String,
    },
}

impl From<std::io::Error> for SessionError {
    fn from(e: std::io::Error) -> Self {
        Self::Io {
            message: e.to_string(),
        }
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(e: serde_json::Error) -> Self {
        Self::Corrupt {
            message: e.to_string(),
        }
    }
}
