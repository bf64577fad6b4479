//! Settings errors.

use thiserror::Error;

/// Errors from loading settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file exists but cannot be read.
    #[error("cannot read settings file: {message}")]
    Io {
        /// Failure description.
        message: String,
    },

    /// The settings file is not valid JSON or maps onto no known field.
    #[error("invalid settings: {message}")]
    Invalid {
        /// Parse failure description.
        message: String,
    },
}

impl From<std::io::Error> for SettingsError {
    fn from(e: std::io::Error) -> Self {
        Self::Io {
            message: e.to_string(),
        }
    }
}

impl From<serde_json::Error> for SettingsError {
    fn from(e: serde_json::Error) -> Self {
        Self::Invalid {
            message: e.to_string(),
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, SettingsError>;
