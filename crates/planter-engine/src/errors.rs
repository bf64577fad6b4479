//! Engine error taxonomy.

use thiserror::Error;

use planter_llm::ModelError;

/// Fatal errors for a solve. Tool errors never appear here: they loop back
/// to the model as error observations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A model error that survived retries and recovery.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// The user cancelled the solve.
    #[error("solve cancelled")]
    Cancelled,

    /// The engine could not be constructed (bad workspace root, etc.).
    #[error("engine setup failed: {message}")]
    Setup {
        /// What went wrong.
        message: String,
    },
}

impl EngineError {
    /// Stable kind string for events.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Model(e) => e.kind(),
            Self::Cancelled => "cancel",
            Self::Setup { .. } => "setup",
        }
    }
}
