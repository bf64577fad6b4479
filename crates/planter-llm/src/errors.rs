//! Model abstraction error taxonomy.

use thiserror::Error;

/// Errors surfaced by the model abstraction.
///
/// Kinds mirror the engine's failure table: transport errors retry before
/// propagating, `RateLimitExhausted` is fatal after state persistence,
/// `ContextOverflow` earns one condense-and-retry, and the rest are fatal to
/// the current solve.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Connection-level failure (DNS, TLS, timeout) after transport retries.
    #[error("network error: {message}")]
    Network {
        /// Transport error description.
        message: String,
    },

    /// Non-retryable HTTP error status. Body truncated to 8 KiB.
    #[error("HTTP {status}: {body}")]
    HttpStatus {
        /// Response status code.
        status: u16,
        /// Truncated response body.
        body: String,
    },

    /// 429 persisted through all retry attempts.
    #[error("rate limit retries exhausted after {attempts} attempts")]
    RateLimitExhausted {
        /// Attempts made before giving up.
        attempts: u32,
    },

    /// The provider response could not be interpreted.
    #[error("malformed response: {message}")]
    MalformedResponse {
        /// What failed to parse.
        message: String,
    },

    /// A tool result referenced no call in the last assistant turn.
    #[error("dangling tool result for call {tool_call_id}")]
    DanglingToolResult {
        /// The unmatched call ID.
        tool_call_id: String,
    },

    /// The conversation no longer fits the context window.
    #[error("context overflow: {message}")]
    ContextOverflow {
        /// Provider-reported detail.
        message: String,
    },

    /// The completion was cancelled by the user.
    #[error("completion cancelled")]
    Cancelled,
}

impl ModelError {
    /// Stable kind string for events and observations.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Network { .. } => "network",
            Self::HttpStatus { .. } => "http_status",
            Self::RateLimitExhausted { .. } => "rate_limit_exhausted",
            Self::MalformedResponse { .. } => "malformed_response",
            Self::DanglingToolResult { .. } => "dangling_tool_result",
            Self::ContextOverflow { .. } => "context_overflow",
            Self::Cancelled => "cancel",
        }
    }
}

/// Convenience alias.
pub type ModelResult<T> = Result<T, ModelError>;
