//! API error body parsing shared across HTTP providers.
//!
//! Providers return JSON error envelopes with slightly different shapes;
//! this module extracts a message and code, decides retryability, and caps
//! the body embedded in errors at 8 KiB.

use planter_core::retry::ERROR_BODY_MAX_BYTES;
use planter_core::text::truncate_with_suffix;

/// Parsed error information.
#[derive(Clone, Debug)]
pub struct ApiErrorInfo {
    /// Human-readable message (truncated).
    pub message: String,
    /// Provider error code when present.
    pub code: Option<String>,
    /// Whether the status suggests retrying.
    pub retryable: bool,
}

/// Parse an error response body.
///
/// Understands `{"error": {"message", "code"|"type"}}` (OpenAI, Anthropic)
/// and falls back to the raw body.
#[must_use]
pub fn parse_api_error(body: &str, status: u16) -> ApiErrorInfo {
    let truncated = truncate_body(body);
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();

    let (message, code) = parsed
        .as_ref()
        .and_then(|v| v.get("error"))
        .map_or((truncated.clone(), None), |err| {
            let message = err
                .get("message")
                .and_then(serde_json::Value::as_str)
                .map_or_else(|| truncated.clone(), str::to_owned);
            let code = err
                .get("code")
                .or_else(|| err.get("type"))
                .and_then(serde_json::Value::as_str)
                .map(str::to_owned);
            (message, code)
        });

    ApiErrorInfo {
        message: truncate_body(&message),
        code,
        retryable: status == 429 || status >= 500,
    }
}

/// Cap a body at 8 KiB for embedding in errors.
#[must_use]
pub fn truncate_body(body: &str) -> String {
    truncate_with_suffix(body, ERROR_BODY_MAX_BYTES, "…[truncated]")
}

/// Whether a 4xx body indicates the conversation exceeds the context window.
#[must_use]
pub fn is_context_overflow(body: &str) -> bool {
    let lower = body.to_lowercase();
    lower.contains("context_length")
        || lower.contains("context window")
        || lower.contains("maximum context length")
        || lower.contains("prompt is too long")
}

/// Whether a 400 body rejects the named request parameter.
#[must_use]
pub fn is_param_rejection(body: &str, param: &str) -> bool {
    let lower = body.to_lowercase();
    lower.contains(&param.to_lowercase())
        && (lower.contains("unsupported")
            || lower.contains("unknown")
            || lower.contains("invalid")
            || lower.contains("unexpected"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_openai_envelope() {
        let body = r#"{"error": {"message": "Rate limit reached", "code": "rate_limit_exceeded"}}"#;
        let info = parse_api_error(body, 429);
        assert_eq!(info.message, "Rate limit reached");
        assert_eq!(info.code.as_deref(), Some("rate_limit_exceeded"));
        assert!(info.retryable);
    }

    #[test]
    fn parses_anthropic_envelope() {
        let body = r#"{"type": "error", "error": {"type": "overloaded_error", "message": "Overloaded"}}"#;
        let info = parse_api_error(body, 529);
        assert_eq!(info.message, "Overloaded");
        assert_eq!(info.code.as_deref(), Some("overloaded_error"));
        assert!(info.retryable);
    }

    #[test]
    fn non_json_falls_back_to_raw_body() {
        let info = parse_api_error("<html>bad gateway</html>", 502);
        assert!(info.message.contains("bad gateway"));
        assert!(info.code.is_none());
    }

    #[test]
    fn client_errors_not_retryable() {
        assert!(!parse_api_error("{}", 400).retryable);
        assert!(!parse_api_error("{}", 404).retryable);
    }

    #[test]
    fn bodies_capped_at_8kib() {
        let body = "x".repeat(64 * 1024);
        let info = parse_api_error(&body, 500);
        assert!(info.message.len() <= ERROR_BODY_MAX_BYTES);
        assert!(info.message.ends_with("…[truncated]"));
    }

    #[test]
    fn detects_context_overflow_phrasings() {
        assert!(is_context_overflow(
            r#"{"error":{"message":"This model's maximum context length is 128000 tokens"}}"#
        ));
        assert!(is_context_overflow(r#"{"error":{"message":"prompt is too long: 210000 tokens"}}"#));
        assert!(!is_context_overflow(r#"{"error":{"message":"invalid api key"}}"#));
    }

    #[test]
    fn detects_param_rejection() {
        assert!(is_param_rejection(
            r#"{"error":{"message":"Unknown parameter: 'reasoning_effort'"}}"#,
            "reasoning_effort"
        ));
        assert!(is_param_rejection(
            r#"{"error":{"message":"thinking is unsupported on this model"}}"#,
            "thinking"
        ));
        assert!(!is_param_rejection(
            r#"{"error":{"message":"invalid api key"}}"#,
            "reasoning_effort"
        ));
    }
}
