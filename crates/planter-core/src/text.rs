//! UTF-8-safe truncation and observation clipping.
//!
//! Rust `&str[..n]` panics when `n` falls inside a multi-byte character.
//! These helpers always cut at a char boundary. [`clip_observation`] is the
//! single place observation text gets bounded before it reaches the model.

/// Truncate a string to at most `max_bytes` bytes at a char boundary.
#[inline]
#[must_use]
pub fn truncate_str(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Truncate `s` and append `suffix` when the original exceeds `max_bytes`.
///
/// The result is at most `max_bytes` bytes including the suffix. Fitting
/// strings come back unchanged.
#[must_use]
pub fn truncate_with_suffix(s: &str, max_bytes: usize, suffix: &str) -> String {
    if s.len() <= max_bytes {
        return s.to_owned();
    }
    let body_budget = max_bytes.saturating_sub(suffix.len());
    format!("{}{suffix}", truncate_str(s, body_budget))
}

/// Clip an observation to `max_chars` bytes, appending a `[clipped N chars]`
/// marker that names how many bytes were dropped.
///
/// Clipping happens before the observation is handed to the engine, so the
/// model always sees the marker rather than a silently shortened string.
#[must_use]
pub fn clip_observation(s: &str, max_chars: usize) -> String {
    if s.len() <= max_chars {
        return s.to_owned();
    }
    let kept = truncate_str(s, max_chars);
    let dropped = s.len() - kept.len();
    format!("{kept}\n[clipped {dropped} chars]")
}
