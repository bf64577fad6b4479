//! Shared rate-limit retry loop.
//!
//! Wraps a single-attempt future factory with the retry contract: up to five
//! rate-limit retries with clamped `Retry-After` sleeps and a per-second
//! countdown, plus an independent three-attempt budget for connection
//! timeouts. Non-streaming callers simply pass no retry hook and the loop
//! stays silent.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use planter_core::retry::{
    DEFAULT_RETRY_AFTER_SECS, MAX_CONNECT_RETRIES, MAX_RATE_LIMIT_RETRIES, clamp_retry_secs,
};

use crate::errors::{ModelError, ModelResult};
use crate::provider::CompletionHooks;

/// Why a single attempt failed.
#[derive(Debug)]
pub(crate) enum AttemptError {
    /// HTTP 429 (or equivalent). Sleep and retry.
    RateLimited {
        /// Parsed `Retry-After` seconds, if present.
        retry_after_secs: Option<u64>,
        /// Provider message for logging.
        message: String,
    },
    /// Connection-level timeout. Retry on the transport budget.
    ConnectTimeout {
        /// Transport error description.
        message: String,
    },
    /// Anything else. Propagate immediately.
    Fatal(ModelError),
}

/// Drive `attempt` to success or exhaustion under the retry contract.
pub(crate) async fn run_with_retry<T, F, Fut>(
    mut attempt: F,
    hooks: &CompletionHooks,
) -> ModelResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AttemptError>>,
{
    let mut rate_limit_attempts: u32 = 0;
    let mut connect_attempts: u32 = 0;

    loop {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(AttemptError::RateLimited {
                retry_after_secs,
                message,
            }) => {
                rate_limit_attempts += 1;
                if rate_limit_attempts > MAX_RATE_LIMIT_RETRIES {
                    warn!(attempts = rate_limit_attempts - 1, "rate limit retries exhausted");
                    return Err(ModelError::RateLimitExhausted {
                        attempts: rate_limit_attempts - 1,
                    });
                }
                let secs =
                    clamp_retry_secs(retry_after_secs.unwrap_or(DEFAULT_RETRY_AFTER_SECS));
                debug!(
                    attempt = rate_limit_attempts,
                    sleep_secs = secs,
                    %message,
                    "rate limited, backing off"
                );
                for remaining in (1..=secs).rev() {
                    hooks.retry(&format!("rate limited, retrying in {remaining}s"));
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
            Err(AttemptError::ConnectTimeout { message }) => {
                connect_attempts += 1;
                if connect_attempts > MAX_CONNECT_RETRIES {
                    return Err(ModelError::Network { message });
                }
                debug!(attempt = connect_attempts, %message, "connection timeout, retrying");
            }
            Err(AttemptError::Fatal(err)) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use parking_lot::Mutex;

    fn rate_limited(secs: u64) -> AttemptError {
        AttemptError::RateLimited {
            retry_after_secs: Some(secs),
            message: "429".into(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_two_rate_limits() {
        let calls = Arc::new(AtomicU32::new(0));
        let countdown: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&countdown);
        let hooks = CompletionHooks {
            on_content_delta: None,
            on_retry: Some(Box::new(move |m| seen.lock().push(m.to_owned()))),
        };

        let c = Arc::clone(&calls);
        let result: ModelResult<u32> = run_with_retry(
            move || {
                let c = Arc::clone(&c);
                async move {
                    let n = c.fetch_add(1, Ordering::SeqCst);
                    if n < 2 { Err(rate_limited(2)) } else { Ok(7) }
                }
            },
            &hooks,
        )
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // Two sleeps of 2s each, one countdown message per second.
        let messages = countdown.lock();
        assert_eq!(messages.len(), 4);
        assert!(messages[0].contains("2s"));
        assert!(messages[1].contains("1s"));
        assert!(messages[2].contains("2s"));
        assert!(messages[3].contains("1s"));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_after_five_rate_limits() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result: ModelResult<u32> = run_with_retry(
            move || {
                let c = Arc::clone(&c);
                async move {
                    let _ = c.fetch_add(1, Ordering::SeqCst);
                    Err::<u32, _>(rate_limited(1))
                }
            },
            &CompletionHooks::none(),
        )
        .await;

        match result {
            Err(ModelError::RateLimitExhausted { attempts }) => assert_eq!(attempts, 5),
            other => panic!("expected exhaustion, got {other:?}"),
        }
        // Initial call + 5 retries.
        assert_eq!(calls.load(Ordering::SeqCst), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_retry_after_sleeps_five_seconds() {
        let countdown: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&countdown);
        let hooks = CompletionHooks {
            on_content_delta: None,
            on_retry: Some(Box::new(move |m| seen.lock().push(m.to_owned()))),
        };
        let first = Arc::new(AtomicU32::new(0));
        let f = Arc::clone(&first);
        let result: ModelResult<()> = run_with_retry(
            move || {
                let f = Arc::clone(&f);
                async move {
                    if f.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(AttemptError::RateLimited {
                            retry_after_secs: None,
                            message: "429".into(),
                        })
                    } else {
                        Ok(())
                    }
                }
            },
            &hooks,
        )
        .await;
        assert!(result.is_ok());
        assert_eq!(countdown.lock().len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn sleep_clamped_to_max() {
        let countdown: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&countdown);
        let hooks = CompletionHooks {
            on_content_delta: None,
            on_retry: Some(Box::new(move |m| seen.lock().push(m.to_owned()))),
        };
        let first = Arc::new(AtomicU32::new(0));
        let f = Arc::clone(&first);
        let result: ModelResult<()> = run_with_retry(
            move || {
                let f = Arc::clone(&f);
                async move {
                    if f.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(rate_limited(10_000))
                    } else {
                        Ok(())
                    }
                }
            },
            &hooks,
        )
        .await;
        assert!(result.is_ok());
        assert_eq!(countdown.lock().len(), 120);
    }

    #[tokio::test]
    async fn connect_timeouts_use_independent_budget() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result: ModelResult<u32> = run_with_retry(
            move || {
                let c = Arc::clone(&c);
                async move {
                    let _ = c.fetch_add(1, Ordering::SeqCst);
                    Err::<u32, _>(AttemptError::ConnectTimeout {
                        message: "timed out".into(),
                    })
                }
            },
            &CompletionHooks::none(),
        )
        .await;
        match result {
            Err(ModelError::Network { message }) => assert!(message.contains("timed out")),
            other => panic!("expected network error, got {other:?}"),
        }
        // Initial call + 3 retries.
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn fatal_errors_propagate_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result: ModelResult<u32> = run_with_retry(
            move || {
                let c = Arc::clone(&c);
                async move {
                    let _ = c.fetch_add(1, Ordering::SeqCst);
                    Err::<u32, _>(AttemptError::Fatal(ModelError::HttpStatus {
                        status: 500,
                        body: "boom".into(),
                    }))
                }
            },
            &CompletionHooks::none(),
        )
        .await;
        assert!(matches!(result, Err(ModelError::HttpStatus { status: 500, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_retry_hook_does_not_kill_loop() {
        let hooks = CompletionHooks {
            on_content_delta: None,
            on_retry: Some(Box::new(|_| panic!("ui bug"))),
        };
        let first = Arc::new(AtomicU32::new(0));
        let f = Arc::clone(&first);
        let result: ModelResult<()> = run_with_retry(
            move || {
                let f = Arc::clone(&f);
                async move {
                    if f.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(rate_limited(1))
                    } else {
                        Ok(())
                    }
                }
            },
            &hooks,
        )
        .await;
        assert!(result.is_ok());
    }
}
