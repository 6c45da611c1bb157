//! Linear-backoff retry policy.
//!
//! A timeout is treated as a hard signal that the upstream is slow:
//! retrying would just waste the remaining budget, so a timeout error
//! is never retried. Every other failure is retried up to
//! `max_retries` times with a `1s * (attempt + 1)` delay before each
//! retry; each attempt gets its own full timeout budget, independent
//! of the others — that's the caller's concern, not this helper's.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::warn;

/// Implemented by an operation's error type so the retry loop can
/// decide, without knowing the error's shape, whether another attempt
/// is worth making.
pub trait Retryable {
    fn is_timeout(&self) -> bool;
}

/// Retries `operation` up to `max_retries` additional times after the
/// first attempt. `operation` is invoked with the zero-based attempt
/// index so it can be used in log lines.
///
/// Returns the last error encountered if every attempt fails.
pub async fn retry_with_linear_backoff<F, Fut, T, E>(max_retries: u32, mut operation: F) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable,
{
    let mut attempt = 0u32;
    loop {
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if err.is_timeout() {
                    return Err(err);
                }
                if attempt >= max_retries {
                    return Err(err);
                }
                let delay = Duration::from_secs((attempt + 1) as u64);
                warn!(attempt, delay_ms = delay.as_millis() as u64, "retrying after failure");
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[derive(Debug)]
    struct TestError {
        timeout: bool,
    }

    impl Retryable for TestError {
        fn is_timeout(&self) -> bool {
            self.timeout
        }
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_without_retry() {
        let result: Result<i32, TestError> =
            retry_with_linear_backoff(3, |_attempt| async { Ok(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_non_timeout_failures_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();
        let result: Result<i32, TestError> = retry_with_linear_backoff(2, move |_attempt| {
            let calls = calls_clone.clone();
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(TestError { timeout: false })
                } else {
                    Ok(7)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn never_retries_a_timeout() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();
        let result: Result<i32, TestError> = retry_with_linear_backoff(5, move |_attempt| {
            let calls = calls_clone.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(TestError { timeout: true })
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();
        let result: Result<i32, TestError> = retry_with_linear_backoff(2, move |_attempt| {
            let calls = calls_clone.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(TestError { timeout: false })
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
