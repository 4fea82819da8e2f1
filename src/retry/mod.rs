//! Test-level errors and the assertion retry helper.
//!
//! Probes assert on backend state that becomes consistent asynchronously
//! (e.g. a search index lagging a write). [`retry`] absorbs a bounded
//! eventual-consistency window: assertion failures are retried with a fixed
//! delay, anything else propagates immediately.

use std::future::Future;
use std::time::Duration;

use crate::config::ConfigError;
use crate::error::HarnessError;

/// How a single test (or probe) fails.
#[derive(Debug, thiserror::Error)]
pub enum TestError {
    /// The backend responded, but not with what we expected. Retryable.
    #[error("assertion failed: {0}")]
    Assertion(String),

    /// Something broke below the assertion level. Never retried.
    #[error(transparent)]
    Harness(#[from] HarnessError),
}

pub type TestResult<T = ()> = Result<T, TestError>;

impl From<reqwest::Error> for TestError {
    fn from(e: reqwest::Error) -> Self {
        TestError::Harness(e.into())
    }
}

impl From<redis::RedisError> for TestError {
    fn from(e: redis::RedisError) -> Self {
        TestError::Harness(e.into())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for TestError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        TestError::Harness(e.into())
    }
}

impl From<serde_json::Error> for TestError {
    fn from(e: serde_json::Error) -> Self {
        TestError::Harness(e.into())
    }
}

impl From<ConfigError> for TestError {
    fn from(e: ConfigError) -> Self {
        TestError::Harness(e.into())
    }
}

/// Fail the enclosing probe with [`TestError::Assertion`] when the
/// condition does not hold. The message should carry the observed data.
#[macro_export]
macro_rules! check {
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            return Err($crate::retry::TestError::Assertion(format!($($arg)+)).into());
        }
    };
}

/// [`check!`] specialised to equality, reporting both sides.
#[macro_export]
macro_rules! check_eq {
    ($left:expr, $right:expr, $($arg:tt)+) => {{
        let left = &$left;
        let right = &$right;
        if left != right {
            return Err($crate::retry::TestError::Assertion(format!(
                "{} (left: {:?}, right: {:?})",
                format!($($arg)+),
                left,
                right
            ))
            .into());
        }
    }};
}

pub const DEFAULT_RETRIES: u32 = 10;
pub const DEFAULT_DELAY: Duration = Duration::from_secs(1);

/// Retry an assertion probe with the default budget (10 attempts, 1s apart).
pub async fn retry<T, F, Fut>(probe: F) -> TestResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = TestResult<T>>,
{
    retry_with(probe, DEFAULT_RETRIES, DEFAULT_DELAY).await
}

/// Retry an assertion probe up to `retries` total invocations, sleeping
/// `delay` between attempts. The final assertion failure is re-raised;
/// non-assertion errors propagate without retry.
pub async fn retry_with<T, F, Fut>(mut probe: F, retries: u32, delay: Duration) -> TestResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = TestResult<T>>,
{
    assert!(retries > 0, "retries must be at least 1");
    let mut attempt = 0;
    loop {
        attempt += 1;
        match probe().await {
            Ok(value) => return Ok(value),
            Err(TestError::Assertion(msg)) => {
                if attempt >= retries {
                    return Err(TestError::Assertion(msg));
                }
                tracing::debug!(attempt, error = %msg, "probe assertion failed, retrying");
                tokio::time::sleep(delay).await;
            }
            Err(other) => return Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn flaky(
        calls: Arc<AtomicU32>,
        fail_times: u32,
    ) -> impl FnMut() -> std::pin::Pin<Box<dyn Future<Output = TestResult<u32>>>> {
        move || {
            let calls = calls.clone();
            Box::pin(async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n <= fail_times {
                    Err(TestError::Assertion(format!("attempt {n} failed")))
                } else {
                    Ok(n)
                }
            })
        }
    }

    #[tokio::test]
    async fn succeeds_after_k_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let result = retry_with(flaky(calls.clone(), 2), 3, Duration::ZERO).await;
        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausts_and_reraises_last_failure() {
        let calls = Arc::new(AtomicU32::new(0));
        let result = retry_with(flaky(calls.clone(), u32::MAX), 4, Duration::ZERO).await;
        match result {
            Err(TestError::Assertion(msg)) => assert_eq!(msg, "attempt 4 failed"),
            other => panic!("expected assertion failure, got {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn non_assertion_error_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();
        let result: TestResult<()> = retry_with(
            move || {
                let calls = calls2.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(TestError::Harness(HarnessError::WebSocketClosed))
                }
            },
            5,
            Duration::ZERO,
        )
        .await;
        assert!(matches!(
            result,
            Err(TestError::Harness(HarnessError::WebSocketClosed))
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn configured_delay_is_observed_between_attempts() {
        let start = tokio::time::Instant::now();
        let calls = Arc::new(AtomicU32::new(0));
        let result = retry_with(flaky(calls, 2), 3, Duration::from_secs(1)).await;
        assert!(result.is_ok());
        // two sleeps: between attempts 1-2 and 2-3
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test]
    async fn check_macro_produces_assertion_errors() {
        async fn probe(items: usize) -> TestResult {
            check!(items == 1, "expected one item, got {items}");
            Ok(())
        }
        assert!(probe(1).await.is_ok());
        match probe(2).await {
            Err(TestError::Assertion(msg)) => assert!(msg.contains("got 2")),
            other => panic!("expected assertion failure, got {other:?}"),
        }
    }
}
