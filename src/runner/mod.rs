//! Sequential test runner.
//!
//! Rust has no runtime test discovery, so the suite is a static registry of
//! fully-qualified names (mirroring module paths) plus async entry points.
//! Tests run strictly one after another; the first failure aborts the rest
//! of the queue. There is no isolation between tests and no parallelism.

use std::time::{Duration, Instant};

use futures_util::future::BoxFuture;
use regex::Regex;

use crate::retry::{TestError, TestResult};

pub type TestFn = Box<dyn Fn() -> BoxFuture<'static, TestResult> + Send + Sync>;

/// One registered test.
pub struct TestCase {
    pub name: &'static str,
    run: TestFn,
}

impl TestCase {
    pub fn new<F>(name: &'static str, run: F) -> Self
    where
        F: Fn() -> BoxFuture<'static, TestResult> + Send + Sync + 'static,
    {
        Self {
            name,
            run: Box::new(run),
        }
    }
}

/// Outcome of a full pass.
#[derive(Debug)]
pub struct RunReport {
    pub executed: usize,
    pub skipped: usize,
    pub duration: Duration,
}

/// The failure that aborted a pass.
#[derive(Debug)]
pub struct SuiteFailure {
    pub test: &'static str,
    pub error: TestError,
    pub executed: usize,
}

/// Whether a test name is selected by the filter set. An empty set selects
/// everything; otherwise any pattern may match anywhere in the name.
pub fn selected(name: &str, patterns: &[Regex]) -> bool {
    patterns.is_empty() || patterns.iter().any(|p| p.is_match(name))
}

/// Run every selected test in order, stopping at the first failure.
pub async fn run_suite(cases: &[TestCase], patterns: &[Regex]) -> Result<RunReport, SuiteFailure> {
    let started = Instant::now();
    let mut executed = 0;
    let mut skipped = 0;

    for case in cases {
        if !selected(case.name, patterns) {
            skipped += 1;
            continue;
        }
        tracing::info!(test = case.name, "running");
        let test_started = Instant::now();
        match (case.run)().await {
            Ok(()) => {
                executed += 1;
                tracing::info!(
                    test = case.name,
                    elapsed_ms = test_started.elapsed().as_millis() as u64,
                    "passed"
                );
            }
            Err(error) => {
                tracing::error!(test = case.name, error = %error, "failed, aborting pass");
                return Err(SuiteFailure {
                    test: case.name,
                    error,
                    executed,
                });
            }
        }
    }

    Ok(RunReport {
        executed,
        skipped,
        duration: started.elapsed(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HarnessError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_case(name: &'static str, calls: Arc<AtomicUsize>) -> TestCase {
        TestCase::new(name, move || {
            let calls = calls.clone();
            Box::pin(async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        })
    }

    fn failing_case(name: &'static str) -> TestCase {
        TestCase::new(name, || {
            Box::pin(async { Err(TestError::Harness(HarnessError::WebSocketClosed)) })
        })
    }

    #[tokio::test]
    async fn empty_filter_runs_everything() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cases = vec![
            counting_case("suites::bars::create", calls.clone()),
            counting_case("suites::steps::create", calls.clone()),
        ];
        let report = run_suite(&cases, &[]).await.unwrap();
        assert_eq!(report.executed, 2);
        assert_eq!(report.skipped, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn filter_matches_anywhere_in_the_name() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cases = vec![
            counting_case("suites::bars::create", calls.clone()),
            counting_case("suites::steps::create", calls.clone()),
            counting_case("suites::steps::delete", calls.clone()),
        ];
        let patterns = vec![Regex::new("steps").unwrap()];
        let report = run_suite(&cases, &patterns).await.unwrap();
        assert_eq!(report.executed, 2);
        assert_eq!(report.skipped, 1);
    }

    #[tokio::test]
    async fn first_failure_aborts_the_queue() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cases = vec![
            counting_case("a", calls.clone()),
            failing_case("b"),
            counting_case("c", calls.clone()),
        ];
        let failure = run_suite(&cases, &[]).await.unwrap_err();
        assert_eq!(failure.test, "b");
        assert_eq!(failure.executed, 1);
        // "c" never ran
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
