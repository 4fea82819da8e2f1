//! Continuous re-run loop.
//!
//! Two states. STARTUP runs the full suite once and reports the outcome to
//! the operator channel. WAITING blocks on deploy notifications forwarded
//! by the relay task, with a bounded idle timeout as a fallback: a
//! notification published before our subscription was established (or
//! dropped outright) must not stall the harness forever. After a wake the
//! loop pauses for a short debounce window and drains the queue, so several
//! components redeploying together trigger a single re-run.
//!
//! The relay is the only other scheduled unit; it talks to the loop
//! exclusively through an mpsc channel.

use std::time::Duration;

use futures_util::StreamExt;
use regex::Regex;
use tokio::sync::mpsc;
use tokio::time::timeout;

use crate::config::UpdaterConfig;
use crate::error::HarnessError;
use crate::resources::Resources;
use crate::runner::{run_suite, RunReport, SuiteFailure, TestCase};

/// Why the WAITING state ended.
#[derive(Debug, PartialEq, Eq)]
pub enum WakeReason {
    /// A deploy notification arrived on the named topic.
    Notification(String),
    /// Nothing arrived within the idle timeout.
    IdleTimeout,
}

/// A completed WAITING state.
#[derive(Debug)]
pub struct Wake {
    pub reason: WakeReason,
    /// Further notifications absorbed by the debounce window.
    pub coalesced: usize,
}

/// Block until a notification arrives or the idle timeout elapses, then
/// debounce and drain so rapid notifications coalesce into one wake.
pub async fn wait_for_change(
    config: &UpdaterConfig,
    rx: &mut mpsc::UnboundedReceiver<String>,
) -> Wake {
    let reason = match timeout(config.idle_timeout, rx.recv()).await {
        Ok(Some(topic)) => WakeReason::Notification(topic),
        Ok(None) => {
            // relay gone; fall back to pure polling
            tokio::time::sleep(config.idle_timeout).await;
            WakeReason::IdleTimeout
        }
        Err(_) => WakeReason::IdleTimeout,
    };

    let debounce = match reason {
        WakeReason::Notification(_) => config.debounce_first,
        WakeReason::IdleTimeout => true,
    };
    if debounce && config.debounce > Duration::ZERO {
        tokio::time::sleep(config.debounce).await;
    }

    let mut coalesced = 0;
    while rx.try_recv().is_ok() {
        coalesced += 1;
    }

    Wake { reason, coalesced }
}

/// Relay task: subscribe to the deploy topics and forward every message's
/// channel name into the loop. Reconnects with a short pause on any redis
/// failure; exits once the receiving side is gone.
pub async fn relay_updates(topics: Vec<String>, tx: mpsc::UnboundedSender<String>) {
    loop {
        if let Err(e) = subscribe_and_forward(&topics, &tx).await {
            tracing::warn!(error = %e, "update subscription lost, reconnecting");
        }
        if tx.is_closed() {
            return;
        }
        tokio::time::sleep(Duration::from_secs(5)).await;
    }
}

async fn subscribe_and_forward(
    topics: &[String],
    tx: &mpsc::UnboundedSender<String>,
) -> Result<(), HarnessError> {
    let mut resources = Resources::new();
    let result = async {
        let mut pubsub = resources.pubsub().await?;
        pubsub.subscribe(topics).await?;
        tracing::info!(?topics, "subscribed to deploy notifications");

        let mut messages = pubsub.on_message();
        while let Some(message) = messages.next().await {
            let channel = message.get_channel_name().to_string();
            tracing::debug!(topic = %channel, "deploy notification");
            if tx.send(channel).is_err() {
                return Ok(());
            }
        }
        Ok(())
    }
    .await;
    resources.close().await;
    result
}

/// Run one full pass of the given suite.
pub async fn run_once<F>(suite: &F, patterns: &[Regex]) -> Result<RunReport, SuiteFailure>
where
    F: Fn() -> Vec<TestCase>,
{
    let cases = suite();
    run_suite(&cases, patterns).await
}

/// Send the pass outcome to the operator channel. Reporting failures are
/// logged and swallowed; they must not take the loop down.
pub async fn report(result: &Result<RunReport, SuiteFailure>) {
    let mut resources = Resources::new();
    let outcome = async {
        let slack = resources.slack().await?;
        match result {
            Ok(run) => {
                slack
                    .send_message(&format!(
                        "integration tests passed: {} tests in {:.1}s ({} filtered out)",
                        run.executed,
                        run.duration.as_secs_f64(),
                        run.skipped
                    ))
                    .await
            }
            Err(failure) => {
                slack
                    .send_failure(
                        &format!("integration test {} failed", failure.test),
                        &format!("{:?}", failure.error),
                    )
                    .await
            }
        }
    }
    .await;
    resources.close().await;
    if let Err(e) = outcome {
        tracing::warn!(error = %e, "could not deliver run report");
    }
}

/// Continuous mode: STARTUP, report, WAITING, repeat. Suite failures and
/// unexpected errors are reported and swallowed so the process keeps
/// polling.
pub async fn run_forever<F>(
    suite: F,
    config: UpdaterConfig,
    patterns: Vec<Regex>,
    mut rx: mpsc::UnboundedReceiver<String>,
) where
    F: Fn() -> Vec<TestCase>,
{
    loop {
        let result = run_once(&suite, &patterns).await;
        match &result {
            Ok(run) => tracing::info!(
                executed = run.executed,
                skipped = run.skipped,
                "suite passed"
            ),
            Err(failure) => tracing::error!(
                test = failure.test,
                error = %failure.error,
                executed = failure.executed,
                "suite failed"
            ),
        }
        report(&result).await;

        let wake = wait_for_change(&config, &mut rx).await;
        tracing::info!(reason = ?wake.reason, coalesced = wake.coalesced, "re-running suite");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(debounce_first: bool) -> UpdaterConfig {
        UpdaterConfig {
            idle_timeout: Duration::from_secs(60),
            debounce: Duration::from_secs(1),
            debounce_first,
            ..UpdaterConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn notification_wakes_and_coalesces_queued_ones() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send("updates:backend".to_string()).unwrap();
        tx.send("updates:frontend".to_string()).unwrap();
        tx.send("updates:jobs".to_string()).unwrap();

        let wake = wait_for_change(&test_config(true), &mut rx).await;
        assert_eq!(
            wake.reason,
            WakeReason::Notification("updates:backend".to_string())
        );
        assert_eq!(wake.coalesced, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_timeout_wakes_without_notifications() {
        let (_tx, mut rx) = mpsc::unbounded_channel::<String>();
        let start = tokio::time::Instant::now();
        let wake = wait_for_change(&test_config(true), &mut rx).await;
        assert_eq!(wake.reason, WakeReason::IdleTimeout);
        assert_eq!(wake.coalesced, 0);
        // idle timeout plus the debounce window
        assert_eq!(start.elapsed(), Duration::from_secs(61));
    }

    #[tokio::test(start_paused = true)]
    async fn debounce_first_disabled_skips_the_pause() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send("updates:backend".to_string()).unwrap();
        let start = tokio::time::Instant::now();
        let wake = wait_for_change(&test_config(false), &mut rx).await;
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(wake.coalesced, 0);
        assert!(matches!(wake.reason, WakeReason::Notification(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn notifications_during_the_debounce_window_coalesce() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send("updates:backend".to_string()).unwrap();

        let config = test_config(true);
        let waiter = tokio::spawn(async move {
            let wake = wait_for_change(&config, &mut rx).await;
            (wake, rx)
        });
        // let the waiter consume the first notification and enter the
        // debounce sleep, then publish two more
        tokio::task::yield_now().await;
        tx.send("updates:frontend".to_string()).unwrap();
        tx.send("updates:websocket".to_string()).unwrap();

        let (wake, _rx) = waiter.await.unwrap();
        assert_eq!(
            wake.reason,
            WakeReason::Notification("updates:backend".to_string())
        );
        assert_eq!(wake.coalesced, 2);
    }
}
