//! Behavior of the continuous re-run loop, driven through an injected
//! notification channel with the clock paused.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use tokio::sync::mpsc;

use common::counting_suite;
use pbar_itests::config::UpdaterConfig;
use pbar_itests::updater;

fn slow_loop_config() -> UpdaterConfig {
    UpdaterConfig {
        idle_timeout: Duration::from_secs(300),
        debounce: Duration::from_secs(1),
        debounce_first: true,
        ..UpdaterConfig::default()
    }
}

async fn wait_for_count(counter: &Arc<AtomicUsize>, expected: usize) {
    while counter.load(Ordering::SeqCst) < expected {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn notification_triggers_exactly_one_rerun() {
    let counter = Arc::new(AtomicUsize::new(0));
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(updater::run_forever(
        counting_suite(counter.clone()),
        slow_loop_config(),
        Vec::new(),
        rx,
    ));

    wait_for_count(&counter, 1).await;
    tx.send("updates:backend".to_string()).unwrap();

    // well within the idle timeout, so only the notification can wake it
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(counter.load(Ordering::SeqCst), 2);
    handle.abort();
}

#[tokio::test(start_paused = true)]
async fn burst_of_notifications_coalesces_into_one_rerun() {
    let counter = Arc::new(AtomicUsize::new(0));
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(updater::run_forever(
        counting_suite(counter.clone()),
        slow_loop_config(),
        Vec::new(),
        rx,
    ));

    wait_for_count(&counter, 1).await;
    for topic in ["updates:backend", "updates:frontend", "updates:jobs"] {
        tx.send(topic.to_string()).unwrap();
    }

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(counter.load(Ordering::SeqCst), 2);
    handle.abort();
}

#[tokio::test(start_paused = true)]
async fn idle_timeout_reruns_without_any_notification() {
    let counter = Arc::new(AtomicUsize::new(0));
    let (_tx, rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(updater::run_forever(
        counting_suite(counter.clone()),
        slow_loop_config(),
        Vec::new(),
        rx,
    ));

    wait_for_count(&counter, 1).await;
    // past the idle timeout and the debounce window, before the next cycle
    tokio::time::sleep(Duration::from_secs(310)).await;
    assert_eq!(counter.load(Ordering::SeqCst), 2);
    handle.abort();
}

#[tokio::test]
async fn single_shot_runs_once_and_returns() {
    let counter = Arc::new(AtomicUsize::new(0));
    let suite = counting_suite(counter.clone());

    let report = updater::run_once(&suite, &[]).await.unwrap();
    assert_eq!(report.executed, 1);
    assert_eq!(report.skipped, 0);
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn single_shot_honors_filters() {
    let counter = Arc::new(AtomicUsize::new(0));
    let suite = counting_suite(counter.clone());
    let patterns = vec![Regex::new("no_such_test").unwrap()];

    let report = updater::run_once(&suite, &patterns).await.unwrap();
    assert_eq!(report.executed, 0);
    assert_eq!(report.skipped, 1);
    assert_eq!(counter.load(Ordering::SeqCst), 0);
}
