//! Live trace watching over the websocket, in every ordering of watch vs
//! create, plus ETA sanity across the estimation techniques.

use std::time::Duration;

use rand::Rng;

use super::{finish_trace, start_trace, with_fresh_user};
use crate::api::types::{CreateProgressBar, StepConfig};
use crate::check;
use crate::fixtures::random_token;
use crate::retry::TestResult;
use crate::ws::TraceWatch;

const WATCH_PATH: &str = "/api/2/progress_bars/traces/";
const FRAME_TIMEOUT: Duration = Duration::from_secs(5);

/// Read frames until one arrives with `done: true`, asserting every frame
/// names the expected step.
async fn drain_until_done(ws: &mut TraceWatch, step: &str) -> TestResult {
    loop {
        let update = ws.next_update_within(FRAME_TIMEOUT).await?;
        check!(update.kind == "update", "unexpected frame: {update:?}");
        check!(
            update.data.step_name.as_deref() == Some(step),
            "unexpected step: {update:?}"
        );
        if update.done {
            return Ok(());
        }
    }
}

pub async fn watch_no_trace() -> TestResult {
    with_fresh_user(|resources, user| {
        Box::pin(async move {
            let backend = resources.backend().await?;
            backend
                .create_progress_bar(&user.token, &CreateProgressBar::named("test"))
                .await?;
            backend
                .create_step(&user.token, "test", "step1", &StepConfig::default())
                .await?;
            let uid = random_token(8);
            start_trace(&backend, &user.token, "test", "step1", &uid, None).await?;

            let mut ws = resources.websocket(WATCH_PATH).await?;
            let ack = ws.subscribe(&user.sub, "test", &uid).await?;
            check!(ack.success, "subscribe rejected: {ack:?}");

            let update = ws.next_update_within(FRAME_TIMEOUT).await?;
            check!(update.kind == "update", "unexpected frame: {update:?}");
            check!(!update.done, "done before finish: {update:?}");
            check!(
                update.data.step_name.as_deref() == Some("step1"),
                "unexpected step: {update:?}"
            );

            finish_trace(&backend, &user.token, "test", &uid, "step1", None).await?;
            drain_until_done(&mut ws, "step1").await?;
            ws.close().await;
            Ok(())
        })
    })
    .await
}

pub async fn watch_before_create() -> TestResult {
    with_fresh_user(|resources, user| {
        Box::pin(async move {
            let backend = resources.backend().await?;
            let response = backend
                .create_progress_bar(&user.token, &CreateProgressBar::named("test"))
                .await?;
            check!(response.ok(), "bar create failed: {response:?}");
            let response = backend
                .create_step(&user.token, "test", "step1", &StepConfig::default())
                .await?;
            check!(response.ok(), "step create failed: {response:?}");

            let uid = random_token(8);
            let mut ws = resources.websocket(WATCH_PATH).await?;
            let ack = ws.subscribe(&user.sub, "test", &uid).await?;
            check!(ack.success, "subscribe rejected: {ack:?}");

            // bar layout is known, so the first frame already names step1
            let update = ws.next_update_within(FRAME_TIMEOUT).await?;
            check!(update.kind == "update", "unexpected frame: {update:?}");
            check!(!update.done, "done before finish: {update:?}");
            check!(
                update.data.step_name.as_deref() == Some("step1"),
                "unexpected step: {update:?}"
            );

            start_trace(&backend, &user.token, "test", "step1", &uid, None).await?;
            finish_trace(&backend, &user.token, "test", &uid, "step1", None).await?;
            drain_until_done(&mut ws, "step1").await?;
            ws.close().await;
            Ok(())
        })
    })
    .await
}

pub async fn create_before_watch() -> TestResult {
    with_fresh_user(|resources, user| {
        Box::pin(async move {
            let backend = resources.backend().await?;
            let uid = random_token(8);
            start_trace(&backend, &user.token, "test", "step1", &uid, None).await?;

            let mut ws = resources.websocket(WATCH_PATH).await?;
            let ack = ws.subscribe(&user.sub, "test", &uid).await?;
            check!(ack.success, "subscribe rejected: {ack:?}");

            let update = ws.next_update_within(FRAME_TIMEOUT).await?;
            check!(update.kind == "update", "unexpected frame: {update:?}");
            check!(!update.done, "done before finish: {update:?}");
            check!(
                update.data.step_name.as_deref() == Some("step1"),
                "unexpected step: {update:?}"
            );

            finish_trace(&backend, &user.token, "test", &uid, "step1", None).await?;
            drain_until_done(&mut ws, "step1").await?;
            ws.close().await;
            Ok(())
        })
    })
    .await
}

pub async fn watch_before_create_no_bar() -> TestResult {
    with_fresh_user(|resources, user| {
        Box::pin(async move {
            let backend = resources.backend().await?;
            let uid = random_token(8);

            let mut ws = resources.websocket(WATCH_PATH).await?;
            let ack = ws.subscribe(&user.sub, "test", &uid).await?;
            check!(ack.success, "subscribe rejected: {ack:?}");

            // the bar does not exist yet, so the first frame has no layout
            let update = ws.next_update_within(FRAME_TIMEOUT).await?;
            check!(update.kind == "update", "unexpected frame: {update:?}");
            check!(!update.done, "done before finish: {update:?}");

            start_trace(&backend, &user.token, "test", "step1", &uid, None).await?;

            let update = ws.next_update_within(FRAME_TIMEOUT).await?;
            check!(update.kind == "update", "unexpected frame: {update:?}");
            check!(!update.done, "done before finish: {update:?}");
            check!(
                update.data.step_name.as_deref() == Some("step1"),
                "unexpected step: {update:?}"
            );

            finish_trace(&backend, &user.token, "test", &uid, "step1", None).await?;
            drain_until_done(&mut ws, "step1").await?;
            ws.close().await;
            Ok(())
        })
    })
    .await
}

pub async fn repeated_create_before_watch() -> TestResult {
    with_fresh_user(|resources, user| {
        Box::pin(async move {
            let backend = resources.backend().await?;
            let response = backend
                .create_progress_bar(
                    &user.token,
                    &CreateProgressBar {
                        sampling_max_count: Some(10_000),
                        sampling_max_age_seconds: Some(100),
                        ..CreateProgressBar::named("test")
                    },
                )
                .await?;
            check!(response.ok(), "bar create failed: {response:?}");

            for _ in 0..100 {
                let uid = random_token(8);
                start_trace(&backend, &user.token, "test", "step1", &uid, None).await?;
                finish_trace(&backend, &user.token, "test", &uid, "step1", None).await?;
                tokio::time::sleep(Duration::from_millis(10)).await;
            }

            let uid = random_token(8);
            let mut ws = resources.websocket(WATCH_PATH).await?;
            let ack = ws.subscribe(&user.sub, "test", &uid).await?;
            check!(ack.success, "subscribe rejected: {ack:?}");

            let update = ws.next_update_within(FRAME_TIMEOUT).await?;
            check!(
                update.data.overall_eta_seconds.unwrap_or(0.0) > 0.0,
                "no overall eta: {update:?}"
            );
            check!(
                update.data.step_overall_eta_seconds.unwrap_or(0.0) > 0.0,
                "no step eta: {update:?}"
            );
            ws.close().await;
            Ok(())
        })
    })
    .await
}

/// Seed a bar with the given default and step configs, drive 100 complete
/// traces through it, then watch a fresh uid and assert the first frame
/// carries positive ETAs.
async fn eta_after_seeding<I>(
    default_config: StepConfig,
    step_config: StepConfig,
    mut iterations: I,
) -> TestResult
where
    I: FnMut() -> Option<u64> + Send + 'static,
{
    with_fresh_user(move |resources, user| {
        Box::pin(async move {
            let backend = resources.backend().await?;
            let response = backend
                .create_progress_bar(
                    &user.token,
                    &CreateProgressBar {
                        sampling_max_count: Some(10_000),
                        sampling_max_age_seconds: Some(100),
                        default_step_config: Some(default_config),
                        ..CreateProgressBar::named("test")
                    },
                )
                .await?;
            check!(response.ok(), "bar create failed: {response:?}");
            let response = backend
                .create_step(&user.token, "test", "step1", &step_config)
                .await?;
            check!(response.ok(), "step create failed: {response:?}");

            for _ in 0..100 {
                let uid = random_token(8);
                let iters = iterations();
                start_trace(&backend, &user.token, "test", "step1", &uid, iters).await?;
                finish_trace(&backend, &user.token, "test", &uid, "step1", iters).await?;
                tokio::time::sleep(Duration::from_millis(10)).await;
            }

            let uid = random_token(8);
            let mut ws = resources.websocket(WATCH_PATH).await?;
            let ack = ws.subscribe(&user.sub, "test", &uid).await?;
            check!(ack.success, "subscribe rejected: {ack:?}");

            let update = ws.next_update_within(FRAME_TIMEOUT).await?;
            check!(
                update.data.overall_eta_seconds.unwrap_or(0.0) > 0.0,
                "no overall eta: {update:?}"
            );
            check!(
                update.data.step_overall_eta_seconds.unwrap_or(0.0) > 0.0,
                "no step eta: {update:?}"
            );
            ws.close().await;
            Ok(())
        })
    })
    .await
}

const ONE_OFF_TECHNIQUES: [&str; 4] = [
    "percentile",
    "arithmetic_mean",
    "geometric_mean",
    "harmonic_mean",
];

const ITERATED_TECHNIQUES: [&str; 5] = [
    "best_fit.linear",
    "percentile",
    "arithmetic_mean",
    "geometric_mean",
    "harmonic_mean",
];

pub async fn one_off_technique_matrix() -> TestResult {
    for technique in ONE_OFF_TECHNIQUES {
        tracing::info!(technique, role = "default", "one-off matrix entry");
        eta_after_seeding(
            StepConfig::one_off(technique),
            StepConfig::one_off("percentile"),
            || None,
        )
        .await?;
    }
    for technique in ONE_OFF_TECHNIQUES {
        tracing::info!(technique, role = "step", "one-off matrix entry");
        eta_after_seeding(
            StepConfig::one_off("percentile"),
            StepConfig::one_off(technique),
            || None,
        )
        .await?;
    }
    Ok(())
}

pub async fn iterated_technique_matrix() -> TestResult {
    for technique in ITERATED_TECHNIQUES {
        tracing::info!(technique, "iterated matrix entry");
        eta_after_seeding(
            StepConfig::iterated("percentile"),
            StepConfig::iterated(technique),
            || Some(10),
        )
        .await?;
    }
    Ok(())
}

pub async fn iterated_varied_lengths_matrix() -> TestResult {
    for technique in ITERATED_TECHNIQUES {
        tracing::info!(technique, "iterated varied-lengths matrix entry");
        eta_after_seeding(
            StepConfig::iterated("percentile"),
            StepConfig::iterated(technique),
            || Some(rand::thread_rng().gen_range(1..=100)),
        )
        .await?;
    }
    Ok(())
}
