//! Trace bootstrap behavior: completing a trace against a bar that was
//! never explicitly configured creates the bar and its steps, and
//! re-completing the same trace shape replaces the layout and bumps the
//! bar's version.

use serde_json::json;

use super::{finish_trace, start_trace, with_fresh_user};
use crate::api::types::{CreateProgressBar, FilterOn, SearchQuery, SearchResponse, StepConfig};
use crate::fixtures::random_token;
use crate::retry::{retry, TestResult};
use crate::{check, check_eq};

pub async fn bootstrap() -> TestResult {
    with_fresh_user(|resources, user| {
        Box::pin(async move {
            let backend = resources.backend().await?;
            let uid = random_token(8);
            start_trace(&backend, &user.token, "test", "step1", &uid, None).await?;
            finish_trace(&backend, &user.token, "test", &uid, "step1", None).await?;

            retry(|| {
                let backend = backend.clone();
                let token = user.token.clone();
                async move {
                    let response = backend
                        .search_progress_bars(&token, &SearchQuery::default())
                        .await?;
                    check!(response.ok(), "bar search failed: {response:?}");
                    let data: SearchResponse = response.parse()?;
                    check_eq!(data.items.len(), 1, "unexpected bar count");

                    let query = SearchQuery::default().sort_by("name", "desc");
                    let response = backend.search_steps(&token, &query).await?;
                    check!(response.ok(), "step search failed: {response:?}");
                    let data: SearchResponse = response.parse()?;
                    check_eq!(data.items.len(), 2, "unexpected step count");
                    check_eq!(data.items[0]["name"], json!("step1"), "bad step order");

                    let response = backend
                        .search_traces(&token, &SearchQuery::default())
                        .await?;
                    check!(response.ok(), "trace search failed: {response:?}");
                    let data: SearchResponse = response.parse()?;
                    check_eq!(data.items.len(), 1, "unexpected trace count");
                    Ok(())
                }
            })
            .await
        })
    })
    .await
}

pub async fn bootstrap_iterated_step() -> TestResult {
    with_fresh_user(|resources, user| {
        Box::pin(async move {
            let backend = resources.backend().await?;
            let uid = random_token(8);
            start_trace(&backend, &user.token, "test", "step1", &uid, Some(10)).await?;
            finish_trace(&backend, &user.token, "test", &uid, "step1", Some(10)).await?;

            retry(|| {
                let backend = backend.clone();
                let token = user.token.clone();
                async move {
                    let response = backend
                        .search_progress_bars(&token, &SearchQuery::default())
                        .await?;
                    check!(response.ok(), "bar search failed: {response:?}");
                    let data: SearchResponse = response.parse()?;
                    check_eq!(data.items.len(), 1, "unexpected bar count");

                    let query = SearchQuery::default().sort_by("name", "desc");
                    let response = backend.search_steps(&token, &query).await?;
                    check!(response.ok(), "step search failed: {response:?}");
                    let data: SearchResponse = response.parse()?;
                    check_eq!(data.items.len(), 2, "unexpected step count");
                    check_eq!(data.items[0]["name"], json!("step1"), "bad step order");
                    check_eq!(data.items[0]["iterated"], json!(true), "step not iterated");

                    let response = backend
                        .search_traces(&token, &SearchQuery::default())
                        .await?;
                    check!(response.ok(), "trace search failed: {response:?}");
                    let data: SearchResponse = response.parse()?;
                    check_eq!(data.items.len(), 1, "unexpected trace count");
                    Ok(())
                }
            })
            .await
        })
    })
    .await
}

pub async fn bootstrap_replacement() -> TestResult {
    with_fresh_user(|resources, user| {
        Box::pin(async move {
            let backend = resources.backend().await?;
            let uid = random_token(8);
            start_trace(&backend, &user.token, "test", "step1", &uid, None).await?;
            finish_trace(&backend, &user.token, "test", &uid, "step1", None).await?;

            retry(|| {
                let backend = backend.clone();
                let token = user.token.clone();
                async move {
                    let response = backend
                        .search_traces(&token, &SearchQuery::default())
                        .await?;
                    check!(response.ok(), "trace search failed: {response:?}");
                    let data: SearchResponse = response.parse()?;
                    check_eq!(data.items.len(), 1, "unexpected trace count");

                    let query = SearchQuery::default()
                        .filter("progress_bar_name", FilterOn::eq("test"))
                        .sort_by("name", "desc");
                    let response = backend.search_steps(&token, &query).await?;
                    check!(response.ok(), "step search failed: {response:?}");
                    let data: SearchResponse = response.parse()?;
                    check_eq!(data.items.len(), 2, "unexpected step count");
                    check_eq!(data.items[0]["iterated"], json!(false), "step iterated");
                    Ok(())
                }
            })
            .await?;

            // same trace uid, now iterated: replaces the layout
            start_trace(&backend, &user.token, "test", "step1", &uid, Some(10)).await?;
            finish_trace(&backend, &user.token, "test", &uid, "step1", Some(10)).await?;

            retry(|| {
                let backend = backend.clone();
                let token = user.token.clone();
                async move {
                    let query = SearchQuery::default()
                        .filter("progress_bar_name", FilterOn::eq("test"))
                        .sort_by("name", "desc");
                    let response = backend.search_steps(&token, &query).await?;
                    check!(response.ok(), "step search failed: {response:?}");
                    let data: SearchResponse = response.parse()?;
                    check_eq!(data.items.len(), 2, "unexpected step count");
                    check_eq!(data.items[0]["iterated"], json!(true), "step not iterated");

                    let query = SearchQuery::default().filter("name", FilterOn::eq("test"));
                    let response = backend.search_progress_bars(&token, &query).await?;
                    check!(response.ok(), "bar search failed: {response:?}");
                    let data: SearchResponse = response.parse()?;
                    check_eq!(data.items.len(), 1, "unexpected bar count");
                    check_eq!(data.items[0]["version"], json!(1), "version not bumped");
                    Ok(())
                }
            })
            .await
        })
    })
    .await
}

pub async fn bootstrap_no_steps() -> TestResult {
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

            let uid = random_token(8);
            start_trace(&backend, &user.token, "test", "step1", &uid, Some(10)).await?;
            finish_trace(&backend, &user.token, "test", &uid, "step1", Some(10)).await?;

            retry(|| {
                let backend = backend.clone();
                let token = user.token.clone();
                async move {
                    let query = SearchQuery::default()
                        .filter("progress_bar_name", FilterOn::eq("test"))
                        .sort_by("name", "desc");
                    let response = backend.search_steps(&token, &query).await?;
                    check!(response.ok(), "step search failed: {response:?}");
                    let data: SearchResponse = response.parse()?;
                    check_eq!(data.items.len(), 2, "unexpected step count");

                    let query = SearchQuery::default().filter("name", FilterOn::eq("test"));
                    let response = backend.search_progress_bars(&token, &query).await?;
                    check!(response.ok(), "bar search failed: {response:?}");
                    let data: SearchResponse = response.parse()?;
                    check_eq!(data.items.len(), 1, "unexpected bar count");
                    check_eq!(data.items[0]["version"], json!(1), "version not bumped");

                    let response = backend
                        .search_traces(&token, &SearchQuery::default())
                        .await?;
                    check!(response.ok(), "trace search failed: {response:?}");
                    let data: SearchResponse = response.parse()?;
                    check_eq!(data.items.len(), 1, "unexpected trace count");
                    Ok(())
                }
            })
            .await
        })
    })
    .await
}

pub async fn bootstrap_uses_default_step_config() -> TestResult {
    with_fresh_user(|resources, user| {
        Box::pin(async move {
            let backend = resources.backend().await?;
            let response = backend
                .create_progress_bar(
                    &user.token,
                    &CreateProgressBar {
                        default_step_config: Some(StepConfig::one_off("harmonic_mean")),
                        ..CreateProgressBar::named("test")
                    },
                )
                .await?;
            check!(response.ok(), "bar create failed: {response:?}");

            let uid = random_token(8);
            start_trace(&backend, &user.token, "test", "step1", &uid, None).await?;
            finish_trace(&backend, &user.token, "test", &uid, "step1", None).await?;

            retry(|| {
                let backend = backend.clone();
                let token = user.token.clone();
                async move {
                    let query = SearchQuery::default()
                        .filter("progress_bar_name", FilterOn::eq("test"))
                        .sort_by("name", "desc");
                    let response = backend.search_steps(&token, &query).await?;
                    check!(response.ok(), "step search failed: {response:?}");
                    let data: SearchResponse = response.parse()?;
                    check_eq!(data.items.len(), 2, "unexpected step count");
                    check_eq!(
                        data.items[0]["one_off_technique"],
                        json!("harmonic_mean"),
                        "default step config not applied"
                    );
                    Ok(())
                }
            })
            .await
        })
    })
    .await
}

pub async fn bootstrap_replace_uses_default_step_config() -> TestResult {
    with_fresh_user(|resources, user| {
        Box::pin(async move {
            let backend = resources.backend().await?;
            let response = backend
                .create_progress_bar(
                    &user.token,
                    &CreateProgressBar {
                        default_step_config: Some(StepConfig::one_off("harmonic_mean")),
                        ..CreateProgressBar::named("test")
                    },
                )
                .await?;
            check!(response.ok(), "bar create failed: {response:?}");
            let response = backend
                .create_step(&user.token, "test", "step1", &StepConfig::one_off("percentile"))
                .await?;
            check!(response.ok(), "step create failed: {response:?}");

            // a trace through a different step replaces the layout; the new
            // step takes the bar's default config, not step1's
            let uid = random_token(8);
            start_trace(&backend, &user.token, "test", "step2", &uid, None).await?;
            finish_trace(&backend, &user.token, "test", &uid, "step2", None).await?;

            retry(|| {
                let backend = backend.clone();
                let token = user.token.clone();
                async move {
                    let query = SearchQuery::default()
                        .filter("progress_bar_name", FilterOn::eq("test"))
                        .sort_by("name", "desc");
                    let response = backend.search_steps(&token, &query).await?;
                    check!(response.ok(), "step search failed: {response:?}");
                    let data: SearchResponse = response.parse()?;
                    check_eq!(data.items.len(), 2, "unexpected step count");
                    check_eq!(
                        data.items[0]["one_off_technique"],
                        json!("harmonic_mean"),
                        "default step config not applied"
                    );
                    Ok(())
                }
            })
            .await
        })
    })
    .await
}
