//! CRUD coverage for explicitly managed steps, including the protections
//! around each bar's implicit default step.

use serde_json::json;

use super::with_fresh_user;
use crate::api::types::{CreateProgressBar, FilterOn, SearchQuery, SearchResponse, StepConfig};
use crate::retry::{retry, TestResult};
use crate::{check, check_eq};

pub async fn valid_defaults() -> TestResult {
    with_fresh_user(|resources, user| {
        Box::pin(async move {
            let backend = resources.backend().await?;
            backend
                .create_progress_bar(&user.token, &CreateProgressBar::named("test"))
                .await?;
            let response = backend
                .create_step(&user.token, "test", "step1", &StepConfig::default())
                .await?;
            check!(response.ok(), "create failed: {response:?}");
            Ok(())
        })
    })
    .await
}

pub async fn already_exists() -> TestResult {
    with_fresh_user(|resources, user| {
        Box::pin(async move {
            let backend = resources.backend().await?;
            backend
                .create_progress_bar(&user.token, &CreateProgressBar::named("test"))
                .await?;
            backend
                .create_step(&user.token, "test", "step1", &StepConfig::default())
                .await?;
            let response = backend
                .create_step(&user.token, "test", "step1", &StepConfig::default())
                .await?;
            check_eq!(response.status.as_u16(), 409, "unexpected status");
            Ok(())
        })
    })
    .await
}

pub async fn nonexistent_pbar() -> TestResult {
    with_fresh_user(|resources, user| {
        Box::pin(async move {
            let backend = resources.backend().await?;
            let response = backend
                .create_step(&user.token, "test", "step1", &StepConfig::default())
                .await?;
            check_eq!(response.status.as_u16(), 404, "unexpected status");
            Ok(())
        })
    })
    .await
}

pub async fn read_empty() -> TestResult {
    with_fresh_user(|resources, user| {
        Box::pin(async move {
            let backend = resources.backend().await?;
            let response = backend
                .search_steps(&user.token, &SearchQuery::default())
                .await?;
            check!(response.ok(), "search failed: {response:?}");
            let data: SearchResponse = response.parse()?;
            check!(data.items.is_empty(), "expected no steps: {:?}", data.items);
            check!(
                data.next_page_sort.is_none(),
                "expected no next page: {:?}",
                data.next_page_sort
            );
            Ok(())
        })
    })
    .await
}

pub async fn read_one() -> TestResult {
    with_fresh_user(|resources, user| {
        Box::pin(async move {
            let backend = resources.backend().await?;
            backend
                .create_progress_bar(&user.token, &CreateProgressBar::named("test"))
                .await?;
            backend
                .create_step(&user.token, "test", "step1", &StepConfig::default())
                .await?;
            retry(|| {
                let backend = backend.clone();
                let token = user.token.clone();
                async move {
                    let response = backend.search_steps(&token, &SearchQuery::default()).await?;
                    check!(response.ok(), "search failed: {response:?}");
                    let data: SearchResponse = response.parse()?;
                    check_eq!(data.items.len(), 1, "unexpected step count");
                    Ok(())
                }
            })
            .await
        })
    })
    .await
}

pub async fn pbar_filter() -> TestResult {
    with_fresh_user(|resources, user| {
        Box::pin(async move {
            let backend = resources.backend().await?;
            backend
                .create_progress_bar(&user.token, &CreateProgressBar::named("test"))
                .await?;
            backend
                .create_step(&user.token, "test", "step1", &StepConfig::default())
                .await?;
            retry(|| {
                let backend = backend.clone();
                let token = user.token.clone();
                async move {
                    let query = SearchQuery::default()
                        .filter("progress_bar_name", FilterOn::eq("test2"));
                    let response = backend.search_steps(&token, &query).await?;
                    check!(response.ok(), "search failed: {response:?}");
                    let data: SearchResponse = response.parse()?;
                    check!(
                        data.items.is_empty(),
                        "filter matched unexpectedly: {:?}",
                        data.items
                    );
                    Ok(())
                }
            })
            .await
        })
    })
    .await
}

pub async fn pbar_sort() -> TestResult {
    with_fresh_user(|resources, user| {
        Box::pin(async move {
            let backend = resources.backend().await?;
            for name in ["test", "test2"] {
                backend
                    .create_progress_bar(&user.token, &CreateProgressBar::named(name))
                    .await?;
                backend
                    .create_step(&user.token, name, "step1", &StepConfig::default())
                    .await?;
            }
            retry(|| {
                let backend = backend.clone();
                let token = user.token.clone();
                async move {
                    let query = SearchQuery::default().sort_by("progress_bar_name", "desc");
                    let response = backend.search_steps(&token, &query).await?;
                    check!(response.ok(), "search failed: {response:?}");
                    let data: SearchResponse = response.parse()?;
                    // step1 plus the default step, per bar
                    check_eq!(data.items.len(), 4, "unexpected step count");
                    check_eq!(
                        data.items[0]["progress_bar_name"],
                        json!("test2"),
                        "bad sort order"
                    );
                    check_eq!(
                        data.items[3]["progress_bar_name"],
                        json!("test"),
                        "bad sort order"
                    );
                    Ok(())
                }
            })
            .await
        })
    })
    .await
}

pub async fn update_exists() -> TestResult {
    with_fresh_user(|resources, user| {
        Box::pin(async move {
            let backend = resources.backend().await?;
            backend
                .create_progress_bar(&user.token, &CreateProgressBar::named("test"))
                .await?;
            backend
                .create_step(&user.token, "test", "step1", &StepConfig::one_off("percentile"))
                .await?;
            let response = backend
                .update_step(
                    &user.token,
                    "test",
                    "step1",
                    &StepConfig::one_off("arithmetic_mean"),
                )
                .await?;
            check!(response.ok(), "update failed: {response:?}");
            Ok(())
        })
    })
    .await
}

pub async fn update_nonexistent_pbar() -> TestResult {
    with_fresh_user(|resources, user| {
        Box::pin(async move {
            let backend = resources.backend().await?;
            let response = backend
                .update_step(
                    &user.token,
                    "test",
                    "step1",
                    &StepConfig::one_off("arithmetic_mean"),
                )
                .await?;
            check_eq!(response.status.as_u16(), 404, "unexpected status");
            check_eq!(
                response.error_type(),
                Some("pbar_not_found"),
                "unexpected error type"
            );
            Ok(())
        })
    })
    .await
}

pub async fn update_nonexistent_step() -> TestResult {
    with_fresh_user(|resources, user| {
        Box::pin(async move {
            let backend = resources.backend().await?;
            backend
                .create_progress_bar(&user.token, &CreateProgressBar::named("test"))
                .await?;
            let response = backend
                .update_step(
                    &user.token,
                    "test",
                    "step1",
                    &StepConfig::one_off("arithmetic_mean"),
                )
                .await?;
            check_eq!(response.status.as_u16(), 404, "unexpected status");
            check_eq!(
                response.error_type(),
                Some("step_not_found"),
                "unexpected error type"
            );
            Ok(())
        })
    })
    .await
}

pub async fn update_default_step() -> TestResult {
    with_fresh_user(|resources, user| {
        Box::pin(async move {
            let backend = resources.backend().await?;
            backend
                .create_progress_bar(&user.token, &CreateProgressBar::named("test"))
                .await?;
            let response = backend
                .update_step(
                    &user.token,
                    "test",
                    "default",
                    &StepConfig::one_off("arithmetic_mean"),
                )
                .await?;
            check_eq!(response.status.as_u16(), 409, "unexpected status");
            check_eq!(
                response.error_type(),
                Some("cannot_edit_default_step"),
                "unexpected error type"
            );
            Ok(())
        })
    })
    .await
}

pub async fn delete_exists() -> TestResult {
    with_fresh_user(|resources, user| {
        Box::pin(async move {
            let backend = resources.backend().await?;
            backend
                .create_progress_bar(&user.token, &CreateProgressBar::named("test"))
                .await?;
            backend
                .create_step(&user.token, "test", "step1", &StepConfig::default())
                .await?;
            let response = backend.delete_step(&user.token, "test", "step1").await?;
            check!(response.ok(), "delete failed: {response:?}");
            Ok(())
        })
    })
    .await
}

pub async fn delete_nonexistent_pbar() -> TestResult {
    with_fresh_user(|resources, user| {
        Box::pin(async move {
            let backend = resources.backend().await?;
            let response = backend.delete_step(&user.token, "test", "step1").await?;
            check_eq!(response.status.as_u16(), 404, "unexpected status");
            check_eq!(
                response.error_type(),
                Some("pbar_not_found"),
                "unexpected error type"
            );
            Ok(())
        })
    })
    .await
}

pub async fn delete_nonexistent_step() -> TestResult {
    with_fresh_user(|resources, user| {
        Box::pin(async move {
            let backend = resources.backend().await?;
            backend
                .create_progress_bar(&user.token, &CreateProgressBar::named("test"))
                .await?;
            let response = backend.delete_step(&user.token, "test", "step1").await?;
            check_eq!(response.status.as_u16(), 404, "unexpected status");
            check_eq!(
                response.error_type(),
                Some("step_not_found"),
                "unexpected error type"
            );
            Ok(())
        })
    })
    .await
}

pub async fn delete_default_step() -> TestResult {
    with_fresh_user(|resources, user| {
        Box::pin(async move {
            let backend = resources.backend().await?;
            backend
                .create_progress_bar(&user.token, &CreateProgressBar::named("test"))
                .await?;
            let response = backend.delete_step(&user.token, "test", "default").await?;
            check_eq!(response.status.as_u16(), 409, "unexpected status");
            check_eq!(
                response.error_type(),
                Some("cannot_delete_default_step"),
                "unexpected error type"
            );
            Ok(())
        })
    })
    .await
}
