//! CRUD coverage for progress bars.

use serde_json::json;

use super::with_fresh_user;
use crate::api::types::{
    CreateProgressBar, FilterOn, SearchQuery, SearchResponse, UpdateProgressBar,
};
use crate::retry::{retry, TestResult};
use crate::{check, check_eq};

pub async fn valid_defaults() -> TestResult {
    with_fresh_user(|resources, user| {
        Box::pin(async move {
            let backend = resources.backend().await?;
            let response = backend
                .create_progress_bar(&user.token, &CreateProgressBar::named("test"))
                .await?;
            check!(response.ok(), "create failed: {response:?}");
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
                .search_progress_bars(&user.token, &SearchQuery::default())
                .await?;
            check!(response.ok(), "search failed: {response:?}");
            let data: SearchResponse = response.parse()?;
            check!(data.items.is_empty(), "expected no bars: {:?}", data.items);
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
            retry(|| {
                let backend = backend.clone();
                let token = user.token.clone();
                async move {
                    let response = backend
                        .search_progress_bars(&token, &SearchQuery::default())
                        .await?;
                    check!(response.ok(), "search failed: {response:?}");
                    let data: SearchResponse = response.parse()?;
                    check_eq!(data.items.len(), 1, "unexpected bar count");
                    Ok(())
                }
            })
            .await
        })
    })
    .await
}

pub async fn name_filter() -> TestResult {
    with_fresh_user(|resources, user| {
        Box::pin(async move {
            let backend = resources.backend().await?;
            backend
                .create_progress_bar(&user.token, &CreateProgressBar::named("test"))
                .await?;
            retry(|| {
                let backend = backend.clone();
                let token = user.token.clone();
                async move {
                    let query = SearchQuery::default().filter("name", FilterOn::eq("test2"));
                    let response = backend.search_progress_bars(&token, &query).await?;
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

pub async fn name_sort() -> TestResult {
    with_fresh_user(|resources, user| {
        Box::pin(async move {
            let backend = resources.backend().await?;
            backend
                .create_progress_bar(&user.token, &CreateProgressBar::named("test"))
                .await?;
            backend
                .create_progress_bar(&user.token, &CreateProgressBar::named("test2"))
                .await?;
            retry(|| {
                let backend = backend.clone();
                let token = user.token.clone();
                async move {
                    let query = SearchQuery::default().sort_by("name", "desc");
                    let response = backend.search_progress_bars(&token, &query).await?;
                    check!(response.ok(), "search failed: {response:?}");
                    let data: SearchResponse = response.parse()?;
                    check_eq!(data.items.len(), 2, "unexpected bar count");
                    check_eq!(data.items[0]["name"], json!("test2"), "bad sort order");
                    check_eq!(data.items[1]["name"], json!("test"), "bad sort order");
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
                .create_progress_bar(
                    &user.token,
                    &CreateProgressBar {
                        sampling_max_count: Some(100),
                        ..CreateProgressBar::named("test")
                    },
                )
                .await?;
            let response = backend
                .update_progress_bar(
                    &user.token,
                    "test",
                    &UpdateProgressBar {
                        sampling_max_count: Some(75),
                        ..UpdateProgressBar::default()
                    },
                )
                .await?;
            check!(response.ok(), "update failed: {response:?}");
            Ok(())
        })
    })
    .await
}

pub async fn update_nonexistent() -> TestResult {
    with_fresh_user(|resources, user| {
        Box::pin(async move {
            let backend = resources.backend().await?;
            let response = backend
                .update_progress_bar(
                    &user.token,
                    "test",
                    &UpdateProgressBar {
                        sampling_max_count: Some(75),
                        ..UpdateProgressBar::default()
                    },
                )
                .await?;
            check_eq!(response.status.as_u16(), 404, "unexpected status");
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
            let response = backend.delete_progress_bar(&user.token, "test").await?;
            check!(response.ok(), "delete failed: {response:?}");
            Ok(())
        })
    })
    .await
}

pub async fn delete_nonexistent() -> TestResult {
    with_fresh_user(|resources, user| {
        Box::pin(async move {
            let backend = resources.backend().await?;
            let response = backend.delete_progress_bar(&user.token, "test").await?;
            check_eq!(response.status.as_u16(), 404, "unexpected status");
            Ok(())
        })
    })
    .await
}
