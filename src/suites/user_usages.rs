//! Billing history search and the current-period counter.

use super::{finish_trace, start_trace, with_fresh_user};
use crate::api::types::{CurrentUsage, SearchQuery, SearchResponse};
use crate::fixtures::{random_token, seed_user_usage};
use crate::retry::TestResult;
use crate::{check, check_eq};

pub async fn search_empty() -> TestResult {
    with_fresh_user(|resources, user| {
        Box::pin(async move {
            let backend = resources.backend().await?;
            let response = backend
                .search_user_usages(&user.token, &SearchQuery::default())
                .await?;
            check!(response.ok(), "search failed: {response:?}");
            let data: SearchResponse = response.parse()?;
            check!(data.items.is_empty(), "expected no usages: {:?}", data.items);
            Ok(())
        })
    })
    .await
}

pub async fn search_one() -> TestResult {
    with_fresh_user(|resources, user| {
        Box::pin(async move {
            seed_user_usage(resources, &user.sub, 13, true).await?;
            let backend = resources.backend().await?;
            let response = backend
                .search_user_usages(&user.token, &SearchQuery::default())
                .await?;
            check!(response.ok(), "search failed: {response:?}");
            let data: SearchResponse = response.parse()?;
            check_eq!(data.items.len(), 1, "unexpected usage count");
            Ok(())
        })
    })
    .await
}

pub async fn search_one_no_invoice() -> TestResult {
    with_fresh_user(|resources, user| {
        Box::pin(async move {
            seed_user_usage(resources, &user.sub, 13, false).await?;
            let backend = resources.backend().await?;
            let response = backend
                .search_user_usages(&user.token, &SearchQuery::default())
                .await?;
            check!(response.ok(), "search failed: {response:?}");
            let data: SearchResponse = response.parse()?;
            check_eq!(data.items.len(), 1, "unexpected usage count");
            Ok(())
        })
    })
    .await
}

pub async fn search_many() -> TestResult {
    with_fresh_user(|resources, user| {
        Box::pin(async move {
            for months_ago in 1..25 {
                seed_user_usage(resources, &user.sub, months_ago, true).await?;
            }
            let backend = resources.backend().await?;
            let response = backend
                .search_user_usages(&user.token, &SearchQuery::default())
                .await?;
            check!(response.ok(), "search failed: {response:?}");
            let data: SearchResponse = response.parse()?;
            check_eq!(data.items.len(), 24, "unexpected usage count");
            Ok(())
        })
    })
    .await
}

pub async fn current_empty() -> TestResult {
    with_fresh_user(|resources, user| {
        Box::pin(async move {
            let backend = resources.backend().await?;
            let response = backend.get_current_usage(&user.token).await?;
            check!(response.ok(), "read failed: {response:?}");
            let usage: CurrentUsage = response.parse()?;
            check_eq!(usage.traces, 0, "unexpected trace count");
            Ok(())
        })
    })
    .await
}

pub async fn current_one() -> TestResult {
    with_fresh_user(|resources, user| {
        Box::pin(async move {
            let backend = resources.backend().await?;
            let uid = random_token(8);
            start_trace(&backend, &user.token, "test", "step1", &uid, None).await?;
            finish_trace(&backend, &user.token, "test", &uid, "step1", None).await?;

            let response = backend.get_current_usage(&user.token).await?;
            check!(response.ok(), "read failed: {response:?}");
            let usage: CurrentUsage = response.parse()?;
            check_eq!(usage.traces, 1, "unexpected trace count");
            Ok(())
        })
    })
    .await
}
