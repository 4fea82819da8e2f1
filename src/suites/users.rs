//! Pricing plan coverage.

use super::with_fresh_user;
use crate::api::types::{SearchQuery, SearchResponse};
use crate::check;
use crate::retry::TestResult;

pub async fn new_user_has_tier() -> TestResult {
    with_fresh_user(|resources, user| {
        Box::pin(async move {
            let backend = resources.backend().await?;
            let response = backend
                .search_pricing_plan_tiers(&user.token, &SearchQuery::default())
                .await?;
            check!(response.ok(), "search failed: {response:?}");
            let data: SearchResponse = response.parse()?;
            check!(
                !data.items.is_empty(),
                "new user has no pricing plan tiers: {:?}",
                data.items
            );
            Ok(())
        })
    })
    .await
}
