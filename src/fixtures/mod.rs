//! Disposable test fixtures seeded directly into the database.
//!
//! A [`TestUser`] is a transient identity: a random sub, a bearer token and
//! a membership in the public pricing plan, inserted before a test and
//! deleted afterwards (user rows cascade). Usage rows for past billing
//! periods can be seeded alongside, optionally joined to a fake invoice.

use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{Datelike, Utc};
use futures_util::future::BoxFuture;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde_json::json;

use crate::db::Statement;
use crate::error::HarnessError;
use crate::resources::Resources;
use crate::retry::TestResult;

/// Seconds since the unix epoch, fractional.
pub fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// A random url-safe token of `len` characters.
pub fn random_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// A user created for testing purposes.
#[derive(Debug, Clone)]
pub struct TestUser {
    /// The sub of the generated user, acts as its universal id.
    pub sub: String,
    /// The bearer token used to authenticate as them.
    pub token: String,
}

/// Insert a fresh user with a valid token and the public pricing plan.
pub async fn create_user(resources: &mut Resources) -> Result<TestUser, HarnessError> {
    let sub = format!("test_{}", random_token(8));
    let token = format!("ep_ut_{}", random_token(48));
    let token_uid = format!("ep_ut_uid_{}", random_token(16));
    let plan_uid = format!("ep_upp_{}", random_token(16));
    let now = unix_now();

    let db = resources.db().await?;
    db.execute_many(&[
        Statement::new(
            "INSERT INTO users (sub, created_at) VALUES (?, ?)",
            vec![json!(sub), json!(now)],
        ),
        Statement::new(
            "INSERT INTO user_tokens (
                user_id, uid, token, name, created_at, expires_at
            ) SELECT
                users.id, ?, ?, ?, ?, ?
            FROM users WHERE users.sub = ?",
            vec![
                json!(token_uid),
                json!(token),
                json!("test"),
                json!(now),
                json!(now + 3600.0),
                json!(sub),
            ],
        ),
        Statement::new(
            "INSERT INTO user_pricing_plans (uid, user_id, pricing_plan_id)
            SELECT ?, users.id, pricing_plans.id
            FROM users
            JOIN pricing_plans ON pricing_plans.slug = ?
            WHERE users.sub = ?
              AND NOT EXISTS (
                SELECT 1 FROM user_pricing_plans
                WHERE user_pricing_plans.user_id = users.id
              )",
            vec![json!(plan_uid), json!("public"), json!(sub)],
        ),
    ])
    .await?;

    Ok(TestUser { sub, token })
}

/// Remove a test user and everything hanging off their row.
pub async fn delete_user(resources: &mut Resources, user: &TestUser) -> Result<(), HarnessError> {
    let db = resources.db().await?;
    db.execute("DELETE FROM users WHERE sub = ?", vec![json!(user.sub)])
        .await?;
    Ok(())
}

/// Create a user, run the body, and delete the user even when the body
/// fails. The body's error wins over a teardown error.
pub async fn with_user<T, F>(resources: &mut Resources, f: F) -> TestResult<T>
where
    F: for<'a> FnOnce(&'a mut Resources, TestUser) -> BoxFuture<'a, TestResult<T>>,
{
    let user = create_user(resources).await?;
    let result = f(resources, user.clone()).await;
    let teardown = delete_user(resources, &user).await;
    match result {
        Err(e) => Err(e),
        Ok(value) => {
            teardown?;
            Ok(value)
        }
    }
}

/// Description of a seeded usage row.
#[derive(Debug, Clone)]
pub struct UserUsage {
    pub user_sub: String,
    pub uid: String,
    pub hosted_invoice_url: Option<String>,
    pub period_start: f64,
    pub period_end: f64,
    pub traces: i64,
    pub cost: Option<i64>,
}

/// First instant of the calendar month `months_ago` months before now
/// (UTC), plus the first instant of the following month.
fn billing_period(months_ago: u32) -> Result<(f64, f64), HarnessError> {
    let now = Utc::now();
    let month0 = (now.year() * 12 + now.month() as i32 - 1) - months_ago as i32;
    let (year, month) = (month0.div_euclid(12), month0.rem_euclid(12) as u32 + 1);
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };

    let start = chrono::NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| HarnessError::Fixture(format!("invalid period start {year}-{month}")))?;
    let end = chrono::NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| HarnessError::Fixture(format!("invalid period end {next_year}-{next_month}")))?;

    Ok((
        start.and_utc().timestamp() as f64,
        end.and_utc().timestamp() as f64,
    ))
}

/// Seed a usage row for the billing period `months_ago` months back, with
/// a random trace count and, optionally, an attached invoice.
pub async fn seed_user_usage(
    resources: &mut Resources,
    user_sub: &str,
    months_ago: u32,
    has_invoice: bool,
) -> Result<UserUsage, HarnessError> {
    let usage_uid = random_token(8);
    let (period_start, period_end) = billing_period(months_ago)?;
    let traces = rand::thread_rng().gen_range(1..=10_000);
    let cost = rand::thread_rng().gen_range(100..=10_000);
    let hosted_invoice_url = format!("https://example.com/{usage_uid}");

    let db = resources.db().await?;
    if has_invoice {
        let stripe_uid = random_token(8);
        let stripe_id = random_token(8);
        db.execute_many(&[
            Statement::new(
                "INSERT INTO stripe_invoices (
                    uid, stripe_id, hosted_invoice_url, total, created_at
                ) VALUES (?, ?, ?, ?, ?)",
                vec![
                    json!(stripe_uid),
                    json!(stripe_id),
                    json!(hosted_invoice_url),
                    json!(cost),
                    json!(unix_now()),
                ],
            ),
            Statement::new(
                "INSERT INTO user_usages (
                    uid, user_id, traces, period_started_at, period_ended_at,
                    stripe_invoice_id
                ) SELECT
                    ?, users.id, ?, ?, ?, stripe_invoices.id
                FROM users
                JOIN stripe_invoices ON stripe_invoices.uid = ?
                WHERE users.sub = ?",
                vec![
                    json!(usage_uid),
                    json!(traces),
                    json!(period_start),
                    json!(period_end),
                    json!(stripe_uid),
                    json!(user_sub),
                ],
            ),
        ])
        .await?;
    } else {
        db.execute(
            "INSERT INTO user_usages (
                uid, user_id, traces, period_started_at, period_ended_at
            ) SELECT
                ?, users.id, ?, ?, ?
            FROM users WHERE users.sub = ?",
            vec![
                json!(usage_uid),
                json!(traces),
                json!(period_start),
                json!(period_end),
                json!(user_sub),
            ],
        )
        .await?;
    }

    Ok(UserUsage {
        user_sub: user_sub.to_string(),
        uid: usage_uid,
        hosted_invoice_url: has_invoice.then_some(hosted_invoice_url),
        period_start,
        period_end,
        traces,
        cost: has_invoice.then_some(cost),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_tokens_have_requested_length_and_differ() {
        let a = random_token(16);
        let b = random_token(16);
        assert_eq!(a.len(), 16);
        assert_ne!(a, b);
    }

    #[test]
    fn billing_period_spans_one_month() {
        let (start, end) = billing_period(1).unwrap();
        assert!(start < end);
        let days = (end - start) / 86_400.0;
        assert!((28.0..=31.0).contains(&days), "got {days} days");
        assert!(end <= unix_now());
    }

    #[test]
    fn billing_period_handles_year_boundaries() {
        // 13 months ago always lands in the previous year
        let (start, _) = billing_period(13).unwrap();
        let (later, _) = billing_period(1).unwrap();
        assert!(start < later);
    }
}
