//! Manual fixture seeding for staging users.

use std::time::Duration;

use clap::{Parser, Subcommand};
use serde_json::json;

use pbar_itests::api::types::{CreateTrace, TraceStepUpdate};
use pbar_itests::check;
use pbar_itests::fixtures::{random_token, seed_user_usage, unix_now};
use pbar_itests::{HarnessError, Resources, TestResult};

#[derive(Parser)]
#[command(name = "fixture-cli")]
#[command(about = "Seed billing history or traces for a specific user", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Seed invoiced usage rows over a range of past billing periods
    BillingHistory {
        /// Sub of the user to configure
        #[arg(short, long)]
        sub: String,

        /// Most recent period to seed, in months before now
        #[arg(short = 'b', long, default_value_t = 0)]
        months_ago_start: u32,

        /// Oldest period to seed, in months before now
        #[arg(short = 'e', long, default_value_t = 2)]
        months_ago_end: u32,
    },
    /// Drive complete traces through the backend as the user
    AddTraces {
        /// Sub of the user to configure
        #[arg(short, long)]
        sub: String,

        /// Number of traces to create
        #[arg(short, long, default_value_t = 10)]
        num_traces: u32,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    match cli.command {
        Commands::BillingHistory {
            sub,
            months_ago_start,
            months_ago_end,
        } => {
            Resources::scope(|resources| {
                Box::pin(async move {
                    for months_ago in months_ago_start..=months_ago_end {
                        let usage = seed_user_usage(resources, &sub, months_ago, true).await?;
                        println!(
                            "seeded usage {} ({} traces, {} months ago)",
                            usage.uid, usage.traces, months_ago
                        );
                    }
                    Ok(())
                })
            })
            .await?;
        }
        Commands::AddTraces { sub, num_traces } => {
            Resources::scope(|resources| {
                Box::pin(async move { add_traces(resources, &sub, num_traces).await })
            })
            .await?;
        }
    }
    Ok(())
}

/// Mint a short-lived token for the user, drive `num` complete traces
/// through the backend with it, then remove the token again.
async fn add_traces(resources: &mut Resources, sub: &str, num: u32) -> TestResult {
    let db = resources.db().await?;
    let found = db
        .query("SELECT 1 FROM users WHERE sub = ?", vec![json!(sub)])
        .await?;
    if found.values.as_deref().unwrap_or_default().is_empty() {
        return Err(HarnessError::Fixture(format!("user with sub {sub} not found")).into());
    }

    let token_uid = format!("ep_ut_uid_{}", random_token(16));
    let token = format!("ep_ut_{}", random_token(48));
    let now = unix_now();
    db.execute(
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
    )
    .await?;

    let backend = resources.backend().await?;
    let result: TestResult = async {
        for created in 1..=num {
            let uid = random_token(8);
            let response = backend
                .create_trace(
                    &token,
                    &CreateTrace {
                        pbar_name: "test".to_string(),
                        uid: uid.clone(),
                        step_name: "step1".to_string(),
                        iterations: None,
                        now: unix_now(),
                    },
                )
                .await?;
            check!(response.ok(), "trace create failed: {response:?}");

            let response = backend
                .update_trace_step(
                    &token,
                    &TraceStepUpdate {
                        pbar_name: "test".to_string(),
                        trace_uid: uid,
                        step_name: "step1".to_string(),
                        iteration: None,
                        iterations: None,
                        done: true,
                        now: unix_now(),
                    },
                )
                .await?;
            check!(response.ok(), "trace finish failed: {response:?}");

            println!("created trace {created}/{num}");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        Ok(())
    }
    .await;

    // remove the minted token even when trace creation failed
    let teardown = db
        .execute(
            "DELETE FROM user_tokens WHERE user_tokens.uid = ?",
            vec![json!(token_uid)],
        )
        .await;

    result?;
    teardown?;
    Ok(())
}
