//! End-to-end pass through the demo job: enqueue over HTTP, watch the
//! resulting trace over the websocket, then poll the stored result.

use std::time::{Duration, Instant};

use crate::api::types::{CreateExampleJob, ExampleJobCreated, ExampleJobStatus};
use crate::check;
use crate::resources::Resources;
use crate::retry::{TestError, TestResult};

const WATCH_PATH: &str = "/api/2/progress_bars/traces/";

pub async fn get_result() -> TestResult {
    Resources::scope(|resources| Box::pin(async move { run_one_job(resources).await })).await
}

/// Two jobs at once; the backend must keep the traces apart.
pub async fn get_result_concurrently() -> TestResult {
    tokio::try_join!(get_result(), get_result())?;
    Ok(())
}

async fn run_one_job(resources: &mut Resources) -> TestResult {
    let backend = resources.backend().await?;
    let started = Instant::now();

    let response = backend
        .create_example_job(&CreateExampleJob {
            duration: 5,
            stdev: 1,
        })
        .await?;
    check!(response.ok(), "job create failed: {response:?}");
    let job: ExampleJobCreated = response.parse()?;

    let mut ws = resources.websocket(WATCH_PATH).await?;
    let ack = ws.subscribe(&job.sub, &job.pbar_name, &job.uid).await?;
    check!(ack.success, "subscribe rejected: {ack:?}");

    loop {
        let update = ws.next_update_within(Duration::from_secs(30)).await?;
        check!(update.kind == "update", "unexpected frame: {update:?}");
        if update.done {
            break;
        }
    }
    ws.close().await;

    let response = backend.get_example_job(&job.uid).await?;
    check!(response.ok(), "job read failed: {response:?}");
    let status: ExampleJobStatus = response.parse()?;
    check!(
        status.status == "complete",
        "job not complete after done frame: {status:?}"
    );
    let data = status
        .data
        .ok_or_else(|| TestError::Assertion("complete job with no data".to_string()))?;
    check!(
        data["number"].is_i64() || data["number"].is_u64(),
        "unexpected result payload: {data:?}"
    );

    let elapsed = started.elapsed();
    check!(
        elapsed > Duration::from_millis(50),
        "job finished suspiciously fast: {elapsed:?}"
    );
    check!(
        elapsed < Duration::from_secs(10),
        "job took too long: {elapsed:?}"
    );
    Ok(())
}
