//! The integration test inventory.
//!
//! Each submodule covers one backend surface. Tests are plain async
//! functions returning [`TestResult`]; [`all`] collects them into the
//! runner's registry under names that mirror the module paths, so filter
//! patterns like `steps` or `trace_watch::repeated` select whole areas.

pub mod example_job;
pub mod progress_bars;
pub mod steps;
pub mod trace_watch;
pub mod traces;
pub mod user_usages;
pub mod users;

use futures_util::future::BoxFuture;

use crate::api::types::{CreateTrace, TraceStepUpdate};
use crate::api::ApiClient;
use crate::check;
use crate::fixtures::{unix_now, with_user, TestUser};
use crate::resources::Resources;
use crate::retry::TestResult;
use crate::runner::TestCase;

/// Run a test body with a fresh resource registry and a disposable user,
/// tearing both down afterwards.
pub(crate) async fn with_fresh_user<F>(f: F) -> TestResult
where
    F: for<'a> FnOnce(&'a mut Resources, TestUser) -> BoxFuture<'a, TestResult> + Send + 'static,
{
    Resources::scope(|resources| Box::pin(async move { with_user(resources, f).await })).await
}

/// Open a trace, failing the test if the backend refuses it.
pub(crate) async fn start_trace(
    backend: &ApiClient,
    token: &str,
    pbar: &str,
    step: &str,
    uid: &str,
    iterations: Option<u64>,
) -> TestResult {
    let response = backend
        .create_trace(
            token,
            &CreateTrace {
                pbar_name: pbar.to_string(),
                uid: uid.to_string(),
                step_name: step.to_string(),
                iterations,
                now: unix_now(),
            },
        )
        .await?;
    check!(response.ok(), "trace create failed: {response:?}");
    Ok(())
}

/// Mark the trace's step done, failing the test if the backend refuses it.
pub(crate) async fn finish_trace(
    backend: &ApiClient,
    token: &str,
    pbar: &str,
    uid: &str,
    step: &str,
    iteration: Option<u64>,
) -> TestResult {
    let response = backend
        .update_trace_step(
            token,
            &TraceStepUpdate {
                pbar_name: pbar.to_string(),
                trace_uid: uid.to_string(),
                step_name: step.to_string(),
                iteration,
                iterations: iteration,
                done: true,
                now: unix_now(),
            },
        )
        .await?;
    check!(response.ok(), "trace finish failed: {response:?}");
    Ok(())
}

macro_rules! case {
    ($name:literal, $f:path) => {
        TestCase::new($name, || Box::pin($f()))
    };
}

/// Every registered test, in execution order.
pub fn all() -> Vec<TestCase> {
    vec![
        case!(
            "progress_bars::valid_defaults",
            progress_bars::valid_defaults
        ),
        case!("progress_bars::read_empty", progress_bars::read_empty),
        case!("progress_bars::read_one", progress_bars::read_one),
        case!("progress_bars::name_filter", progress_bars::name_filter),
        case!("progress_bars::name_sort", progress_bars::name_sort),
        case!("progress_bars::update_exists", progress_bars::update_exists),
        case!(
            "progress_bars::update_nonexistent",
            progress_bars::update_nonexistent
        ),
        case!("progress_bars::delete_exists", progress_bars::delete_exists),
        case!(
            "progress_bars::delete_nonexistent",
            progress_bars::delete_nonexistent
        ),
        case!("steps::valid_defaults", steps::valid_defaults),
        case!("steps::already_exists", steps::already_exists),
        case!("steps::nonexistent_pbar", steps::nonexistent_pbar),
        case!("steps::read_empty", steps::read_empty),
        case!("steps::read_one", steps::read_one),
        case!("steps::pbar_filter", steps::pbar_filter),
        case!("steps::pbar_sort", steps::pbar_sort),
        case!("steps::update_exists", steps::update_exists),
        case!(
            "steps::update_nonexistent_pbar",
            steps::update_nonexistent_pbar
        ),
        case!(
            "steps::update_nonexistent_step",
            steps::update_nonexistent_step
        ),
        case!("steps::update_default_step", steps::update_default_step),
        case!("steps::delete_exists", steps::delete_exists),
        case!(
            "steps::delete_nonexistent_pbar",
            steps::delete_nonexistent_pbar
        ),
        case!(
            "steps::delete_nonexistent_step",
            steps::delete_nonexistent_step
        ),
        case!("steps::delete_default_step", steps::delete_default_step),
        case!("traces::bootstrap", traces::bootstrap),
        case!(
            "traces::bootstrap_iterated_step",
            traces::bootstrap_iterated_step
        ),
        case!(
            "traces::bootstrap_replacement",
            traces::bootstrap_replacement
        ),
        case!("traces::bootstrap_no_steps", traces::bootstrap_no_steps),
        case!(
            "traces::bootstrap_uses_default_step_config",
            traces::bootstrap_uses_default_step_config
        ),
        case!(
            "traces::bootstrap_replace_uses_default_step_config",
            traces::bootstrap_replace_uses_default_step_config
        ),
        case!("trace_watch::watch_no_trace", trace_watch::watch_no_trace),
        case!(
            "trace_watch::watch_before_create",
            trace_watch::watch_before_create
        ),
        case!(
            "trace_watch::create_before_watch",
            trace_watch::create_before_watch
        ),
        case!(
            "trace_watch::watch_before_create_no_bar",
            trace_watch::watch_before_create_no_bar
        ),
        case!(
            "trace_watch::repeated_create_before_watch",
            trace_watch::repeated_create_before_watch
        ),
        case!(
            "trace_watch::one_off_technique_matrix",
            trace_watch::one_off_technique_matrix
        ),
        case!(
            "trace_watch::iterated_technique_matrix",
            trace_watch::iterated_technique_matrix
        ),
        case!(
            "trace_watch::iterated_varied_lengths_matrix",
            trace_watch::iterated_varied_lengths_matrix
        ),
        case!("user_usages::search_empty", user_usages::search_empty),
        case!("user_usages::search_one", user_usages::search_one),
        case!(
            "user_usages::search_one_no_invoice",
            user_usages::search_one_no_invoice
        ),
        case!("user_usages::search_many", user_usages::search_many),
        case!("user_usages::current_empty", user_usages::current_empty),
        case!("user_usages::current_one", user_usages::current_one),
        case!("users::new_user_has_tier", users::new_user_has_tier),
        case!("example_job::get_result", example_job::get_result),
        case!(
            "example_job::get_result_concurrently",
            example_job::get_result_concurrently
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn registered_names_are_unique() {
        let cases = all();
        let names: HashSet<_> = cases.iter().map(|c| c.name).collect();
        assert_eq!(names.len(), cases.len());
    }
}
