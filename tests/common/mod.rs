use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use pbar_itests::runner::TestCase;

/// A one-test suite factory whose executions are counted, so loop tests can
/// observe how many passes ran.
pub fn counting_suite(counter: Arc<AtomicUsize>) -> impl Fn() -> Vec<TestCase> + Send + 'static {
    move || {
        let counter = counter.clone();
        vec![TestCase::new("probe::count", move || {
            let counter = counter.clone();
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        })]
    }
}
