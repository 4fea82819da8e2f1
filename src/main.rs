//! Integration test harness for the progress bar backend.
//!
//! By default the process runs the full suite once, reports the outcome to
//! the operator channel, and then keeps watching the `updates:<component>`
//! topics, re-running the suite after every deploy (with an idle-timeout
//! fallback so a missed notification cannot stall it forever). `--once`
//! runs a single pass and exits with a matching status code.

use clap::Parser;
use regex::Regex;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pbar_itests::config::UpdaterConfig;
use pbar_itests::{suites, updater};

#[derive(Parser)]
#[command(name = "pbar-itests")]
#[command(about = "End-to-end integration tests for the progress bar backend", long_about = None)]
struct Cli {
    /// Run the selected tests once and exit instead of watching for deploys
    #[arg(long)]
    once: bool,

    /// Only run tests whose name matches this regex (repeatable)
    #[arg(short, long = "filter")]
    filter: Vec<String>,

    /// Print the registered test names and exit
    #[arg(long)]
    list: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pbar_itests=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    if cli.list {
        for case in suites::all() {
            println!("{}", case.name);
        }
        return Ok(());
    }

    let patterns = cli
        .filter
        .iter()
        .map(|p| Regex::new(p))
        .collect::<Result<Vec<_>, _>>()?;

    if cli.once {
        let result = updater::run_once(&suites::all, &patterns).await;
        updater::report(&result).await;
        match result {
            Ok(run) => {
                tracing::info!(
                    executed = run.executed,
                    skipped = run.skipped,
                    elapsed_secs = run.duration.as_secs_f64(),
                    "suite passed"
                );
            }
            Err(failure) => {
                tracing::error!(
                    test = failure.test,
                    error = %failure.error,
                    executed = failure.executed,
                    "suite failed"
                );
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    let config = UpdaterConfig::from_env()?;
    tracing::info!(
        idle_timeout_secs = config.idle_timeout.as_secs(),
        debounce_ms = config.debounce.as_millis() as u64,
        components = ?config.components,
        "watching for deploys"
    );

    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(updater::relay_updates(config.topics(), tx));
    updater::run_forever(suites::all, config, patterns, rx).await;
    Ok(())
}
