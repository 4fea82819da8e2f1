//! End-to-end integration harness for the progress bar backend.
//!
//! Everything here runs against a live deployment: tests exercise the
//! backend over HTTP and websockets, seed their own fixtures directly in
//! rqlite, and re-run automatically whenever a component redeploys.

// External connections
pub mod api;
pub mod config;
pub mod db;
pub mod jobs;
pub mod redisx;
pub mod resources;
pub mod slack;
pub mod ws;

// Test machinery
pub mod error;
pub mod fixtures;
pub mod retry;
pub mod runner;
pub mod suites;
pub mod updater;

pub use error::HarnessError;
pub use resources::Resources;
pub use retry::{retry, TestError, TestResult};
