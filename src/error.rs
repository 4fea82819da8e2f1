//! Error types shared across the harness.

use crate::config::ConfigError;

/// Infrastructure-level failure: anything that went wrong talking to an
/// external dependency rather than an assertion about backend behavior.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("rqlite returned an error: {0}")]
    Database(String),

    #[error("all rqlite hosts failed, last error: {0}")]
    DatabaseUnavailable(String),

    #[error("fixture error: {0}")]
    Fixture(String),

    #[error("websocket closed before the expected frame arrived")]
    WebSocketClosed,

    #[error("timed out after {0:?} waiting for {1}")]
    Timeout(std::time::Duration, String),
}
