//! Job queue producer.
//!
//! The backend's workers consume JSON job payloads from a Redis list; the
//! harness only ever enqueues. Payload shape: `{"name": ..., "kwargs": ...}`.

use redis::AsyncCommands;
use serde::Serialize;
use serde_json::Value;

use crate::error::HarnessError;

/// Key of the hot job queue.
pub const QUEUE_KEY: &str = "jobs:hot";

#[derive(Debug, Serialize)]
struct JobPayload<'a> {
    name: &'a str,
    kwargs: &'a Value,
}

/// Producer half of the backend's job queue.
#[derive(Clone)]
pub struct Jobs {
    conn: redis::aio::MultiplexedConnection,
}

impl Jobs {
    pub fn new(conn: redis::aio::MultiplexedConnection) -> Self {
        Self { conn }
    }

    /// Queue a job by name with keyword arguments.
    pub async fn enqueue(&mut self, name: &str, kwargs: &Value) -> Result<(), HarnessError> {
        let payload = serde_json::to_string(&JobPayload { name, kwargs })?;
        let _: () = self.conn.rpush(QUEUE_KEY, payload).await?;
        tracing::debug!(job = name, "queued job");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn payload_shape_matches_worker_contract() {
        let kwargs = json!({"duration": 5});
        let payload = serde_json::to_value(JobPayload {
            name: "example",
            kwargs: &kwargs,
        })
        .unwrap();
        assert_eq!(payload, json!({"name": "example", "kwargs": {"duration": 5}}));
    }
}
