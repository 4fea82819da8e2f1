//! Lazily-populated registry of external connections.
//!
//! Each accessor creates its connection on first use and memoizes it;
//! [`Resources::close`] releases everything that was opened, and
//! [`Resources::scope`] guarantees the close runs even when the body errors
//! out. After initialization the registry is read-mostly and is never
//! partially invalidated.

use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::api::ApiClient;
use crate::config;
use crate::db::RqliteClient;
use crate::error::HarnessError;
use crate::jobs::Jobs;
use crate::redisx;
use crate::retry::TestResult;
use crate::slack::SlackClient;
use crate::ws::TraceWatch;

#[derive(Default)]
pub struct Resources {
    db: Option<Arc<RqliteClient>>,
    redis_master: Option<redis::Client>,
    redis: Option<redis::aio::MultiplexedConnection>,
    jobs: Option<Jobs>,
    slack: Option<Arc<SlackClient>>,
    backend: Option<Arc<ApiClient>>,
    frontend: Option<Arc<ApiClient>>,
    websocket_base_url: Option<String>,
}

impl Resources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run a body against a fresh registry, closing every opened resource
    /// on the way out regardless of the outcome.
    pub async fn scope<T, F>(f: F) -> TestResult<T>
    where
        F: for<'a> FnOnce(&'a mut Resources) -> BoxFuture<'a, TestResult<T>>,
    {
        let mut resources = Resources::new();
        let result = f(&mut resources).await;
        resources.close().await;
        result
    }

    /// The rqlite cluster, addressed via `RQLITE_IPS`.
    pub async fn db(&mut self) -> Result<Arc<RqliteClient>, HarnessError> {
        if let Some(db) = &self.db {
            return Ok(db.clone());
        }
        let hosts = config::required_list("RQLITE_IPS")?;
        let client = Arc::new(RqliteClient::new(hosts));
        self.db = Some(client.clone());
        Ok(client)
    }

    async fn master(&mut self) -> Result<&redis::Client, HarnessError> {
        let client = match self.redis_master.take() {
            Some(client) => client,
            None => {
                let hosts = config::required_list("REDIS_IPS")?;
                redisx::master_client(&hosts).await?
            }
        };
        Ok(&*self.redis_master.insert(client))
    }

    /// The main Redis connection, discovered through sentinel.
    pub async fn redis(&mut self) -> Result<redis::aio::MultiplexedConnection, HarnessError> {
        if let Some(conn) = &self.redis {
            return Ok(conn.clone());
        }
        let conn = self
            .master()
            .await?
            .get_multiplexed_async_connection()
            .await?;
        self.redis = Some(conn.clone());
        Ok(conn)
    }

    /// A dedicated pub/sub connection. Not memoized: a pub/sub connection
    /// cannot be shared with command traffic, and subscribers own theirs.
    pub async fn pubsub(&mut self) -> Result<redis::aio::PubSub, HarnessError> {
        Ok(self.master().await?.get_async_pubsub().await?)
    }

    /// The job queue producer, backed by the main Redis connection.
    pub async fn jobs(&mut self) -> Result<Jobs, HarnessError> {
        if let Some(jobs) = &self.jobs {
            return Ok(jobs.clone());
        }
        let jobs = Jobs::new(self.redis().await?);
        self.jobs = Some(jobs.clone());
        Ok(jobs)
    }

    /// The operator alerting channel (`SLACK_WEB_HOOK_URL`).
    pub async fn slack(&mut self) -> Result<Arc<SlackClient>, HarnessError> {
        if let Some(slack) = &self.slack {
            return Ok(slack.clone());
        }
        let url = config::required("SLACK_WEB_HOOK_URL")?;
        let slack = Arc::new(SlackClient::new(url));
        self.slack = Some(slack.clone());
        Ok(slack)
    }

    /// HTTP client for the backend (`ROOT_BACKEND_URL`).
    pub async fn backend(&mut self) -> Result<Arc<ApiClient>, HarnessError> {
        if let Some(backend) = &self.backend {
            return Ok(backend.clone());
        }
        let url = config::required("ROOT_BACKEND_URL")?;
        let client = Arc::new(ApiClient::new(url));
        self.backend = Some(client.clone());
        Ok(client)
    }

    /// HTTP client for the frontend (`ROOT_FRONTEND_URL`).
    pub async fn frontend(&mut self) -> Result<Arc<ApiClient>, HarnessError> {
        if let Some(frontend) = &self.frontend {
            return Ok(frontend.clone());
        }
        let url = config::required("ROOT_FRONTEND_URL")?;
        let client = Arc::new(ApiClient::new(url));
        self.frontend = Some(client.clone());
        Ok(client)
    }

    /// Open a new websocket connection to the given path on
    /// `ROOT_WEBSOCKET_URL`. Each call dials a fresh socket; the caller
    /// owns its lifetime.
    pub async fn websocket(&mut self, path: &str) -> Result<TraceWatch, HarnessError> {
        let base_url = match &self.websocket_base_url {
            Some(url) => url.clone(),
            None => {
                let url = config::required("ROOT_WEBSOCKET_URL")?;
                self.websocket_base_url = Some(url.clone());
                url
            }
        };
        TraceWatch::connect(&base_url, path).await
    }

    /// Release every opened resource. Connections here are independent of
    /// each other, so teardown order does not matter.
    pub async fn close(&mut self) {
        self.jobs = None;
        self.redis = None;
        self.redis_master = None;
        self.db = None;
        self.slack = None;
        self.backend = None;
        self.frontend = None;
        self.websocket_base_url = None;
        tracing::debug!("resources closed");
    }
}
