//! Typed client for the backend HTTP API.
//!
//! Endpoints live under the versioned `/api/1` prefix and use bearer-token
//! authorization with JSON bodies. Responses are captured as status plus
//! parsed body so tests can assert on either: the backend reports errors as
//! `{"type": ...}` bodies with a matching status code.

pub mod types;

use reqwest::header::AUTHORIZATION;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::HarnessError;
use types::*;

/// A captured backend response: status code plus parsed JSON body.
#[derive(Debug)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl ApiResponse {
    /// Whether the status is in the 200 class.
    pub fn ok(&self) -> bool {
        self.status.is_success()
    }

    /// The backend's error discriminator, when the body carries one.
    pub fn error_type(&self) -> Option<&str> {
        self.body.get("type").and_then(Value::as_str)
    }

    /// Deserialize the body into a concrete type.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, HarnessError> {
        Ok(serde_json::from_value(self.body.clone())?)
    }
}

/// Client bound to one HTTP base URL (backend or frontend).
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        token: Option<&str>,
        body: Option<Value>,
    ) -> Result<ApiResponse, HarnessError> {
        let mut request = self.http.request(method, format!("{}{path}", self.base_url));
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(token) = token {
            request = request.header(AUTHORIZATION, format!("bearer {token}"));
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        let body = if text.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };
        Ok(ApiResponse { status, body })
    }

    async fn post_json<B: Serialize>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        token: &str,
        body: &B,
    ) -> Result<ApiResponse, HarnessError> {
        self.request(
            Method::POST,
            path,
            query,
            Some(token),
            Some(serde_json::to_value(body)?),
        )
        .await
    }

    // --- progress bars ---

    pub async fn create_progress_bar(
        &self,
        token: &str,
        body: &CreateProgressBar,
    ) -> Result<ApiResponse, HarnessError> {
        self.post_json("/api/1/progress_bars/", &[], token, body).await
    }

    pub async fn update_progress_bar(
        &self,
        token: &str,
        name: &str,
        body: &UpdateProgressBar,
    ) -> Result<ApiResponse, HarnessError> {
        self.request(
            Method::PUT,
            "/api/1/progress_bars/",
            &[("name", name)],
            Some(token),
            Some(serde_json::to_value(body)?),
        )
        .await
    }

    pub async fn delete_progress_bar(
        &self,
        token: &str,
        name: &str,
    ) -> Result<ApiResponse, HarnessError> {
        self.request(
            Method::DELETE,
            "/api/1/progress_bars/",
            &[("name", name)],
            Some(token),
            None,
        )
        .await
    }

    pub async fn search_progress_bars(
        &self,
        token: &str,
        query: &SearchQuery,
    ) -> Result<ApiResponse, HarnessError> {
        self.post_json("/api/1/progress_bars/search", &[], token, query)
            .await
    }

    // --- steps ---

    pub async fn create_step(
        &self,
        token: &str,
        pbar_name: &str,
        step_name: &str,
        config: &StepConfig,
    ) -> Result<ApiResponse, HarnessError> {
        self.post_json(
            "/api/1/progress_bars/steps/",
            &[("pbar_name", pbar_name), ("step_name", step_name)],
            token,
            config,
        )
        .await
    }

    pub async fn update_step(
        &self,
        token: &str,
        pbar_name: &str,
        step_name: &str,
        config: &StepConfig,
    ) -> Result<ApiResponse, HarnessError> {
        self.request(
            Method::PUT,
            "/api/1/progress_bars/steps/",
            &[("pbar_name", pbar_name), ("step_name", step_name)],
            Some(token),
            Some(serde_json::to_value(config)?),
        )
        .await
    }

    pub async fn delete_step(
        &self,
        token: &str,
        pbar_name: &str,
        step_name: &str,
    ) -> Result<ApiResponse, HarnessError> {
        self.request(
            Method::DELETE,
            "/api/1/progress_bars/steps/",
            &[("pbar_name", pbar_name), ("step_name", step_name)],
            Some(token),
            None,
        )
        .await
    }

    pub async fn search_steps(
        &self,
        token: &str,
        query: &SearchQuery,
    ) -> Result<ApiResponse, HarnessError> {
        self.post_json("/api/1/progress_bars/steps/search", &[], token, query)
            .await
    }

    // --- traces ---

    pub async fn create_trace(
        &self,
        token: &str,
        body: &CreateTrace,
    ) -> Result<ApiResponse, HarnessError> {
        self.post_json("/api/1/progress_bars/traces/", &[], token, body)
            .await
    }

    pub async fn update_trace_step(
        &self,
        token: &str,
        body: &TraceStepUpdate,
    ) -> Result<ApiResponse, HarnessError> {
        self.post_json("/api/1/progress_bars/traces/steps/", &[], token, body)
            .await
    }

    pub async fn search_traces(
        &self,
        token: &str,
        query: &SearchQuery,
    ) -> Result<ApiResponse, HarnessError> {
        self.post_json("/api/1/progress_bars/traces/search", &[], token, query)
            .await
    }

    // --- usage and pricing ---

    pub async fn search_user_usages(
        &self,
        token: &str,
        query: &SearchQuery,
    ) -> Result<ApiResponse, HarnessError> {
        self.post_json("/api/1/user_usages/search", &[], token, query)
            .await
    }

    pub async fn get_current_usage(&self, token: &str) -> Result<ApiResponse, HarnessError> {
        self.request(
            Method::GET,
            "/api/1/user_usages/get_current",
            &[],
            Some(token),
            None,
        )
        .await
    }

    pub async fn search_pricing_plan_tiers(
        &self,
        token: &str,
        query: &SearchQuery,
    ) -> Result<ApiResponse, HarnessError> {
        self.post_json("/api/1/users/pricing_plans/tiers/search", &[], token, query)
            .await
    }

    // --- example job (unauthenticated demo endpoint) ---

    pub async fn create_example_job(
        &self,
        body: &CreateExampleJob,
    ) -> Result<ApiResponse, HarnessError> {
        self.request(
            Method::POST,
            "/api/1/examples/job",
            &[],
            None,
            Some(serde_json::to_value(body)?),
        )
        .await
    }

    pub async fn get_example_job(&self, uid: &str) -> Result<ApiResponse, HarnessError> {
        self.request(Method::GET, "/api/1/examples/job", &[("uid", uid)], None, None)
            .await
    }
}
