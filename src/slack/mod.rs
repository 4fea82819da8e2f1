//! Operator alerting over a Slack-style incoming webhook.

use serde_json::json;

use crate::error::HarnessError;

/// Client for the operator notification channel.
pub struct SlackClient {
    http: reqwest::Client,
    webhook_url: String,
}

impl SlackClient {
    pub fn new(webhook_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            webhook_url,
        }
    }

    /// Post a plain text note.
    pub async fn send_message(&self, text: &str) -> Result<(), HarnessError> {
        let response = self
            .http
            .post(&self.webhook_url)
            .json(&json!({ "text": text }))
            .send()
            .await?;
        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), "slack webhook rejected message");
        }
        Ok(())
    }

    /// Post a failure note: a summary line plus the full trace in a code
    /// block so it survives Slack formatting.
    pub async fn send_failure(&self, summary: &str, trace: &str) -> Result<(), HarnessError> {
        self.send_message(&format!("{summary}\n```\n{trace}\n```"))
            .await
    }
}
