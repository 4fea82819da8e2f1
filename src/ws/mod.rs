//! Websocket client for watching a progress bar trace.
//!
//! Protocol: the client sends one subscribe message naming the owner sub,
//! bar and trace uid; the server acknowledges with `{"success": ...}` and
//! then streams `{"type": "update", "done": ..., "data": ...}` frames until
//! a frame arrives with `done: true`.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::error::HarnessError;

#[derive(Debug, Serialize)]
struct SubscribeRequest<'a> {
    sub: &'a str,
    progress_bar_name: &'a str,
    progress_bar_trace_uid: &'a str,
}

/// Server acknowledgment of a subscribe request.
#[derive(Debug, Deserialize)]
pub struct AckFrame {
    pub success: bool,
}

/// Fields of an update frame's `data` object the tests care about.
#[derive(Debug, Deserialize)]
pub struct UpdateData {
    #[serde(default)]
    pub step_name: Option<String>,

    #[serde(default)]
    pub overall_eta_seconds: Option<f64>,

    #[serde(default)]
    pub step_overall_eta_seconds: Option<f64>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// One streamed update frame.
#[derive(Debug, Deserialize)]
pub struct UpdateFrame {
    #[serde(rename = "type")]
    pub kind: String,
    pub done: bool,
    pub data: UpdateData,
}

/// An open watch connection to `/api/2/progress_bars/traces/`.
pub struct TraceWatch {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl TraceWatch {
    /// Dial the websocket server at `base_url` + `path`.
    pub async fn connect(base_url: &str, path: &str) -> Result<Self, HarnessError> {
        let url = format!("{}{path}", base_url.trim_end_matches('/'));
        let (stream, _) = connect_async(&url).await?;
        Ok(Self { stream })
    }

    /// Send the subscribe message and read the acknowledgment frame.
    pub async fn subscribe(
        &mut self,
        sub: &str,
        progress_bar_name: &str,
        trace_uid: &str,
    ) -> Result<AckFrame, HarnessError> {
        let payload = serde_json::to_string(&SubscribeRequest {
            sub,
            progress_bar_name,
            progress_bar_trace_uid: trace_uid,
        })?;
        self.stream.send(Message::text(payload)).await?;
        let text = self.next_text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Read the next update frame.
    pub async fn next_update(&mut self) -> Result<UpdateFrame, HarnessError> {
        let text = self.next_text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Read the next update frame, failing if it does not arrive in time.
    pub async fn next_update_within(
        &mut self,
        timeout: Duration,
    ) -> Result<UpdateFrame, HarnessError> {
        tokio::time::timeout(timeout, self.next_update())
            .await
            .map_err(|_| HarnessError::Timeout(timeout, "websocket update frame".to_string()))?
    }

    async fn next_text(&mut self) -> Result<String, HarnessError> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(text.to_string()),
                // pings are answered by the library on the next flush
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => continue,
                Some(Ok(Message::Binary(_))) => continue,
                Some(Ok(Message::Close(_))) | None => return Err(HarnessError::WebSocketClosed),
                Some(Err(e)) => return Err(e.into()),
            }
        }
    }

    /// Close the connection. Errors on close are ignored; the server may
    /// already have gone away.
    pub async fn close(mut self) {
        let _ = self.stream.close(None).await;
    }
}
