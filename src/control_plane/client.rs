//! Discovery-brain-side HTTP client for the execution server — §4.10.
//!
//! Posts `TradeSignal`s to `/execute` with exponential-backoff retry on
//! connection failure (the execution server may still be starting up),
//! and separately exposes a WebSocket reader for pushed `WsEvent`s.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, warn};

use super::events::WsEvent;

const MAX_RETRIES: u32 = 5;
const INITIAL_BACKOFF: Duration = Duration::from_millis(250);

pub struct ExecutionClient {
    http: reqwest::Client,
    base_url: String,
}

impl ExecutionClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { http: reqwest::Client::new(), base_url: base_url.into() }
    }

    /// POST a signal to `/execute`, retrying connection failures with
    /// exponential backoff. A non-2xx response is returned as-is (not
    /// retried) since it reflects a pipeline rejection, not a transient
    /// network failure.
    pub async fn submit_signal(&self, signal: &crate::signal::TradeSignal) -> anyhow::Result<serde_json::Value> {
        let url = format!("{}/execute", self.base_url);
        let mut backoff = INITIAL_BACKOFF;

        for attempt in 0..=MAX_RETRIES {
            match self.http.post(&url).json(signal).send().await {
                Ok(response) => {
                    let body: serde_json::Value = response.json().await?;
                    return Ok(body);
                }
                Err(e) if attempt < MAX_RETRIES => {
                    warn!(attempt, error = %e, "execute request failed, retrying");
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
                Err(e) => return Err(e.into()),
            }
        }
        unreachable!("loop always returns within MAX_RETRIES + 1 iterations")
    }

    /// Connect to the execution server's WebSocket event stream and
    /// forward decoded `WsEvent`s to `on_event` until the connection
    /// closes or `on_event` returns `false`.
    pub async fn stream_events(
        &self,
        ws_url: &str,
        mut on_event: impl FnMut(WsEvent) -> bool,
    ) -> anyhow::Result<()> {
        let (stream, _) = tokio_tungstenite::connect_async(ws_url).await?;
        let (mut write, mut read) = stream.split();

        while let Some(message) = read.next().await {
            match message? {
                WsMessage::Text(text) => match serde_json::from_str::<WsEvent>(&text) {
                    Ok(event) => {
                        if !on_event(event) {
                            break;
                        }
                    }
                    Err(e) => debug!(error = %e, "unrecognized websocket event"),
                },
                WsMessage::Ping(payload) => {
                    let _ = write.send(WsMessage::Pong(payload)).await;
                }
                WsMessage::Close(_) => break,
                _ => {}
            }
        }
        Ok(())
    }
}
