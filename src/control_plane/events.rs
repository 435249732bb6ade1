//! Server-pushed WebSocket events — §4.8, §6 "WebSocket events".

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum WsEvent {
    #[serde(rename = "connected")]
    Connected { stats_url: String },
    #[serde(rename = "paper_execution")]
    PaperExecution { tx_hash: Option<String>, expected_profit: f64, timestamp: DateTime<Utc> },
    #[serde(rename = "live_execution")]
    LiveExecution { tx_hash: String, expected_profit: f64, timestamp: DateTime<Utc> },
    #[serde(rename = "execution_result")]
    ExecutionResult { success: bool, stage: Option<String>, timestamp: DateTime<Utc> },
    #[serde(rename = "error")]
    Error { stage: Option<String>, reason: String, timestamp: DateTime<Utc> },
    #[serde(rename = "pong")]
    Pong,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum WsClientMessage {
    #[serde(rename = "ping")]
    Ping,
}
