//! Execution server HTTP + WebSocket control plane — §4.10, §6.
//!
//! Router shape follows the pack's axum services: a CORS-wrapped
//! `Router` with a shared `AppState`, health/stats/metrics endpoints, and
//! a WebSocket route that pushes `WsEvent`s to every connected client
//! with a replay buffer for late subscribers.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::execution::{ExecutionPipeline, PipelineOutcome};
use crate::signal::TradeSignal;
use crate::stats::ExecutionStats;

use super::events::{WsClientMessage, WsEvent};

const EVENT_REPLAY_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    pipeline: ExecutionPipeline,
    stats: ExecutionStats,
    prometheus: PrometheusHandle,
    event_tx: broadcast::Sender<WsEvent>,
    replay: Mutex<Vec<WsEvent>>,
}

impl AppState {
    pub fn new(pipeline: ExecutionPipeline, stats: ExecutionStats, prometheus: PrometheusHandle) -> Self {
        let (event_tx, _) = broadcast::channel(1024);
        Self { inner: Arc::new(AppStateInner { pipeline, stats, prometheus, event_tx, replay: Mutex::new(Vec::new()) }) }
    }

    fn publish(&self, event: WsEvent) {
        let mut replay = self.inner.replay.lock();
        replay.push(event.clone());
        if replay.len() > EVENT_REPLAY_CAPACITY {
            let excess = replay.len() - EVENT_REPLAY_CAPACITY;
            replay.drain(0..excess);
        }
        drop(replay);
        let _ = self.inner.event_tx.send(event);
    }
}

pub async fn serve(host: &str, port: u16, state: AppState) -> anyhow::Result<()> {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    let app = Router::new()
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/metrics", get(metrics))
        .route("/execute", post(execute))
        .route("/execute/batch", post(execute_batch))
        .route("/simulate", post(simulate))
        .route("/", get(ws_upgrade))
        .layer(cors)
        .with_state(state);

    let addr = format!("{host}:{port}");
    info!(%addr, "execution server listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.inner.stats.snapshot())
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let body = state.inner.prometheus.render();
    ([(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")], body)
}

async fn execute(State(state): State<AppState>, Json(signal): Json<TradeSignal>) -> impl IntoResponse {
    let outcome = state.inner.pipeline.run(signal).await;
    let (status, body) = outcome_response(&outcome);
    state.publish(outcome_to_event(&outcome));
    (status, Json(body))
}

async fn execute_batch(
    State(state): State<AppState>,
    Json(signals): Json<Vec<TradeSignal>>,
) -> impl IntoResponse {
    let mut results = Vec::with_capacity(signals.len());
    for signal in signals {
        let outcome = state.inner.pipeline.run(signal).await;
        let (_, body) = outcome_response(&outcome);
        state.publish(outcome_to_event(&outcome));
        results.push(body);
    }
    Json(results)
}

async fn simulate(State(state): State<AppState>, Json(signal): Json<TradeSignal>) -> impl IntoResponse {
    match state.inner.pipeline.simulate_only(&signal).await {
        Ok(outcome) => (
            axum::http::StatusCode::OK,
            Json(serde_json::json!({
                "success": outcome.success,
                "revertReason": outcome.revert_reason,
                "gasUsedEstimate": outcome.gas_used_estimate,
            })),
        ),
        Err(e) => (
            axum::http::StatusCode::UNPROCESSABLE_ENTITY,
            Json(serde_json::json!({ "success": false, "stage": e.stage(), "reason": e.to_string() })),
        ),
    }
}

fn outcome_response(outcome: &PipelineOutcome) -> (axum::http::StatusCode, serde_json::Value) {
    use axum::http::StatusCode;
    match outcome {
        PipelineOutcome::Paper { expected_profit_usd, gas_used_estimate } => (
            StatusCode::OK,
            serde_json::json!({
                "success": true,
                "mode": "paper",
                "expectedProfitUsd": expected_profit_usd.to_string(),
                "gasUsedEstimate": gas_used_estimate,
            }),
        ),
        PipelineOutcome::Live { tx_hash, bundle } => (
            StatusCode::OK,
            serde_json::json!({
                "success": true,
                "mode": "live",
                "txHash": tx_hash,
                "targetBlock": bundle.target_block,
            }),
        ),
        PipelineOutcome::Rejected { stage, reason } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            serde_json::json!({ "success": false, "stage": stage, "reason": reason }),
        ),
    }
}

fn outcome_to_event(outcome: &PipelineOutcome) -> WsEvent {
    let timestamp = chrono::Utc::now();
    match outcome {
        PipelineOutcome::Paper { expected_profit_usd, .. } => WsEvent::PaperExecution {
            tx_hash: None,
            expected_profit: expected_profit_usd.to_string().parse().unwrap_or(0.0),
            timestamp,
        },
        PipelineOutcome::Live { tx_hash, .. } => {
            WsEvent::LiveExecution { tx_hash: tx_hash.clone(), expected_profit: 0.0, timestamp }
        }
        PipelineOutcome::Rejected { stage, reason } => {
            WsEvent::Error { stage: (*stage).map(str::to_string), reason: reason.clone(), timestamp }
        }
    }
}

async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| ws_session(socket, state))
}

async fn ws_session(mut socket: WebSocket, state: AppState) {
    let stats_url = "/stats".to_string();
    let connected = serde_json::to_string(&WsEvent::Connected { stats_url }).unwrap_or_default();
    if socket.send(Message::Text(connected.into())).await.is_err() {
        return;
    }

    let replay = state.inner.replay.lock().clone();
    for event in replay {
        let json = serde_json::to_string(&event).unwrap_or_default();
        if socket.send(Message::Text(json.into())).await.is_err() {
            return;
        }
    }

    let mut rx = state.inner.event_tx.subscribe();
    loop {
        tokio::select! {
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        if let Ok(WsClientMessage::Ping) = serde_json::from_str(&text) {
                            let pong = serde_json::to_string(&WsEvent::Pong).unwrap_or_default();
                            if socket.send(Message::Text(pong.into())).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        warn!(error = %e, "websocket recv error");
                        break;
                    }
                    _ => {}
                }
            }
            event = rx.recv() => {
                match event {
                    Ok(event) => {
                        let json = serde_json::to_string(&event).unwrap_or_default();
                        if socket.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(missed = n, "websocket subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
}
