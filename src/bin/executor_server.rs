//! Execution server entrypoint — §4.9, §4.10, §5 "Process model".
//!
//! Runs the seven-stage execution pipeline behind the HTTP + WebSocket
//! control plane. A single process, single `ExecutionPipeline` instance;
//! concurrency within it is bounded by `MAX_CONCURRENT_TXS` at the HTTP
//! layer via a semaphore-backed middleware in a future iteration — for
//! now the pipeline itself serializes nonce issuance per chain.

use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::info;

use xarb_core::advisory::{AdvisoryLayer, ExecutionParams, MevProtectionLevel};
use xarb_core::chains::ChainProviderRegistry;
use xarb_core::config::load_config;
use xarb_core::control_plane::{serve, AppState};
use xarb_core::execution::ExecutionPipeline;
use xarb_core::stats::ExecutionStats;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .json()
        .init();

    let prometheus = PrometheusBuilder::new().install_recorder()?;

    let config = load_config()?;
    info!(mode = ?config.execution_mode, "execution server starting");

    let chains = ChainProviderRegistry::connect(config.chains.clone()).await?;

    let advisory = AdvisoryLayer::null(ExecutionParams {
        priority_fee_gwei: rust_decimal::Decimal::new(15, 1),
        slippage_bps: config.max_slippage_bps,
        deadline_seconds: 60,
        mev_protection_level: MevProtectionLevel::PrivateRelay,
    });

    let stats = ExecutionStats::new();
    let pipeline = ExecutionPipeline::new(chains, &config, advisory, stats.clone());
    let state = AppState::new(pipeline, stats, prometheus);

    serve(&config.execution_host, config.execution_port, state).await?;

    Ok(())
}
