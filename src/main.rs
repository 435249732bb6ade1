//! Discovery brain entrypoint — §4.1-§4.7, §5 "Process model".
//!
//! Connects to every configured chain, builds the token/DEX registry and
//! opportunity graph, then runs the scan loop until SIGINT/SIGTERM,
//! forwarding every `TradeSignal` it emits to the execution server.

use std::sync::Arc;

use futures::stream::StreamExt;
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook_tokio::Signals;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use xarb_core::advisory::{AdvisoryLayer, ExecutionParams, MevProtectionLevel};
use xarb_core::chains::ChainProviderRegistry;
use xarb_core::config::{load_config, load_registries};
use xarb_core::control_plane::ExecutionClient;
use xarb_core::graph::TokenGraph;
use xarb_core::pricing::{CurvePoolRegistry, CurveQuoter, UniV2Quoter, UniV3Quoter};
use xarb_core::scan::{HopQuoters, ScanConfig, ScanOrchestrator};
use xarb_core::stats::ExecutionStats;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .json()
        .init();

    info!("discovery brain starting");

    let config = load_config()?;
    let registries = Arc::new(load_registries()?);
    let chains = ChainProviderRegistry::connect(config.chains.clone()).await?;
    let graph = Arc::new(TokenGraph::build(&registries));

    info!(
        chains = chains.configured_count(),
        tokens = graph.node_count(),
        bridges = graph.edge_count(),
        "registries and graph built"
    );

    let quoters = HopQuoters {
        v2: Arc::new(UniV2Quoter::new(chains.clone())),
        v3: Arc::new(UniV3Quoter::new(chains.clone())),
        curve: Arc::new(CurveQuoter::new(chains.clone(), CurvePoolRegistry::default())),
    };

    let advisory = AdvisoryLayer::null(ExecutionParams {
        priority_fee_gwei: rust_decimal::Decimal::new(15, 1),
        slippage_bps: config.max_slippage_bps,
        deadline_seconds: 60,
        mev_protection_level: MevProtectionLevel::PrivateRelay,
    });

    let stats = ExecutionStats::new();
    let (signal_tx, mut signal_rx) = mpsc::channel(1024);

    let scan_config = ScanConfig {
        worker_width: config.scan_worker_width,
        scan_interval: std::time::Duration::from_millis(config.scan_interval_ms),
        tiers: std::collections::HashMap::new(),
        trade_size_sweep_usd: config.trade_size_sweep_usd.clone(),
        max_base_fee_gwei: config.max_base_fee_gwei,
        max_slippage_bps: config.max_slippage_bps,
        min_profit_usd: config.min_profit_usd,
        loan_cap_fraction: xarb_core::profitability::DEFAULT_LOAN_CAP_FRACTION,
        min_loan_usd: xarb_core::profitability::DEFAULT_MIN_LOAN_USD,
        aave_fee_bps: rust_decimal::Decimal::from(9),
    };

    let orchestrator =
        Arc::new(ScanOrchestrator::new(chains, registries, graph, quoters, advisory, stats, signal_tx, scan_config));

    let cancel = CancellationToken::new();

    let signals = Signals::new(&[SIGINT, SIGTERM])?;
    let signal_handle = signals.handle();
    let shutdown_cancel = cancel.clone();
    let signal_task = tokio::spawn(async move {
        let mut signals = signals;
        if signals.next().await.is_some() {
            warn!("shutdown signal received, cancelling scan loop");
            shutdown_cancel.cancel();
        }
    });

    let scan_task = {
        let orchestrator = orchestrator.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { orchestrator.run(cancel).await })
    };

    let execution_base_url =
        format!("http://{}:{}", config.execution_host, config.execution_port);
    let client = ExecutionClient::new(execution_base_url);
    let forward_cancel = cancel.clone();
    let forward_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                maybe_signal = signal_rx.recv() => {
                    match maybe_signal {
                        Some(signal) => {
                            if let Err(e) = client.submit_signal(&signal).await {
                                error!(error = %e, "failed to forward signal to execution server");
                            }
                        }
                        None => break,
                    }
                }
                _ = forward_cancel.cancelled() => break,
            }
        }
    });

    scan_task.await?;
    forward_task.await?;
    signal_handle.close();
    signal_task.await?;

    info!("discovery brain shut down cleanly");
    Ok(())
}
