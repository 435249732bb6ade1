//! End-to-end pipeline scenarios — §8 Scenarios A-F.
//!
//! Scenarios A-E drive a real `ExecutionPipeline` against local Anvil
//! nodes (no fork, no network dependency beyond the `anvil` binary).
//! Scenario F exercises the scan loop's cancellation path directly,
//! without standing up a full process and signal delivery.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use alloy::node_bindings::Anvil;
use alloy::primitives::{Address, Bytes};
use alloy::providers::{Provider, ProviderBuilder};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use xarb_core::advisory::{AdvisoryLayer, ExecutionParams, MevProtectionLevel};
use xarb_core::chains::ChainProviderRegistry;
use xarb_core::config::{EngineConfig, ExecutionMode, RelayConfig};
use xarb_core::execution::pipeline::{ExecutionPipeline, PipelineOutcome};
use xarb_core::graph::TokenGraph;
use xarb_core::pricing::{CurvePoolRegistry, CurveQuoter, UniV2Quoter, UniV3Quoter};
use xarb_core::registry::Registries;
use xarb_core::scan::{HopQuoters, ScanConfig, ScanOrchestrator};
use xarb_core::signal::TradeSignal;
use xarb_core::stats::ExecutionStats;
use xarb_core::types::{ChainDescriptor, FlashLoanSource, GasPricingMode};

fn chain_descriptor(chain_id: u64, rpc_url: String, execution_enabled: bool) -> ChainDescriptor {
    ChainDescriptor {
        chain_id,
        name: format!("chain-{chain_id}"),
        rpc_url,
        rpc_url_backup: None,
        ws_url: None,
        native_symbol: "ETH".into(),
        gas_pricing_mode: GasPricingMode::Eip1559,
        block_time_hint_ms: 1,
        execution_enabled,
    }
}

fn base_config(chains: Vec<ChainDescriptor>, single_enabled_chain: u64, mode: ExecutionMode) -> EngineConfig {
    EngineConfig {
        execution_mode: mode,
        execution_host: "127.0.0.1".into(),
        execution_port: 0,
        chains,
        single_enabled_chain,
        executor_addresses: HashMap::new(),
        private_key: None,
        min_profit_usd: dec!(5),
        max_slippage_bps: 50,
        max_base_fee_gwei: Decimal::from(500),
        max_concurrent_txs: 3,
        gas_limit_multiplier: dec!(1.2),
        breaker_threshold: 10,
        breaker_cooldown_secs: 2,
        relay: RelayConfig { auth_token: None, hmac_secret: None, tls_cert_path: None, tls_key_path: None },
        scan_worker_width: 20,
        scan_interval_ms: 2_000,
        trade_size_sweep_usd: vec![dec!(1000)],
        tier2_symbols: Vec::new(),
        catboost_model_path: None,
        hf_model_path: None,
        ml_model_path: None,
        self_learning_data_path: None,
        model_cache_dir: None,
        enable_realtime_training: false,
    }
}

fn advisory() -> AdvisoryLayer {
    AdvisoryLayer::null(ExecutionParams {
        priority_fee_gwei: dec!(1.5),
        slippage_bps: 50,
        deadline_seconds: 60,
        mev_protection_level: MevProtectionLevel::PrivateRelay,
    })
}

fn valid_signal(chain_id: u64, token: Address) -> TradeSignal {
    TradeSignal {
        chain_id,
        token,
        amount: "1000000000".into(),
        flash_source: FlashLoanSource::BalancerV3,
        protocols: vec![1],
        routers: vec![Address::repeat_byte(9)],
        path: vec![Address::repeat_byte(8)],
        extras: vec!["0x".into()],
        expected_profit: 12.50,
    }
}

/// Scenario A — PAPER intra-chain rejected on calldata size.
#[tokio::test]
async fn scenario_a_paper_oversized_calldata_rejected_at_build() {
    let anvil = Anvil::new().chain_id(137).spawn();
    let descriptor = chain_descriptor(137, anvil.endpoint(), true);
    let chains = ChainProviderRegistry::connect(vec![descriptor]).await.unwrap();

    let mut config = base_config(vec![], 137, ExecutionMode::Paper);
    config.executor_addresses.insert(137, anvil.addresses()[1]);

    let stats = ExecutionStats::new();
    let pipeline = ExecutionPipeline::new(chains, &config, advisory(), stats.clone());

    let mut signal = valid_signal(137, Address::repeat_byte(1));
    signal.extras = vec![format!("0x{}", "00".repeat(40_000))];

    let outcome = pipeline.run(signal).await;
    match outcome {
        PipelineOutcome::Rejected { stage, reason } => {
            assert_eq!(stage, Some("build"));
            assert!(reason.contains("32000") || reason.contains("32 000") || reason.contains("calldata"));
        }
        other => panic!("expected Rejected, got {other:?}"),
    }
    // Gate/build rejections count toward `failed` but never the breaker streak.
    assert_eq!(stats.snapshot().failed, 1);
    assert_eq!(stats.consecutive_failures(), 0);
}

/// Scenario B — LIVE rejected because the chain gate disables chain 1.
#[tokio::test]
async fn scenario_b_live_rejected_by_chain_gate() {
    let anvil_137 = Anvil::new().chain_id(137).spawn();
    let anvil_1 = Anvil::new().chain_id(1).spawn();

    let chains = ChainProviderRegistry::connect(vec![
        chain_descriptor(137, anvil_137.endpoint(), true),
        chain_descriptor(1, anvil_1.endpoint(), false),
    ])
    .await
    .unwrap();

    let mut config = base_config(vec![], 137, ExecutionMode::Live);
    config.executor_addresses.insert(1, anvil_1.addresses()[1]);
    config.private_key = Some(hex::encode(anvil_137.keys()[0].to_bytes()));

    let stats = ExecutionStats::new();
    let pipeline = ExecutionPipeline::new(chains, &config, advisory(), stats.clone());

    let signal = valid_signal(1, Address::repeat_byte(1));
    let outcome = pipeline.run(signal).await;

    match outcome {
        PipelineOutcome::Rejected { stage, reason } => {
            assert_eq!(stage, Some("chain-gate"));
            assert!(reason.contains("disabled"));
        }
        other => panic!("expected Rejected, got {other:?}"),
    }
    assert_eq!(stats.snapshot().failed, 1);
    assert_eq!(stats.consecutive_failures(), 0, "gate failures must not arm the breaker");
}

/// Scenario C — PAPER happy path: simulation succeeds, no tx ever leaves
/// the process, and profit/gas figures pass through unchanged.
#[tokio::test]
async fn scenario_c_paper_happy_path() {
    let anvil = Anvil::new().chain_id(137).spawn();
    let executor = anvil.addresses()[1];
    let chains =
        ChainProviderRegistry::connect(vec![chain_descriptor(137, anvil.endpoint(), true)]).await.unwrap();

    let mut config = base_config(vec![], 137, ExecutionMode::Paper);
    config.executor_addresses.insert(137, executor);

    let stats = ExecutionStats::new();
    let pipeline = ExecutionPipeline::new(chains, &config, advisory(), stats.clone());

    let signal = valid_signal(137, Address::repeat_byte(1));
    let outcome = pipeline.run(signal).await;

    match outcome {
        PipelineOutcome::Paper { expected_profit_usd, .. } => {
            assert_eq!(expected_profit_usd, dec!(12.50));
        }
        other => panic!("expected Paper, got {other:?}"),
    }
    let snapshot = stats.snapshot();
    assert_eq!(snapshot.paper_executed, 1);
    assert_eq!(snapshot.cumulative_profit_usd, "12.50");
}

/// Scenario D — LIVE happy path: signing, single-leaf Merkle bundle, and a
/// tx hash come back (via the public-mempool fallback, since no relay
/// endpoint is configured in this harness).
#[tokio::test]
async fn scenario_d_live_happy_path() {
    let anvil = Anvil::new().chain_id(137).spawn();
    let executor = anvil.addresses()[1];
    let chains =
        ChainProviderRegistry::connect(vec![chain_descriptor(137, anvil.endpoint(), true)]).await.unwrap();

    let mut config = base_config(vec![], 137, ExecutionMode::Live);
    config.executor_addresses.insert(137, executor);
    config.private_key = Some(hex::encode(anvil.keys()[0].to_bytes()));

    let stats = ExecutionStats::new();
    let pipeline = ExecutionPipeline::new(chains, &config, advisory(), stats.clone());

    let signal = valid_signal(137, Address::repeat_byte(1));
    let outcome = pipeline.run(signal).await;

    match outcome {
        PipelineOutcome::Live { tx_hash, bundle } => {
            assert!(tx_hash.starts_with("0x"));
            assert_eq!(bundle.transactions.len(), 1);
        }
        other => panic!("expected Live, got {other:?}"),
    }
    let snapshot = stats.snapshot();
    assert_eq!(snapshot.live_executed, 1);
    assert_eq!(snapshot.consecutive_failures, 0);
}

/// Scenario E — circuit breaker opens after 10 consecutive post-Stage-4
/// failures and recovers once the cooldown elapses.
#[tokio::test]
async fn scenario_e_circuit_breaker_opens_and_recovers() {
    let anvil = Anvil::new().chain_id(137).spawn();
    let executor = anvil.addresses()[1];

    let anvil_rpc = ProviderBuilder::new().connect_http(anvil.endpoint().parse().unwrap());
    // Make every call to `executor` revert unconditionally (PUSH1 0 PUSH1 0 REVERT).
    let _: () = anvil_rpc
        .raw_request("anvil_setCode".into(), (executor, Bytes::from_static(&[0x60, 0x00, 0x60, 0x00, 0xfd])))
        .await
        .expect("anvil_setCode failed");

    let chains =
        ChainProviderRegistry::connect(vec![chain_descriptor(137, anvil.endpoint(), true)]).await.unwrap();

    let mut config = base_config(vec![], 137, ExecutionMode::Live);
    config.executor_addresses.insert(137, executor);
    config.private_key = Some(hex::encode(anvil.keys()[0].to_bytes()));
    config.breaker_threshold = 10;
    config.breaker_cooldown_secs = 1;

    let stats = ExecutionStats::new();
    let pipeline = ExecutionPipeline::new(chains, &config, advisory(), stats.clone());

    for i in 0..10 {
        let outcome = pipeline.run(valid_signal(137, Address::repeat_byte(1))).await;
        match outcome {
            PipelineOutcome::Rejected { stage, .. } => assert_eq!(stage, Some("simulate"), "iteration {i}"),
            other => panic!("expected Rejected(simulate), got {other:?}"),
        }
    }

    // 11th signal: breaker is open, Stage 5 is never consulted.
    let outcome = pipeline.run(valid_signal(137, Address::repeat_byte(1))).await;
    match outcome {
        PipelineOutcome::Rejected { stage, .. } => assert_eq!(stage, Some("sign")),
        other => panic!("expected Rejected(sign)/CircuitBreakerOpen, got {other:?}"),
    }

    tokio::time::sleep(Duration::from_millis(1_100)).await;

    // Clear the revert so the next attempt can actually reach Stage 4 again.
    let _: () = anvil_rpc
        .raw_request("anvil_setCode".into(), (executor, Bytes::new()))
        .await
        .expect("anvil_setCode reset failed");

    let outcome = pipeline.run(valid_signal(137, Address::repeat_byte(1))).await;
    assert!(matches!(outcome, PipelineOutcome::Live { .. }));
}

/// Scenario F — cancelling mid-iteration stops the scan loop within the
/// 5 s bound, without relying on real SIGTERM delivery.
#[tokio::test]
async fn scenario_f_scan_loop_observes_cancellation_promptly() {
    let chains = ChainProviderRegistry::connect(vec![]).await.unwrap();
    let registries = Arc::new(Registries::builder().build());
    let graph = Arc::new(TokenGraph::build(&registries));

    let quoters = HopQuoters {
        v2: Arc::new(UniV2Quoter::new(chains.clone())),
        v3: Arc::new(UniV3Quoter::new(chains.clone())),
        curve: Arc::new(CurveQuoter::new(chains.clone(), CurvePoolRegistry::default())),
    };

    let (signal_tx, _signal_rx) = mpsc::channel(16);
    let scan_config = ScanConfig {
        worker_width: 20,
        scan_interval: Duration::from_secs(30),
        tiers: HashMap::new(),
        trade_size_sweep_usd: vec![dec!(1000)],
        max_base_fee_gwei: Decimal::from(500),
        max_slippage_bps: 50,
        min_profit_usd: dec!(5),
        loan_cap_fraction: dec!(0.20),
        min_loan_usd: dec!(10000),
        aave_fee_bps: dec!(9),
    };

    let orchestrator = Arc::new(ScanOrchestrator::new(
        chains,
        registries,
        graph,
        quoters,
        advisory(),
        ExecutionStats::new(),
        signal_tx,
        scan_config,
    ));

    let cancel = CancellationToken::new();
    let run_cancel = cancel.clone();
    let run_orchestrator = orchestrator.clone();
    let handle = tokio::spawn(async move { run_orchestrator.run(run_cancel).await });

    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel.cancel();

    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("scan loop did not observe cancellation within 5s")
        .expect("scan task panicked");
}
