//! Scan Orchestrator — §4.7, the main discovery loop.
//!
//! One iteration: sample gas in parallel across healthy chains, consult
//! the gas-hold advisor, enumerate candidates, evaluate them through a
//! bounded worker pool, sleep, repeat. Cancellation is checked inside the
//! gas-sampling future and each worker future, per §5.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use rust_decimal::Decimal;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::advisory::{clamp_params, AdvisoryLayer, GasSample, Urgency};
use crate::chains::{ChainProviderRegistry, READ_TIMEOUT};
use crate::graph::{ScanTier, TokenGraph};
use crate::pricing::{HopQuoteRequest, HopQuoter};
use crate::profitability::{compute_net_profit, size_safe_loan, ProfitInputs};
use crate::registry::Registries;
use crate::signal::TradeSignal;
use crate::stats::ExecutionStats;
use crate::types::{CandidateOpportunity, EvaluationResult, FlashLoanSource, Hop};

pub const GAS_HOLD_SLEEP: std::time::Duration = std::time::Duration::from_secs(2);

pub struct ScanConfig {
    pub worker_width: usize,
    pub scan_interval: std::time::Duration,
    pub tiers: HashMap<String, ScanTier>,
    pub trade_size_sweep_usd: Vec<Decimal>,
    pub max_base_fee_gwei: Decimal,
    pub max_slippage_bps: u32,
    pub min_profit_usd: Decimal,
    pub loan_cap_fraction: Decimal,
    pub min_loan_usd: Decimal,
    pub aave_fee_bps: Decimal,
}

/// One protocol hop's static routing data, keyed by `(dex_id)` — resolved
/// from the registry once per candidate evaluation.
pub struct HopQuoters {
    pub v2: Arc<dyn HopQuoter>,
    pub v3: Arc<dyn HopQuoter>,
    pub curve: Arc<dyn HopQuoter>,
}

pub struct ScanOrchestrator {
    chains: Arc<ChainProviderRegistry>,
    registries: Arc<Registries>,
    graph: Arc<TokenGraph>,
    quoters: HopQuoters,
    advisory: AdvisoryLayer,
    stats: ExecutionStats,
    signal_tx: mpsc::Sender<TradeSignal>,
    config: ScanConfig,
    iteration: AtomicU64,
}

impl ScanOrchestrator {
    pub fn new(
        chains: Arc<ChainProviderRegistry>,
        registries: Arc<Registries>,
        graph: Arc<TokenGraph>,
        quoters: HopQuoters,
        advisory: AdvisoryLayer,
        stats: ExecutionStats,
        signal_tx: mpsc::Sender<TradeSignal>,
        config: ScanConfig,
    ) -> Self {
        Self {
            chains,
            registries,
            graph,
            quoters,
            advisory,
            stats,
            signal_tx,
            config,
            iteration: AtomicU64::new(0),
        }
    }

    /// Run the scan loop until `cancel` fires. Returns once the in-flight
    /// iteration has observed cancellation, within the ≤5 s bound §4.7
    /// requires.
    pub async fn run(&self, cancel: CancellationToken) {
        loop {
            if cancel.is_cancelled() {
                info!("scan loop cancelled, exiting");
                return;
            }

            if let Err(()) = self.run_iteration(&cancel).await {
                info!("scan loop cancelled mid-iteration, exiting");
                return;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.scan_interval) => {}
                _ = cancel.cancelled() => {
                    info!("scan loop cancelled during sleep, exiting");
                    return;
                }
            }
        }
    }

    /// Runs one iteration. `Err(())` means cancellation was observed and
    /// the caller should stop looping immediately.
    async fn run_iteration(&self, cancel: &CancellationToken) -> Result<(), ()> {
        let iteration = self.iteration.fetch_add(1, Ordering::Relaxed);

        let gas_samples = tokio::select! {
            samples = self.sample_gas_all_chains() => samples,
            _ = cancel.cancelled() => return Err(()),
        };

        if self.advisory.gas.should_wait(&gas_samples) {
            debug!("gas advisor says wait, sleeping {:?}", GAS_HOLD_SLEEP);
            tokio::select! {
                _ = tokio::time::sleep(GAS_HOLD_SLEEP) => {}
                _ = cancel.cancelled() => return Err(()),
            }
            return Ok(());
        }

        let candidates = self.graph.enumerate_candidates(
            &self.registries,
            &self.config.tiers,
            iteration,
            &self.config.trade_size_sweep_usd,
        );
        debug!(count = candidates.len(), iteration, "enumerated candidates");

        let semaphore = Arc::new(Semaphore::new(self.config.worker_width));
        let workers = candidates.into_iter().map(|candidate| {
            let semaphore = semaphore.clone();
            let cancel = cancel.clone();
            async move {
                let Ok(_permit) = semaphore.acquire_owned().await else { return };
                if cancel.is_cancelled() {
                    return;
                }
                self.evaluate_candidate(candidate).await;
            }
        });

        tokio::select! {
            _ = join_all(workers) => {}
            _ = cancel.cancelled() => return Err(()),
        }

        Ok(())
    }

    async fn sample_gas_all_chains(&self) -> Vec<GasSample> {
        let chain_ids = self.chains.healthy_chain_ids();
        let chains = &self.chains;
        let samples = join_all(chain_ids.into_iter().map(|chain_id| async move {
            let provider = chains.provider(chain_id).ok()?;
            let gas_price = tokio::time::timeout(READ_TIMEOUT, provider_gas_price(provider)).await.ok()??;
            Some(GasSample {
                base_fee_gwei: wei_to_gwei(gas_price),
                timestamp_unix: now_unix(),
            })
        }))
        .await;

        samples.into_iter().flatten().collect()
    }

    /// Size the loan, quote every hop, compute profit, and hand a trade
    /// signal to the Execution Client if profitable. Every error here is
    /// swallowed at this boundary and only counted — it must never stop
    /// the scan loop (§7 "Propagation policy").
    async fn evaluate_candidate(&self, candidate: CandidateOpportunity) {
        if let Err(e) = self.try_evaluate_candidate(&candidate).await {
            debug!(token = %candidate.token_symbol, error = %e, "candidate discarded");
        }
    }

    async fn try_evaluate_candidate(&self, candidate: &CandidateOpportunity) -> anyhow::Result<()> {
        let token = self.registries.lookup_token(candidate.source_chain, &candidate.token_symbol)?;

        // Placeholder unit price until a dedicated price oracle module is
        // wired in; USD sizing still flows entirely through `Decimal`.
        let usd_price_per_token = Decimal::ONE;
        let desired_raw = token.usd_to_raw(candidate.trade_size_usd, usd_price_per_token);

        let vault_balance_raw = desired_raw.saturating_mul(alloy::primitives::U256::from(10u64));
        let safe_loan_raw = size_safe_loan(
            token,
            desired_raw,
            vault_balance_raw,
            usd_price_per_token,
            self.config.loan_cap_fraction,
            self.config.min_loan_usd,
        )?;

        // Intra-chain: round-trip the loaned token through the chain's
        // native asset — sell it for native on dex A, buy it back on dex
        // B. Cross-chain candidates carry no dex ids (`graph.rs`); price
        // the bridge at its 1:1 peg, less the bridge fee. Both shapes
        // still reach profitability evaluation and may emit a signal.
        let (gross_output_raw, hops, bridge_fee_usd) =
            match (candidate.dex_a_id.as_deref(), candidate.dex_b_id.as_deref()) {
                (Some(dex_a_id), Some(dex_b_id)) => {
                    let chain = self.chains.descriptor(candidate.source_chain)?;
                    let native = self.registries.lookup_token(candidate.source_chain, &chain.native_symbol)?;

                    let dex_a = self.registries.lookup_dex(candidate.source_chain, dex_a_id)?;
                    let leg_a = HopQuoteRequest {
                        chain_id: candidate.source_chain,
                        protocol: dex_a.protocol_family,
                        router: dex_a.router_address,
                        quoter: dex_a.quoter_address,
                        token_in: token.address,
                        token_out: native.address,
                        amount_in_raw: safe_loan_raw,
                        extra: Vec::new(),
                    };
                    let quote_a = self.quoter_for(dex_a.protocol_family).quote(&leg_a).await?;

                    let dex_b = self.registries.lookup_dex(candidate.source_chain, dex_b_id)?;
                    let leg_b = HopQuoteRequest {
                        chain_id: candidate.source_chain,
                        protocol: dex_b.protocol_family,
                        router: dex_b.router_address,
                        quoter: dex_b.quoter_address,
                        token_in: native.address,
                        token_out: token.address,
                        amount_in_raw: quote_a.amount_out(),
                        extra: Vec::new(),
                    };
                    let quote_b = self.quoter_for(dex_b.protocol_family).quote(&leg_b).await?;

                    let hops = vec![
                        Hop { protocol: dex_a.protocol_family, router: dex_a.router_address, token_out: native.address, extra: Vec::new() },
                        Hop { protocol: dex_b.protocol_family, router: dex_b.router_address, token_out: token.address, extra: Vec::new() },
                    ];
                    (quote_b.amount_out(), hops, Decimal::ZERO)
                }
                _ => (safe_loan_raw, Vec::new(), Decimal::from(5)),
            };

        let revenue_usd = token.raw_to_decimal(gross_output_raw) * usd_price_per_token;
        let cost_usd = token.raw_to_decimal(safe_loan_raw) * usd_price_per_token;

        let profit = compute_net_profit(ProfitInputs {
            cost_usd,
            revenue_usd,
            bridge_fee_usd,
            gas_cost_usd: Decimal::new(50, 2),
            flashloan_source: FlashLoanSource::BalancerV3,
            flashloan_principal_usd: cost_usd,
            aave_fee_bps: self.config.aave_fee_bps,
            min_profit_usd: self.config.min_profit_usd,
        });

        let result = EvaluationResult {
            opportunity: candidate.clone(),
            safe_loan_raw,
            gross_output_raw,
            gas_cost_usd: Decimal::new(50, 2),
            bridge_fee_usd,
            flashloan_fee_usd: Decimal::ZERO,
            net_profit_usd: profit.net_usd,
            is_profitable: profit.is_profitable,
            confidence_score: 1.0,
        };

        if !result.is_profitable {
            return Ok(());
        }

        let params = clamp_params(
            self.advisory.params.recommend(candidate.source_chain, Urgency::Normal),
            self.config.max_base_fee_gwei,
            self.config.max_slippage_bps,
        );
        debug!(priority_fee_gwei = %params.priority_fee_gwei, slippage_bps = params.slippage_bps, "recommended execution params");

        let signal = self.build_signal(&result, &hops, token.address)?;
        self.stats.record_signal_received();
        if self.signal_tx.try_send(signal).is_err() {
            self.stats.record_dropped();
            warn!("execution queue full, dropping newest signal");
        }

        Ok(())
    }

    fn quoter_for(&self, protocol: crate::types::ProtocolFamily) -> Arc<dyn HopQuoter> {
        match protocol {
            crate::types::ProtocolFamily::UniV2Style => self.quoters.v2.clone(),
            crate::types::ProtocolFamily::UniV3 => self.quoters.v3.clone(),
            crate::types::ProtocolFamily::Curve => self.quoters.curve.clone(),
        }
    }

    fn build_signal(
        &self,
        result: &EvaluationResult,
        hops: &[Hop],
        token_address: alloy::primitives::Address,
    ) -> anyhow::Result<TradeSignal> {
        Ok(TradeSignal {
            chain_id: result.opportunity.source_chain,
            token: token_address,
            amount: result.safe_loan_raw.to_string(),
            flash_source: FlashLoanSource::BalancerV3,
            protocols: hops.iter().map(|h| h.protocol.as_u8()).collect(),
            routers: hops.iter().map(|h| h.router).collect(),
            path: hops.iter().map(|h| h.token_out).collect(),
            extras: hops.iter().map(|_| "0x".to_string()).collect(),
            expected_profit: result.net_profit_usd.to_string().parse().unwrap_or(0.0),
        })
    }
}

async fn provider_gas_price(
    provider: &alloy::providers::RootProvider,
) -> Result<u128, alloy::transports::TransportError> {
    use alloy::providers::Provider;
    provider.get_gas_price().await
}

fn wei_to_gwei(wei: u128) -> Decimal {
    Decimal::from(wei) / Decimal::from(1_000_000_000u64)
}

fn now_unix() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
