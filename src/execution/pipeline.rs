//! The seven-stage execution pipeline — §4.9.
//!
//! `ExecutionPipeline::run` carries a `TradeSignal` through validation,
//! the chain gate, calldata/tx build, simulation, and — in LIVE mode only
//! — the signing gate, bundling, and private relay submission. A PAPER
//! mode signal stops right after a successful simulation; stages 5-7
//! never run for it.

use std::collections::HashMap;
use std::sync::Arc;

use alloy::primitives::{Address, Bytes, U256};
use alloy::providers::Provider;
use alloy::signers::local::PrivateKeySigner;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::advisory::{clamp_params, AdvisoryLayer, Urgency};
use crate::chains::{ChainProviderRegistry, READ_TIMEOUT};
use crate::config::{EngineConfig, ExecutionMode};
use crate::error::{EngineError, EngineResult};
use crate::pricing::{SimulationOutcome, TxSimulator, UnsignedCall};
use crate::signal::TradeSignal;
use crate::stats::ExecutionStats;
use crate::types::ChainId;

use super::breaker::CircuitBreaker;
use super::bundle::{self, Bundle};
use super::calldata::{check_calldata_size, encode_execute_calldata};
use super::relay::RelayClient;
use super::signer::{check_sub_gates, sign_transaction, NonceManager, UnsignedTx1559};

#[derive(Debug, Clone)]
pub enum PipelineOutcome {
    /// Stage 4 succeeded and the engine is in PAPER mode — no tx ever
    /// leaves the process.
    Paper { expected_profit_usd: Decimal, gas_used_estimate: u64 },
    /// All seven stages completed; `tx_hash` is the relay's bundle hash,
    /// or the public-broadcast tx hash on fallback.
    Live { tx_hash: String, bundle: Bundle },
    Rejected { stage: Option<&'static str>, reason: String },
}

pub struct ExecutionPipeline {
    chains: Arc<ChainProviderRegistry>,
    executor_addresses: HashMap<ChainId, Address>,
    private_key: Option<String>,
    single_enabled_chain: ChainId,
    execution_mode: ExecutionMode,
    max_base_fee_gwei: Decimal,
    max_slippage_bps: u32,
    gas_limit_multiplier: Decimal,

    nonces: NonceManager,
    breaker: CircuitBreaker,
    advisory: AdvisoryLayer,
    stats: ExecutionStats,
    relay: Option<RelayClient>,
}

impl ExecutionPipeline {
    pub fn new(
        chains: Arc<ChainProviderRegistry>,
        config: &EngineConfig,
        advisory: AdvisoryLayer,
        stats: ExecutionStats,
    ) -> Self {
        let relay = config.relay.auth_token.as_ref().map(|_| {
            RelayClient::new(
                std::env::var("BLOXROUTE_ENDPOINT")
                    .unwrap_or_else(|_| "https://api.blxrbdn.com".to_string()),
                config.relay.clone(),
            )
        });

        Self {
            chains,
            executor_addresses: config.executor_addresses.clone(),
            private_key: config.private_key.clone(),
            single_enabled_chain: config.single_enabled_chain,
            execution_mode: config.execution_mode,
            max_base_fee_gwei: config.max_base_fee_gwei,
            max_slippage_bps: config.max_slippage_bps,
            gas_limit_multiplier: config.gas_limit_multiplier,
            nonces: NonceManager::new(),
            breaker: CircuitBreaker::with_params(
                stats.clone(),
                config.breaker_threshold,
                std::time::Duration::from_secs(config.breaker_cooldown_secs),
            ),
            advisory,
            stats,
            relay,
        }
    }

    fn signer_address(&self) -> Option<Address> {
        let key = self.private_key.as_deref()?;
        let trimmed = key.strip_prefix("0x").unwrap_or(key);
        let signer: PrivateKeySigner = trimmed.parse().ok()?;
        Some(signer.address())
    }

    pub async fn run(&self, signal: TradeSignal) -> PipelineOutcome {
        match self.run_inner(&signal).await {
            Ok(outcome) => outcome,
            Err(e) => {
                match &e {
                    // Breaker already open; don't pile onto the streak that tripped it.
                    EngineError::CircuitBreakerOpen { .. } => {}
                    // Post-Stage-4 failures are what the circuit breaker watches.
                    EngineError::SimulationReverted { .. }
                    | EngineError::SigningBlocked { .. }
                    | EngineError::NonceCollision { .. }
                    | EngineError::RelaySubmissionFailed(_) => self.breaker.record_failure(),
                    // Stage 1-3 gate/build rejections are configuration-level, not
                    // execution failures — counted, but never trip the breaker.
                    _ => self.stats.record_gate_failure(),
                }
                warn!(error = %e, stage = ?e.stage(), "pipeline rejected signal");
                PipelineOutcome::Rejected { stage: e.stage(), reason: e.to_string() }
            }
        }
    }

    async fn run_inner(&self, signal: &TradeSignal) -> EngineResult<PipelineOutcome> {
        // Stage 1 — signal validation.
        signal.validate()?;

        // Stage 2 — chain execution gate: exactly one configured chain is
        // execution-enabled; every other configured chain is CONFIGURED but
        // disabled, and a chain absent from the registry is UNKNOWN. Both
        // reject with `ExecutionBlocked`, gated before any build/sign work.
        match self.chains.descriptor(signal.chain_id) {
            Ok(descriptor) if descriptor.execution_enabled => {}
            Ok(_) => {
                return Err(EngineError::ExecutionBlocked {
                    reason: format!("chain {} disabled", signal.chain_id),
                })
            }
            Err(_) => {
                return Err(EngineError::ExecutionBlocked {
                    reason: format!("chain {} not configured", signal.chain_id),
                })
            }
        }

        // LIVE mode: a tripped circuit breaker rejects the signal right
        // here, before Stage 3/4 ever run (`spec.md` §8 Scenario E).
        if self.execution_mode == ExecutionMode::Live {
            self.breaker.check()?;
        }

        let executor_address = *self
            .executor_addresses
            .get(&signal.chain_id)
            .ok_or_else(|| EngineError::ExecutionBlocked {
                reason: format!("no executor address configured for chain {}", signal.chain_id),
            })?;

        let loan_amount: U256 = signal
            .amount
            .parse()
            .map_err(|_| EngineError::Config(format!("malformed amount {}", signal.amount)))?;

        // Stage 3 — calldata build.
        let calldata = encode_execute_calldata(signal, loan_amount)?;
        check_calldata_size(&calldata)?;

        let from = self.signer_address().unwrap_or(Address::ZERO);
        let call = UnsignedCall { chain_id: signal.chain_id, from, to: executor_address, data: calldata.clone(), value: U256::ZERO };

        // Stage 4 — simulation.
        let simulator = TxSimulator::new(&self.chains);
        let outcome: SimulationOutcome = simulator
            .simulate(&call)
            .await
            .map_err(|e| EngineError::Unpriceable(e.to_string()))?;

        if !outcome.success {
            return Err(EngineError::SimulationReverted {
                reason: outcome.revert_reason.unwrap_or_else(|| "unknown revert".into()),
            });
        }

        let expected_profit_usd = Decimal::from_f64_retain(signal.expected_profit).unwrap_or(Decimal::ZERO);

        if self.execution_mode == ExecutionMode::Paper {
            self.stats.record_paper_execution(expected_profit_usd);
            self.breaker.record_success();
            info!(chain_id = signal.chain_id, %expected_profit_usd, "paper execution recorded");
            return Ok(PipelineOutcome::Paper { expected_profit_usd, gas_used_estimate: outcome.gas_used_estimate });
        }

        // LIVE mode from here.
        // Stage 5 — signing gate.
        check_sub_gates(self.execution_mode, signal.chain_id, self.single_enabled_chain, self.private_key.as_deref())?;
        let private_key = self.private_key.as_ref().expect("checked by check_sub_gates");

        let urgency = Urgency::Normal;
        let recommended = self.advisory.params.recommend(signal.chain_id, urgency);
        let params = clamp_params(recommended, self.max_base_fee_gwei, self.max_slippage_bps);

        let gas_limit = scale_gas(outcome.gas_used_estimate, self.gas_limit_multiplier);
        let priority_fee_wei = gwei_to_wei(params.priority_fee_gwei);
        let max_fee_wei = gwei_to_wei(self.max_base_fee_gwei).max(priority_fee_wei);

        let nonce = self.nonces.acquire(signal.chain_id);
        let unsigned = UnsignedTx1559 {
            chain_id: signal.chain_id,
            to: executor_address,
            data: calldata,
            value: U256::ZERO,
            gas_limit,
            max_fee_per_gas: max_fee_wei,
            max_priority_fee_per_gas: priority_fee_wei,
        };

        let raw_tx = match sign_transaction(private_key, unsigned, nonce) {
            Ok(tx) => tx,
            Err(e) => {
                self.nonces.release(signal.chain_id, nonce);
                return Err(e);
            }
        };

        // Stage 6 — bundle.
        let target_block = self.target_block(signal.chain_id).await?;
        let bundle = bundle::build_bundle(&[raw_tx.clone()], target_block);

        // Stage 7 — private relay submission, falling back to the public
        // mempool if the relay is unreachable or misconfigured.
        let tx_hash = self.submit(signal.chain_id, &bundle, &raw_tx).await?;

        self.stats.record_live_execution(expected_profit_usd);
        self.breaker.record_success();
        info!(chain_id = signal.chain_id, %tx_hash, "live execution submitted");

        Ok(PipelineOutcome::Live { tx_hash, bundle })
    }

    /// Stages 1-4 only, for the `/simulate` endpoint — never touches the
    /// circuit breaker, nonce manager, or stats, regardless of mode.
    pub async fn simulate_only(&self, signal: &TradeSignal) -> EngineResult<SimulationOutcome> {
        signal.validate()?;
        self.chains.provider(signal.chain_id)?;

        let executor_address = *self
            .executor_addresses
            .get(&signal.chain_id)
            .ok_or_else(|| EngineError::ExecutionBlocked {
                reason: format!("no executor address configured for chain {}", signal.chain_id),
            })?;

        let loan_amount: U256 = signal
            .amount
            .parse()
            .map_err(|_| EngineError::Config(format!("malformed amount {}", signal.amount)))?;

        let calldata = encode_execute_calldata(signal, loan_amount)?;
        check_calldata_size(&calldata)?;

        let from = self.signer_address().unwrap_or(Address::ZERO);
        let call = UnsignedCall { chain_id: signal.chain_id, from, to: executor_address, data: calldata, value: U256::ZERO };

        let simulator = TxSimulator::new(&self.chains);
        simulator.simulate(&call).await.map_err(|e| EngineError::Unpriceable(e.to_string()))
    }

    pub fn execution_mode(&self) -> ExecutionMode {
        self.execution_mode
    }

    async fn target_block(&self, chain_id: ChainId) -> EngineResult<u64> {
        let provider = self.chains.provider(chain_id)?;
        let current = ChainProviderRegistry::call_with_timeout(
            chain_id,
            READ_TIMEOUT,
            provider.get_block_number(),
        )
        .await?;
        Ok(current + 1)
    }

    async fn submit(&self, chain_id: ChainId, bundle: &Bundle, raw_tx: &Bytes) -> EngineResult<String> {
        let chain_name = self
            .chains
            .descriptor(chain_id)
            .map(|d| d.name.clone())
            .unwrap_or_else(|_| chain_id.to_string());

        if let Some(relay) = &self.relay {
            match relay.submit_bundle(bundle, &chain_name, bundle.target_block).await {
                Ok(hash) => return Ok(hash),
                Err(e) => warn!(error = %e, "relay submission failed, falling back to public mempool"),
            }
        }

        let hash = super::relay::broadcast_public_fallback(&self.chains, chain_id, raw_tx).await?;
        Ok(format!("{hash:#x}"))
    }
}

fn gwei_to_wei(gwei: Decimal) -> u128 {
    (gwei * Decimal::from(1_000_000_000u64)).to_u128().unwrap_or(0)
}

fn scale_gas(estimate: u64, multiplier: Decimal) -> u64 {
    (Decimal::from(estimate) * multiplier).to_u64().unwrap_or(estimate)
}
