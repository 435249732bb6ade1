//! Pre-sign transaction simulation — §4.4(b), used by Stage 4.

use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, Bytes, U256};
use alloy::providers::Provider;
use alloy::rpc::types::TransactionRequest;

use crate::chains::{ChainProviderRegistry, READ_TIMEOUT};

use super::quote::PricingError;

/// The minimal fields `eth_call` needs; built by Stage 3 before signing.
#[derive(Debug, Clone)]
pub struct UnsignedCall {
    pub chain_id: u64,
    pub from: Address,
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
}

#[derive(Debug, Clone)]
pub struct SimulationOutcome {
    pub success: bool,
    pub revert_reason: Option<String>,
    pub gas_used_estimate: u64,
}

pub struct TxSimulator<'a> {
    chains: &'a ChainProviderRegistry,
}

impl<'a> TxSimulator<'a> {
    pub fn new(chains: &'a ChainProviderRegistry) -> Self {
        Self { chains }
    }

    /// Perform the pre-sign `eth_call` against the latest block. Never
    /// broadcasts; a revert is reported, not propagated as an error, so
    /// Stage 4 can turn it into `SimulationReverted` with the verbatim
    /// reason rather than an opaque transport failure.
    pub async fn simulate(&self, call: &UnsignedCall) -> Result<SimulationOutcome, PricingError> {
        let provider = self
            .chains
            .provider(call.chain_id)
            .map_err(|e| PricingError::Unpriceable(e.to_string()))?;

        let tx = TransactionRequest::default()
            .with_from(call.from)
            .with_to(call.to)
            .with_input(call.data.clone())
            .with_value(call.value);

        let call_fut = provider.call(tx.clone());
        let gas_fut = provider.estimate_gas(tx);

        match tokio::time::timeout(READ_TIMEOUT, call_fut).await {
            Ok(Ok(_)) => {
                let gas_used_estimate = tokio::time::timeout(READ_TIMEOUT, gas_fut)
                    .await
                    .ok()
                    .and_then(Result::ok)
                    .unwrap_or(0);
                Ok(SimulationOutcome { success: true, revert_reason: None, gas_used_estimate })
            }
            Ok(Err(e)) => Ok(SimulationOutcome {
                success: false,
                revert_reason: Some(e.to_string()),
                gas_used_estimate: 0,
            }),
            Err(_) => Err(PricingError::Unpriceable("simulation call timed out".into())),
        }
    }
}
