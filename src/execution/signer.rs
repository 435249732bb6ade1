//! Stage 5 — signing gate and nonce discipline — §4.9, §5.

use std::collections::HashMap;

use alloy::consensus::{SignableTransaction, TxEip1559};
use alloy::network::TxSignerSync;
use alloy::primitives::{Bytes, TxKind, U256};
use alloy::signers::local::PrivateKeySigner;
use parking_lot::Mutex;

use crate::config::ExecutionMode;
use crate::error::{EngineError, EngineResult};
use crate::types::ChainId;

/// The teacher's and the relay's convention for an unset signing key.
pub const PLACEHOLDER_KEY: &str = "0000000000000000000000000000000000000000000000000000000000000000";

#[derive(Debug, Clone)]
pub struct UnsignedTx1559 {
    pub chain_id: ChainId,
    pub to: alloy::primitives::Address,
    pub data: Bytes,
    pub value: U256,
    pub gas_limit: u64,
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
}

/// A single logical sender per chain, owning a monotonic nonce counter
/// under a per-chain lock (§5 "Nonce discipline").
#[derive(Default)]
pub struct NonceManager {
    next_nonce: Mutex<HashMap<ChainId, u64>>,
}

impl NonceManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, chain_id: ChainId, nonce: u64) {
        self.next_nonce.lock().insert(chain_id, nonce);
    }

    /// Acquire the next nonce. Released back only by `release` if signing
    /// fails before submission — callers must call `release` on failure.
    pub fn acquire(&self, chain_id: ChainId) -> u64 {
        let mut table = self.next_nonce.lock();
        let entry = table.entry(chain_id).or_insert(0);
        let nonce = *entry;
        *entry += 1;
        nonce
    }

    pub fn release(&self, chain_id: ChainId, nonce: u64) {
        let mut table = self.next_nonce.lock();
        if let Some(current) = table.get_mut(&chain_id) {
            if *current == nonce + 1 {
                *current = nonce;
            }
        }
    }

    /// Resync after a collision or reorg-induced gap, per §5.
    pub fn resync(&self, chain_id: ChainId, observed_next: u64) {
        self.next_nonce.lock().insert(chain_id, observed_next);
    }
}

/// Stage 5's three sub-gates. All must pass before signing proceeds.
pub fn check_sub_gates(
    mode: ExecutionMode,
    tx_chain_id: ChainId,
    single_enabled_chain: ChainId,
    signing_key_hex: Option<&str>,
) -> EngineResult<()> {
    if mode != ExecutionMode::Live {
        return Err(EngineError::SigningBlocked { sub_gate: 'A', reason: "execution mode is PAPER".into() });
    }
    if tx_chain_id != single_enabled_chain {
        return Err(EngineError::SigningBlocked {
            sub_gate: 'B',
            reason: format!("chain {tx_chain_id} is not the single enabled chain {single_enabled_chain}"),
        });
    }
    let key = signing_key_hex
        .ok_or_else(|| EngineError::SigningBlocked { sub_gate: 'C', reason: "no signing key configured".into() })?;
    let trimmed = key.strip_prefix("0x").unwrap_or(key);
    if trimmed.eq_ignore_ascii_case(PLACEHOLDER_KEY) {
        return Err(EngineError::SigningBlocked { sub_gate: 'C', reason: "signing key is the placeholder".into() });
    }
    let bytes = hex::decode(trimmed)
        .map_err(|e| EngineError::SigningBlocked { sub_gate: 'C', reason: format!("key is not hex: {e}") })?;
    if bytes.len() != 32 {
        return Err(EngineError::SigningBlocked {
            sub_gate: 'C',
            reason: format!("key is {} bytes, expected 32", bytes.len()),
        });
    }
    Ok(())
}

/// Sign the transaction, producing raw bytes ready for Stage 6. Only
/// reachable once `check_sub_gates` has passed.
pub fn sign_transaction(
    signing_key_hex: &str,
    tx: UnsignedTx1559,
    nonce: u64,
) -> EngineResult<Bytes> {
    let trimmed = signing_key_hex.strip_prefix("0x").unwrap_or(signing_key_hex);
    let signer: PrivateKeySigner = trimmed
        .parse()
        .map_err(|e| EngineError::SigningBlocked { sub_gate: 'C', reason: format!("invalid key: {e}") })?;

    let mut eip1559 = TxEip1559 {
        chain_id: tx.chain_id,
        nonce,
        gas_limit: tx.gas_limit,
        max_fee_per_gas: tx.max_fee_per_gas,
        max_priority_fee_per_gas: tx.max_priority_fee_per_gas,
        to: TxKind::Call(tx.to),
        value: tx.value,
        access_list: Default::default(),
        input: tx.data,
    };

    let signature = signer
        .sign_transaction_sync(&mut eip1559)
        .map_err(|e| EngineError::SigningBlocked { sub_gate: 'C', reason: e.to_string() })?;
    let signed = eip1559.into_signed(signature);
    let mut encoded = Vec::new();
    alloy::eips::eip2718::Encodable2718::encode_2718(&signed, &mut encoded);
    Ok(Bytes::from(encoded))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nonce_manager_issues_strictly_increasing_nonces() {
        let manager = NonceManager::new();
        let first = manager.acquire(137);
        let second = manager.acquire(137);
        let third = manager.acquire(137);
        assert_eq!([first, second, third], [0, 1, 2]);
    }

    #[test]
    fn release_only_rolls_back_the_most_recent_nonce() {
        let manager = NonceManager::new();
        let first = manager.acquire(137);
        let second = manager.acquire(137);
        manager.release(137, second);
        assert_eq!(manager.acquire(137), second);
        manager.release(137, first); // stale, should be a no-op
        assert_eq!(manager.acquire(137), second + 1);
    }

    #[test]
    fn nonces_are_independent_per_chain() {
        let manager = NonceManager::new();
        assert_eq!(manager.acquire(137), 0);
        assert_eq!(manager.acquire(1), 0);
        assert_eq!(manager.acquire(137), 1);
    }

    #[test]
    fn sub_gate_a_rejects_paper_mode() {
        let err = check_sub_gates(ExecutionMode::Paper, 137, 137, Some("aa".repeat(32).as_str())).unwrap_err();
        assert!(matches!(err, EngineError::SigningBlocked { sub_gate: 'A', .. }));
    }

    #[test]
    fn sub_gate_b_rejects_wrong_chain() {
        let err = check_sub_gates(ExecutionMode::Live, 1, 137, Some("aa".repeat(32).as_str())).unwrap_err();
        assert!(matches!(err, EngineError::SigningBlocked { sub_gate: 'B', .. }));
    }

    #[test]
    fn sub_gate_c_rejects_missing_key() {
        let err = check_sub_gates(ExecutionMode::Live, 137, 137, None).unwrap_err();
        assert!(matches!(err, EngineError::SigningBlocked { sub_gate: 'C', .. }));
    }

    #[test]
    fn sub_gate_c_rejects_placeholder_key() {
        let err = check_sub_gates(ExecutionMode::Live, 137, 137, Some(PLACEHOLDER_KEY)).unwrap_err();
        assert!(matches!(err, EngineError::SigningBlocked { sub_gate: 'C', .. }));
    }

    #[test]
    fn sub_gate_c_accepts_a_well_formed_key() {
        assert!(check_sub_gates(ExecutionMode::Live, 137, 137, Some("11".repeat(32).as_str())).is_ok());
    }
}
