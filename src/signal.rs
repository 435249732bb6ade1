//! Inter-process trade signal — §4.10, the wire contract between the
//! discovery brain and the execution server.

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::types::{ChainId, FlashLoanSource, ProtocolFamily};

/// Maximum number of hops a signal may carry (`spec.md` §4.9 Stage 1).
pub const MAX_PROTOCOLS: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeSignal {
    pub chain_id: ChainId,
    pub token: Address,
    /// Decimal string, raw units — kept as `String` on the wire so large
    /// `U256` amounts survive JSON's f64-based number handling untouched.
    pub amount: String,
    pub flash_source: FlashLoanSource,
    pub protocols: Vec<u8>,
    pub routers: Vec<Address>,
    pub path: Vec<Address>,
    pub extras: Vec<String>,
    #[serde(rename = "expected_profit")]
    pub expected_profit: f64,
}

impl TradeSignal {
    /// Stage 1 validation: chain id known (checked by the caller against
    /// the chain registry), token address well-formed, amount positive,
    /// protocol list non-empty and bounded, and all parallel arrays equal
    /// length.
    pub fn validate(&self) -> EngineResult<()> {
        if self.token == Address::ZERO {
            return Err(EngineError::Config("token address is zero".into()));
        }
        let amount: u128 = self
            .amount
            .parse()
            .map_err(|_| EngineError::Config(format!("malformed amount: {}", self.amount)))?;
        if amount == 0 {
            return Err(EngineError::Config("amount must be > 0".into()));
        }
        if self.protocols.is_empty() || self.protocols.len() > MAX_PROTOCOLS {
            return Err(EngineError::Config(format!(
                "protocol list length {} out of bounds (1..={MAX_PROTOCOLS})",
                self.protocols.len()
            )));
        }
        let n = self.protocols.len();
        if self.routers.len() != n || self.path.len() != n || self.extras.len() != n {
            return Err(EngineError::Config(format!(
                "mismatched array lengths: protocols={n} routers={} path={} extras={}",
                self.routers.len(),
                self.path.len(),
                self.extras.len()
            )));
        }
        for &p in &self.protocols {
            if ProtocolFamily::from_u8(p).is_none() {
                return Err(EngineError::Config(format!("unknown protocol id {p}")));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_signal() -> TradeSignal {
        TradeSignal {
            chain_id: 137,
            token: Address::repeat_byte(1),
            amount: "1000000000".into(),
            flash_source: FlashLoanSource::BalancerV3,
            protocols: vec![1, 2],
            routers: vec![Address::repeat_byte(2), Address::repeat_byte(3)],
            path: vec![Address::repeat_byte(4), Address::repeat_byte(5)],
            extras: vec!["0x".into(), "0x".into()],
            expected_profit: 12.5,
        }
    }

    #[test]
    fn valid_signal_passes() {
        assert!(valid_signal().validate().is_ok());
    }

    #[test]
    fn zero_amount_rejected() {
        let mut s = valid_signal();
        s.amount = "0".into();
        assert!(s.validate().is_err());
    }

    #[test]
    fn mismatched_array_lengths_rejected() {
        let mut s = valid_signal();
        s.routers.pop();
        assert!(s.validate().is_err());
    }

    #[test]
    fn empty_protocol_list_rejected() {
        let mut s = valid_signal();
        s.protocols.clear();
        s.routers.clear();
        s.path.clear();
        s.extras.clear();
        assert!(s.validate().is_err());
    }

    #[test]
    fn too_many_protocols_rejected() {
        let mut s = valid_signal();
        s.protocols = vec![1; MAX_PROTOCOLS + 1];
        s.routers = vec![Address::ZERO; MAX_PROTOCOLS + 1];
        s.path = vec![Address::ZERO; MAX_PROTOCOLS + 1];
        s.extras = vec!["0x".into(); MAX_PROTOCOLS + 1];
        assert!(s.validate().is_err());
    }

    #[test]
    fn wire_format_matches_spec_shape() {
        let json = serde_json::to_value(valid_signal()).unwrap();
        assert!(json.get("chainId").is_some());
        assert!(json.get("flashSource").is_some());
        assert!(json.get("expected_profit").is_some());
    }
}
