//! Core cross-cutting data types shared by every module.
//!
//! Mirrors the spec's data model (§3): chain/token/DEX descriptors, the
//! protocol-family tag, flash-loan source selector, and the candidate /
//! evaluation-result records produced once per scan iteration.

use alloy::primitives::{Address, U256};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};
use std::fmt;

/// EVM chain id. Kept as a bare `u64` (not a newtype) because it crosses
/// the wire in `TradeSignal` and every `alloy` RPC call already expects a
/// raw `u64`; wrapping it would just add conversions at every call site.
pub type ChainId = u64;

/// Gas pricing mode a chain defaults to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GasPricingMode {
    Eip1559,
    Legacy,
}

/// A statically configured chain. Exists for the full process lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainDescriptor {
    pub chain_id: ChainId,
    pub name: String,
    pub rpc_url: String,
    pub rpc_url_backup: Option<String>,
    pub ws_url: Option<String>,
    pub native_symbol: String,
    pub gas_pricing_mode: GasPricingMode,
    pub block_time_hint_ms: u64,
    /// Whether signing is permitted on this chain. Exactly one chain in the
    /// whole registry may be `true` — enforced by `Registries::from_config`.
    pub execution_enabled: bool,
}

/// DEX protocol family. `protocol_family` in the spec's DEX descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProtocolFamily {
    UniV2Style,
    UniV3,
    Curve,
}

impl ProtocolFamily {
    /// The `uint8` discriminant used on the wire (`TradeSignal.protocols`)
    /// and in the on-chain `execute` calldata's `protocols: uint8[]`.
    pub fn as_u8(self) -> u8 {
        match self {
            ProtocolFamily::UniV2Style => 1,
            ProtocolFamily::UniV3 => 2,
            ProtocolFamily::Curve => 3,
        }
    }

    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(ProtocolFamily::UniV2Style),
            2 => Some(ProtocolFamily::UniV3),
            3 => Some(ProtocolFamily::Curve),
            _ => None,
        }
    }
}

impl fmt::Display for ProtocolFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolFamily::UniV2Style => write!(f, "UniV2-style"),
            ProtocolFamily::UniV3 => write!(f, "UniV3"),
            ProtocolFamily::Curve => write!(f, "Curve"),
        }
    }
}

/// `(chain-id, dex-id) -> {router-address, protocol-family}`. Immutable
/// at runtime. `quoter_address` is only meaningful for `UniV3` (resolves
/// Open Question 1 — the teacher hard-codes one Arbitrum QuoterV2 address
/// for every chain; here it is per-chain registry data instead).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DexDescriptor {
    pub dex_id: String,
    pub chain_id: ChainId,
    pub router_address: Address,
    pub protocol_family: ProtocolFamily,
    pub quoter_address: Option<Address>,
}

/// `(chain-id, symbol) -> {address, decimals, is-bridgeable}`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TokenDescriptor {
    pub chain_id: ChainId,
    pub address: Address,
    pub decimals: u8,
    pub is_bridgeable: bool,
}

impl TokenDescriptor {
    /// Convert a USD amount to this token's raw integer units, rounding
    /// down. This is the only place float/decimal meets `U256` — the
    /// registry boundary the spec requires.
    pub fn usd_to_raw(&self, usd: Decimal, usd_price_per_token: Decimal) -> U256 {
        if usd_price_per_token.is_zero() {
            return U256::ZERO;
        }
        let tokens = usd / usd_price_per_token;
        let scaled = (tokens * Decimal::from(10u64.pow(self.decimals as u32))).trunc();
        let as_u128 = scaled.to_u128().unwrap_or(0);
        U256::from(as_u128)
    }

    /// Convert a raw integer amount back to a human-readable `Decimal`.
    pub fn raw_to_decimal(&self, raw: U256) -> Decimal {
        let raw_u128: u128 = raw.try_into().unwrap_or(u128::MAX);
        Decimal::from(raw_u128) / Decimal::from(10u64.pow(self.decimals as u32))
    }
}

/// Flash-loan source selector, `spec.md` §3/§4.10.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum FlashLoanSource {
    BalancerV3 = 1,
    AaveV3 = 2,
}

impl FlashLoanSource {
    /// Flash-loan fee as a fraction of principal. Balancer V3 charges
    /// nothing today; Aave V3 charges 0.05%-0.09% depending on reserve
    /// config — we use the conservative upper bound as the default.
    pub fn fee_fraction(self, aave_fee_bps: Decimal) -> Decimal {
        match self {
            FlashLoanSource::BalancerV3 => Decimal::ZERO,
            FlashLoanSource::AaveV3 => aave_fee_bps / Decimal::from(10_000u32),
        }
    }
}

/// A single hop in a route: one swap leg.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hop {
    pub protocol: ProtocolFamily,
    pub router: Address,
    pub token_out: Address,
    /// Per-hop extra encoding: empty for UniV2-style, `abi.encode(uint24 fee)`
    /// for UniV3, `abi.encode(int128 i, int128 j)` for Curve.
    pub extra: Vec<u8>,
}

/// An immutable record produced per scan iteration by the graph engine.
#[derive(Debug, Clone)]
pub struct CandidateOpportunity {
    pub source_chain: ChainId,
    /// `None` for intra-chain (dest == source); `Some` for a cross-chain
    /// bridge candidate.
    pub dest_chain: Option<ChainId>,
    pub token_symbol: String,
    pub dex_a_id: Option<String>,
    pub dex_b_id: Option<String>,
    pub trade_size_usd: Decimal,
}

impl CandidateOpportunity {
    pub fn is_cross_chain(&self) -> bool {
        self.dest_chain.is_some() && self.dest_chain != Some(self.source_chain)
    }
}

/// `{opportunity, safe-loan-raw-units, gross-output-raw, ..., confidence-score}`.
/// Lifetime ends after the scan iteration that produced it unless it
/// becomes a `TradeSignal`.
#[derive(Debug, Clone)]
pub struct EvaluationResult {
    pub opportunity: CandidateOpportunity,
    pub safe_loan_raw: U256,
    pub gross_output_raw: U256,
    pub gas_cost_usd: Decimal,
    pub bridge_fee_usd: Decimal,
    pub flashloan_fee_usd: Decimal,
    pub net_profit_usd: Decimal,
    pub is_profitable: bool,
    pub confidence_score: f32,
}
