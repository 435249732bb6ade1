//! The `Quote` tagged enum and the request/error types around it.
//!
//! Replaces the dynamic-typing-shaped return value a naive port would
//! reach for (`Box<dyn Any>` or an untyped JSON blob per protocol). Every
//! protocol family produces a distinct variant, and callers exhaustively
//! match instead of downcasting.

use alloy::primitives::{Address, U256};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::types::ProtocolFamily;

#[derive(Debug, Clone)]
pub struct HopQuoteRequest {
    pub chain_id: u64,
    pub protocol: ProtocolFamily,
    pub router: Address,
    /// `Some` only for `UniV3` — the per-chain QuoterV2 address, resolved
    /// from the DEX registry rather than a shared constant.
    pub quoter: Option<Address>,
    pub token_in: Address,
    pub token_out: Address,
    pub amount_in_raw: U256,
    pub extra: Vec<u8>,
}

/// One quoted hop result, tagged by protocol family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Quote {
    V2 { amount_out: U256 },
    V3 { amount_out: U256, sqrt_price_x96_after: U256 },
    Curve { amount_out: U256 },
    /// Pre-encoded calldata from an off-chain aggregator (1inch, 0x, ...).
    /// Not exercised by the built-in quoters; kept as a variant so a future
    /// `HopQuoter` implementation can slot in without widening the enum.
    Aggregator { amount_out: U256, calldata: Vec<u8> },
}

impl Quote {
    pub fn amount_out(&self) -> U256 {
        match self {
            Quote::V2 { amount_out }
            | Quote::V3 { amount_out, .. }
            | Quote::Curve { amount_out }
            | Quote::Aggregator { amount_out, .. } => *amount_out,
        }
    }
}

#[derive(Debug, Error, Clone)]
pub enum PricingError {
    #[error("unpriceable: {0}")]
    Unpriceable(String),
    #[error("rpc error on chain {chain_id}: {message}")]
    Rpc { chain_id: u64, message: String },
    #[error("missing quoter address for chain {chain_id}")]
    MissingQuoter { chain_id: u64 },
    #[error("missing curve pool indices for pool {pool}")]
    MissingCurveIndices { pool: String },
    #[error("simulation reverted: {reason}")]
    Reverted { reason: String },
}

/// Conservative haircut applied when an estimate substitutes for a hop's
/// exact on-chain quote during pre-screening (e.g. before the upstream hop
/// has actually been quoted). Not used on the final, on-chain-quoted path.
pub const PRESCREEN_HAIRCUT: Decimal = Decimal::from_parts(95, 0, 0, false, 2);
