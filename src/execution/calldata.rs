//! Stage 3 calldata encoding — §4.9.
//!
//! Encodes the four-argument `execute` call. `routeData` is itself an
//! ABI-encoded tuple of four same-length arrays, built with
//! `alloy::sol_types` rather than hand-rolled byte concatenation.

use alloy::primitives::{Address, Bytes, U256};
use alloy::sol_types::{SolCall, SolValue};

use crate::error::{EngineError, EngineResult};
use crate::signal::TradeSignal;

/// The MEV relay's bundle submission limit (§4.9 Stage 3).
pub const MAX_CALLDATA_BYTES: usize = 32_000;

/// `(protocols, routers, tokenOutPath, extras)` — the `routeData` tuple.
type RouteData = (Vec<u8>, Vec<Address>, Vec<Address>, Vec<Bytes>);

/// Build `routeData` from the signal's four parallel arrays. Caller must
/// have already run `TradeSignal::validate` (equal-length invariant).
pub fn encode_route_data(signal: &TradeSignal) -> EngineResult<Bytes> {
    let extras: Vec<Bytes> = signal
        .extras
        .iter()
        .map(|hex_str| {
            let trimmed = hex_str.strip_prefix("0x").unwrap_or(hex_str);
            hex::decode(trimmed)
                .map(Bytes::from)
                .map_err(|e| EngineError::Config(format!("invalid extra hex {hex_str}: {e}")))
        })
        .collect::<Result<_, _>>()?;

    let route: RouteData = (signal.protocols.clone(), signal.routers.clone(), signal.path.clone(), extras);
    Ok(Bytes::from(route.abi_encode()))
}

/// Build the full `execute(uint8,address,uint256,bytes)` calldata,
/// prefixed with its 4-byte selector.
pub fn encode_execute_calldata(signal: &TradeSignal, loan_amount: U256) -> EngineResult<Bytes> {
    let route_data = encode_route_data(signal)?;
    let call = crate::contracts::IFlashArbExecutor::executeCall {
        flashSource: signal.flash_source as u8,
        loanToken: signal.token,
        loanAmount: loan_amount,
        routeData: route_data,
    };
    Ok(Bytes::from(call.abi_encode()))
}

/// Stage 3's calldata-size invariant, enforced regardless of gas economics.
pub fn check_calldata_size(data: &Bytes) -> EngineResult<()> {
    if data.len() > MAX_CALLDATA_BYTES {
        return Err(EngineError::CalldataTooLarge { limit: MAX_CALLDATA_BYTES, actual: data.len() });
    }
    Ok(())
}
