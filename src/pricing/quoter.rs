//! Per-hop quoters, one per protocol family — §4.4(a).
//!
//! Each implementation wraps a `sol!`-generated contract instance from
//! `crate::contracts` over a shared `RootProvider`. All calls are
//! `eth_call`s wrapped in the registry's standard read timeout; a failed
//! quote is always `Err(PricingError::Unpriceable)`, never a made-up number.

use std::collections::HashMap;
use std::sync::Arc;

use alloy::primitives::{Address, U256};
use alloy::sol_types::SolValue;
use async_trait::async_trait;

use crate::chains::{ChainProviderRegistry, READ_TIMEOUT};
use crate::contracts::{ICurvePool, IQuoterV2, IUniswapV2Router02};

use super::quote::{HopQuoteRequest, PricingError, Quote};

#[async_trait]
pub trait HopQuoter: Send + Sync {
    async fn quote(&self, req: &HopQuoteRequest) -> Result<Quote, PricingError>;
}

/// Apply the standard read timeout to a single contract call, collapsing
/// both the timeout and the underlying contract error into `Unpriceable` —
/// a failed quote is never distinguished from a slow one by the caller.
async fn timed<T>(
    fut: impl std::future::Future<Output = alloy::contract::Result<T>>,
) -> Result<T, PricingError> {
    match tokio::time::timeout(READ_TIMEOUT, fut).await {
        Ok(Ok(v)) => Ok(v),
        Ok(Err(e)) => Err(PricingError::Unpriceable(e.to_string())),
        Err(_) => Err(PricingError::Unpriceable("quote call timed out".into())),
    }
}

/// `getAmountsOut(amountIn, [tokenIn, tokenOut])`, result is the last element.
pub struct UniV2Quoter {
    chains: Arc<ChainProviderRegistry>,
}

impl UniV2Quoter {
    pub fn new(chains: Arc<ChainProviderRegistry>) -> Self {
        Self { chains }
    }
}

#[async_trait]
impl HopQuoter for UniV2Quoter {
    async fn quote(&self, req: &HopQuoteRequest) -> Result<Quote, PricingError> {
        let provider = self
            .chains
            .provider(req.chain_id)
            .map_err(|e| PricingError::Unpriceable(e.to_string()))?;
        let router = IUniswapV2Router02::new(req.router, provider);
        let path = vec![req.token_in, req.token_out];

        let call = router.getAmountsOut(req.amount_in_raw, path);
        let result = timed(call.call()).await?;

        let amount_out = *result
            .amounts
            .last()
            .ok_or_else(|| PricingError::Unpriceable("empty amounts array".into()))?;
        Ok(Quote::V2 { amount_out })
    }
}

/// QuoterV2 with `sqrtPriceLimitX96 = 0`. The quoter address is supplied
/// per call (resolved from the DEX registry upstream, not hard-coded).
pub struct UniV3Quoter {
    chains: Arc<ChainProviderRegistry>,
}

impl UniV3Quoter {
    pub fn new(chains: Arc<ChainProviderRegistry>) -> Self {
        Self { chains }
    }
}

#[async_trait]
impl HopQuoter for UniV3Quoter {
    async fn quote(&self, req: &HopQuoteRequest) -> Result<Quote, PricingError> {
        let quoter_addr = req
            .quoter
            .ok_or(PricingError::MissingQuoter { chain_id: req.chain_id })?;
        let fee = decode_fee(&req.extra)?;

        let provider = self
            .chains
            .provider(req.chain_id)
            .map_err(|e| PricingError::Unpriceable(e.to_string()))?;
        let quoter = IQuoterV2::new(quoter_addr, provider);
        let params = IQuoterV2::QuoteExactInputSingleParams {
            tokenIn: req.token_in,
            tokenOut: req.token_out,
            amountIn: req.amount_in_raw,
            fee,
            sqrtPriceLimitX96: Default::default(),
        };

        let call = quoter.quoteExactInputSingle(params);
        let result = timed(call.call()).await?;

        Ok(Quote::V3 {
            amount_out: result.amountOut,
            sqrt_price_x96_after: U256::from(result.sqrtPriceX96After),
        })
    }
}

fn decode_fee(extra: &[u8]) -> Result<u32, PricingError> {
    if extra.is_empty() {
        return Err(PricingError::Unpriceable("missing V3 fee in extra bytes".into()));
    }
    let fee = <u32 as SolValue>::abi_decode(extra, false)
        .map_err(|e| PricingError::Unpriceable(format!("bad V3 fee encoding: {e}")))?;
    Ok(fee)
}

/// Static pool-address → `(coin_in_index, coin_out_index)` lookup, used
/// when a candidate doesn't carry Curve indices inline in `extra`. Resolves
/// the registry half of Open Question 2.
#[derive(Default, Clone)]
pub struct CurvePoolRegistry {
    indices: HashMap<Address, HashMap<(Address, Address), (i8, i8)>>,
}

impl CurvePoolRegistry {
    pub fn register(&mut self, pool: Address, token_in: Address, token_out: Address, i: i8, j: i8) {
        self.indices.entry(pool).or_default().insert((token_in, token_out), (i, j));
    }

    pub fn lookup(&self, pool: Address, token_in: Address, token_out: Address) -> Option<(i8, i8)> {
        self.indices.get(&pool)?.get(&(token_in, token_out)).copied()
    }
}

pub struct CurveQuoter {
    chains: Arc<ChainProviderRegistry>,
    pools: CurvePoolRegistry,
}

impl CurveQuoter {
    pub fn new(chains: Arc<ChainProviderRegistry>, pools: CurvePoolRegistry) -> Self {
        Self { chains, pools }
    }
}

#[async_trait]
impl HopQuoter for CurveQuoter {
    async fn quote(&self, req: &HopQuoteRequest) -> Result<Quote, PricingError> {
        let (i, j) = if !req.extra.is_empty() {
            decode_curve_indices(&req.extra)?
        } else {
            self.pools.lookup(req.router, req.token_in, req.token_out).ok_or_else(|| {
                PricingError::MissingCurveIndices { pool: req.router.to_string() }
            })?
        };

        let provider = self
            .chains
            .provider(req.chain_id)
            .map_err(|e| PricingError::Unpriceable(e.to_string()))?;
        let pool = ICurvePool::new(req.router, provider);
        let call = pool.get_dy(i.into(), j.into(), req.amount_in_raw);
        let amount_out = timed(call.call()).await?;

        Ok(Quote::Curve { amount_out })
    }
}

fn decode_curve_indices(extra: &[u8]) -> Result<(i8, i8), PricingError> {
    let (i, j) = <(i128, i128) as SolValue>::abi_decode(extra, false)
        .map_err(|e| PricingError::Unpriceable(format!("bad curve index encoding: {e}")))?;
    Ok((i as i8, j as i8))
}
