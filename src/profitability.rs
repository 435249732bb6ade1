//! Profitability Engine — §4.5.
//!
//! Pure `Decimal` arithmetic throughout; `U256` only at the raw-amount
//! boundary. This is the one module that deliberately does not carry
//! forward the teacher's `f64` spread math — see `DESIGN.md`.

use alloy::primitives::U256;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use thiserror::Error;

use crate::types::{ChainId, FlashLoanSource, TokenDescriptor};

/// Default fraction of vault balance a single loan may draw.
pub const DEFAULT_LOAN_CAP_FRACTION: Decimal = dec!(0.20);
/// Default minimum USD value a loan must clear, below which it's rejected
/// rather than silently shrunk to dust.
pub const DEFAULT_MIN_LOAN_USD: Decimal = dec!(10000);
/// Default minimum net profit, USD, for `is_profitable`.
pub const DEFAULT_MIN_PROFIT_USD: Decimal = dec!(5);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProfitError {
    #[error("insufficient liquidity: requested {requested} cap {cap}")]
    InsufficientLiquidity { requested: String, cap: String },
}

/// Cap a desired loan at `fraction` of the vault's raw token balance, and
/// require the USD value of the (possibly capped) loan to clear
/// `min_usd`. Returns `U256::ZERO` to signal outright rejection rather
/// than execute a dust-sized loan.
pub fn size_safe_loan(
    token: &TokenDescriptor,
    desired_raw: U256,
    vault_balance_raw: U256,
    usd_price_per_token: Decimal,
    fraction: Decimal,
    min_usd: Decimal,
) -> Result<U256, ProfitError> {
    let cap_raw = scale_u256(vault_balance_raw, fraction);
    let loan_raw = desired_raw.min(cap_raw);

    if loan_raw.is_zero() {
        return Err(ProfitError::InsufficientLiquidity {
            requested: desired_raw.to_string(),
            cap: cap_raw.to_string(),
        });
    }

    let loan_usd = token.raw_to_decimal(loan_raw) * usd_price_per_token;
    if loan_usd < min_usd {
        return Err(ProfitError::InsufficientLiquidity {
            requested: loan_usd.to_string(),
            cap: min_usd.to_string(),
        });
    }

    Ok(loan_raw)
}

/// `raw * fraction`, fraction in `[0, 1]`, rounded down.
fn scale_u256(raw: U256, fraction: Decimal) -> U256 {
    if fraction <= Decimal::ZERO {
        return U256::ZERO;
    }
    // fraction has at most a handful of decimal places in practice (0.20,
    // 0.15, ...); scale by its mantissa and divide by its scale power of
    // ten, all in U256, to avoid ever converting `raw` itself through
    // `Decimal` (it can exceed `Decimal`'s 96-bit mantissa for 18-decimal
    // tokens at large balances).
    let scale = fraction.scale();
    let mantissa = fraction.mantissa().unsigned_abs();
    let numerator = raw.saturating_mul(U256::from(mantissa));
    let denominator = U256::from(10u128.pow(scale));
    numerator / denominator
}

#[derive(Debug, Clone)]
pub struct ProfitInputs {
    pub cost_usd: Decimal,
    pub revenue_usd: Decimal,
    pub bridge_fee_usd: Decimal,
    pub gas_cost_usd: Decimal,
    pub flashloan_source: FlashLoanSource,
    pub flashloan_principal_usd: Decimal,
    pub aave_fee_bps: Decimal,
    pub min_profit_usd: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfitResult {
    pub gross_usd: Decimal,
    pub net_usd: Decimal,
    pub is_profitable: bool,
}

/// `net = revenue - cost - bridge - gas - flashloan`; `is_profitable = net >= min_profit_usd`.
pub fn compute_net_profit(inputs: ProfitInputs) -> ProfitResult {
    let flashloan_fee_usd =
        inputs.flashloan_principal_usd * inputs.flashloan_source.fee_fraction(inputs.aave_fee_bps);

    let gross_usd = inputs.revenue_usd - inputs.cost_usd;
    let net_usd = gross_usd - inputs.bridge_fee_usd - inputs.gas_cost_usd - flashloan_fee_usd;

    ProfitResult { gross_usd, net_usd, is_profitable: net_usd >= inputs.min_profit_usd }
}

/// Chain a flash-loan's own chain id through a profitability decision —
/// used only for error messages / logging, never for the arithmetic.
pub fn describe_chain(chain_id: ChainId) -> String {
    format!("chain {chain_id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::Address;

    fn usdc() -> TokenDescriptor {
        TokenDescriptor { chain_id: 137, address: Address::ZERO, decimals: 6, is_bridgeable: true }
    }

    #[test]
    fn loan_capped_at_twenty_percent_of_vault() {
        let vault = U256::from(1_000_000_000u64); // 1000 USDC
        let desired = U256::from(900_000_000u64); // 900 USDC, exceeds 20% cap
        let loan = size_safe_loan(
            &usdc(),
            desired,
            vault,
            dec!(1),
            DEFAULT_LOAN_CAP_FRACTION,
            dec!(1), // low min so the cap is the binding constraint
        )
        .unwrap();
        assert_eq!(loan, U256::from(200_000_000u64));
    }

    #[test]
    fn loan_below_minimum_usd_is_rejected() {
        let vault = U256::from(1_000_000u64); // 1 USDC vault
        let desired = U256::from(500_000u64);
        let err = size_safe_loan(
            &usdc(),
            desired,
            vault,
            dec!(1),
            DEFAULT_LOAN_CAP_FRACTION,
            DEFAULT_MIN_LOAN_USD,
        )
        .unwrap_err();
        assert!(matches!(err, ProfitError::InsufficientLiquidity { .. }));
    }

    #[test]
    fn zero_vault_balance_rejects() {
        let err = size_safe_loan(
            &usdc(),
            U256::from(1000u64),
            U256::ZERO,
            dec!(1),
            DEFAULT_LOAN_CAP_FRACTION,
            dec!(0),
        )
        .unwrap_err();
        assert!(matches!(err, ProfitError::InsufficientLiquidity { .. }));
    }

    #[test]
    fn net_profit_subtracts_every_cost() {
        let result = compute_net_profit(ProfitInputs {
            cost_usd: dec!(1000),
            revenue_usd: dec!(1020),
            bridge_fee_usd: dec!(0),
            gas_cost_usd: dec!(2),
            flashloan_source: FlashLoanSource::BalancerV3,
            flashloan_principal_usd: dec!(1000),
            aave_fee_bps: dec!(9),
            min_profit_usd: DEFAULT_MIN_PROFIT_USD,
        });
        assert_eq!(result.gross_usd, dec!(20));
        assert_eq!(result.net_usd, dec!(18));
        assert!(result.is_profitable);
    }

    #[test]
    fn aave_fee_bps_reduces_net_profit() {
        let result = compute_net_profit(ProfitInputs {
            cost_usd: dec!(1000),
            revenue_usd: dec!(1010),
            bridge_fee_usd: dec!(0),
            gas_cost_usd: dec!(1),
            flashloan_source: FlashLoanSource::AaveV3,
            flashloan_principal_usd: dec!(1000),
            aave_fee_bps: dec!(9), // 0.09%
            min_profit_usd: DEFAULT_MIN_PROFIT_USD,
        });
        // flashloan fee = 1000 * 0.0009 = 0.9
        assert_eq!(result.net_usd, dec!(8.1));
        assert!(result.is_profitable);
    }

    #[test]
    fn below_min_profit_threshold_is_not_profitable() {
        let result = compute_net_profit(ProfitInputs {
            cost_usd: dec!(1000),
            revenue_usd: dec!(1003),
            bridge_fee_usd: dec!(0),
            gas_cost_usd: dec!(1),
            flashloan_source: FlashLoanSource::BalancerV3,
            flashloan_principal_usd: dec!(1000),
            aave_fee_bps: dec!(9),
            min_profit_usd: DEFAULT_MIN_PROFIT_USD,
        });
        assert_eq!(result.net_usd, dec!(2));
        assert!(!result.is_profitable);
    }
}
