//! Advisory Layer — §4.6.
//!
//! Both capabilities are consulted through `Arc<dyn Trait>`; "no
//! implementation configured" is modeled with a default implementation,
//! never `Option<Arc<dyn Trait>>` — there is nothing for a caller to
//! forget to check.

use std::sync::Arc;

use rust_decimal::Decimal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Urgency {
    Low,
    Normal,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MevProtectionLevel {
    None,
    PrivateRelay,
    PrivateRelayPlusFlashbotsProtect,
}

#[derive(Debug, Clone, Copy)]
pub struct ExecutionParams {
    pub priority_fee_gwei: Decimal,
    pub slippage_bps: u32,
    pub deadline_seconds: u64,
    pub mev_protection_level: MevProtectionLevel,
}

#[derive(Debug, Clone, Copy)]
pub struct GasSample {
    pub base_fee_gwei: Decimal,
    pub timestamp_unix: u64,
}

/// `shouldWait() → bool`, §4.6. A pure function of recent samples.
pub trait GasAdvisor: Send + Sync {
    fn should_wait(&self, samples: &[GasSample]) -> bool;
}

/// The default: never holds. Missing advisor must never abort the scan loop.
pub struct NullGasAdvisor;

impl GasAdvisor for NullGasAdvisor {
    fn should_wait(&self, _samples: &[GasSample]) -> bool {
        false
    }
}

/// Simple moving-average trend filter, offered as the non-ML reference
/// implementation the spec allows alongside a trend filter or an ML model.
pub struct TrendGasAdvisor {
    window: usize,
    rise_threshold_pct: Decimal,
}

impl TrendGasAdvisor {
    pub fn new(window: usize, rise_threshold_pct: Decimal) -> Self {
        Self { window, rise_threshold_pct }
    }
}

impl GasAdvisor for TrendGasAdvisor {
    fn should_wait(&self, samples: &[GasSample]) -> bool {
        if samples.len() < self.window.max(2) {
            return false;
        }
        let recent = &samples[samples.len() - self.window..];
        let oldest = recent.first().unwrap().base_fee_gwei;
        let newest = recent.last().unwrap().base_fee_gwei;
        if oldest.is_zero() {
            return false;
        }
        let change_pct = (newest - oldest) / oldest * Decimal::from(100);
        change_pct > self.rise_threshold_pct
    }
}

/// `recommendParams(chainId, urgency) → {...}`, §4.6.
pub trait ParamAdvisor: Send + Sync {
    fn recommend(&self, chain_id: u64, urgency: Urgency) -> ExecutionParams;
}

/// The default: static configured values, ignoring urgency entirely.
pub struct StaticParamAdvisor {
    pub defaults: ExecutionParams,
}

impl ParamAdvisor for StaticParamAdvisor {
    fn recommend(&self, _chain_id: u64, _urgency: Urgency) -> ExecutionParams {
        self.defaults
    }
}

/// Bundles the two advisors the scan orchestrator holds for the whole
/// process lifetime.
#[derive(Clone)]
pub struct AdvisoryLayer {
    pub gas: Arc<dyn GasAdvisor>,
    pub params: Arc<dyn ParamAdvisor>,
}

impl AdvisoryLayer {
    pub fn null(defaults: ExecutionParams) -> Self {
        Self {
            gas: Arc::new(NullGasAdvisor),
            params: Arc::new(StaticParamAdvisor { defaults }),
        }
    }
}

/// Safety-kernel clamp applied to advisor output — never inside the
/// advisor, always right after it's consulted (§4.6).
pub fn clamp_params(
    mut params: ExecutionParams,
    max_base_fee_gwei: Decimal,
    max_slippage_bps: u32,
) -> ExecutionParams {
    if params.priority_fee_gwei > max_base_fee_gwei {
        params.priority_fee_gwei = max_base_fee_gwei;
    }
    if params.slippage_bps > max_slippage_bps {
        params.slippage_bps = max_slippage_bps;
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample(gwei: Decimal) -> GasSample {
        GasSample { base_fee_gwei: gwei, timestamp_unix: 0 }
    }

    #[test]
    fn null_advisor_never_waits() {
        let advisor = NullGasAdvisor;
        assert!(!advisor.should_wait(&[sample(dec!(500)), sample(dec!(1))]));
    }

    #[test]
    fn trend_advisor_flags_sharp_rise() {
        let advisor = TrendGasAdvisor::new(3, dec!(20));
        let samples = vec![sample(dec!(100)), sample(dec!(110)), sample(dec!(150))];
        assert!(advisor.should_wait(&samples));
    }

    #[test]
    fn trend_advisor_ignores_mild_rise() {
        let advisor = TrendGasAdvisor::new(3, dec!(20));
        let samples = vec![sample(dec!(100)), sample(dec!(102)), sample(dec!(105))];
        assert!(!advisor.should_wait(&samples));
    }

    #[test]
    fn clamp_params_caps_priority_fee_and_slippage() {
        let params = ExecutionParams {
            priority_fee_gwei: dec!(500),
            slippage_bps: 999,
            deadline_seconds: 60,
            mev_protection_level: MevProtectionLevel::PrivateRelay,
        };
        let clamped = clamp_params(params, dec!(100), 300);
        assert_eq!(clamped.priority_fee_gwei, dec!(100));
        assert_eq!(clamped.slippage_bps, 300);
    }
}
