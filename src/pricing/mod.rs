//! Pricing & Simulation Engine — §4.4.

mod quote;
mod quoter;
mod simulator;

pub use quote::{HopQuoteRequest, PricingError, Quote};
pub use quoter::{CurvePoolRegistry, CurveQuoter, HopQuoter, UniV2Quoter, UniV3Quoter};
pub use simulator::{SimulationOutcome, TxSimulator, UnsignedCall};
