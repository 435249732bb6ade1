//! Execution Pipeline — §4.9, the seven stages a trade signal passes
//! through on its way to a signed, bundled, privately submitted
//! transaction (or a recorded paper execution).

pub mod breaker;
pub mod bundle;
pub mod calldata;
pub mod pipeline;
pub mod relay;
pub mod signer;

pub use breaker::CircuitBreaker;
pub use pipeline::{ExecutionPipeline, PipelineOutcome};
