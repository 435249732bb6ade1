//! Error taxonomy for the arbitrage engine.
//!
//! One variant per error kind named in the spec's error-handling design.
//! Library code returns `Result<T, EngineError>` throughout; binaries
//! convert to `anyhow::Result` at the `main` boundary.

use thiserror::Error;

/// Top-level error kind. Each variant carries enough structure to render
/// the `{stage, reason}` shape the control plane returns to callers.
#[derive(Debug, Error, Clone)]
pub enum EngineError {
    #[error("config error: {0}")]
    Config(String),

    #[error("{key} not registered")]
    NotRegistered { key: String },

    #[error("rpc error on chain {chain_id}: {message}")]
    Rpc { chain_id: u64, message: String },

    #[error("unpriceable: {0}")]
    Unpriceable(String),

    #[error("insufficient liquidity: requested {requested}, cap {cap}")]
    InsufficientLiquidity { requested: String, cap: String },

    #[error("not profitable: net ${net} < min ${min}")]
    NotProfitable { net: String, min: String },

    #[error("calldata exceeds {limit} bytes (got {actual})")]
    CalldataTooLarge { limit: usize, actual: usize },

    #[error("simulation reverted: {reason}")]
    SimulationReverted { reason: String },

    #[error("execution blocked: {reason}")]
    ExecutionBlocked { reason: String },

    #[error("circuit breaker open, cooldown until {cooldown_until_unix}")]
    CircuitBreakerOpen { cooldown_until_unix: u64 },

    #[error("nonce collision on chain {chain_id}")]
    NonceCollision { chain_id: u64 },

    #[error("relay submission failed: {0}")]
    RelaySubmissionFailed(String),

    #[error("signing blocked at sub-gate {sub_gate}: {reason}")]
    SigningBlocked { sub_gate: char, reason: String },

    #[error("cancelled")]
    Cancelled,
}

impl EngineError {
    /// The pipeline stage this error was produced at, for the `/execute`
    /// response's machine-readable `stage` field. Returns `None` for
    /// errors that never reach the execution pipeline (e.g. registry
    /// lookups during scanning).
    pub fn stage(&self) -> Option<&'static str> {
        match self {
            EngineError::CalldataTooLarge { .. } => Some("build"),
            EngineError::SimulationReverted { .. } => Some("simulate"),
            EngineError::ExecutionBlocked { .. } => Some("chain-gate"),
            EngineError::SigningBlocked { .. } => Some("sign"),
            EngineError::CircuitBreakerOpen { .. } => Some("sign"),
            EngineError::RelaySubmissionFailed(_) => Some("submit"),
            EngineError::NonceCollision { .. } => Some("sign"),
            _ => None,
        }
    }

    /// Whether a retry of the same signal end-to-end could plausibly
    /// succeed without operator intervention.
    pub fn retriable(&self) -> bool {
        matches!(
            self,
            EngineError::Rpc { .. }
                | EngineError::CircuitBreakerOpen { .. }
                | EngineError::NonceCollision { .. }
        )
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
