//! Cross-venue DEX arbitrage discovery and execution engine.
//!
//! Two binaries share this library: `xarb-core` (the discovery brain,
//! `src/main.rs`) scans for opportunities and emits `TradeSignal`s;
//! `xarb-executor` (`src/bin/executor_server.rs`) runs the execution
//! pipeline behind an HTTP + WebSocket control plane.

pub mod advisory;
pub mod chains;
pub mod config;
pub mod contracts;
pub mod control_plane;
pub mod error;
pub mod execution;
pub mod graph;
pub mod pricing;
pub mod profitability;
pub mod registry;
pub mod scan;
pub mod signal;
pub mod stats;
pub mod types;

pub use error::{EngineError, EngineResult};
