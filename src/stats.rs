//! Execution statistics — atomic counters readable without blocking the
//! producers that update them (§5 "Shared state").

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use metrics::{counter, gauge};
use rust_decimal::Decimal;
use parking_lot::Mutex;
use serde::Serialize;

#[derive(Debug, Default)]
struct Counters {
    total_signals: AtomicU64,
    paper_executed: AtomicU64,
    live_executed: AtomicU64,
    failed: AtomicU64,
    consecutive_failures: AtomicU64,
    dropped_signals: AtomicU64,
}

/// Cumulative profit in USD is a `Decimal`, not representable atomically,
/// so it's the one field behind a short-held lock rather than an
/// `AtomicU64`; every other counter is a plain integer.
#[derive(Clone)]
pub struct ExecutionStats {
    counters: Arc<Counters>,
    cumulative_profit_usd: Arc<Mutex<Decimal>>,
}

#[derive(Debug, Serialize, Clone)]
pub struct StatsSnapshot {
    pub total_signals: u64,
    pub paper_executed: u64,
    pub live_executed: u64,
    pub failed: u64,
    pub consecutive_failures: u64,
    pub dropped_signals: u64,
    pub cumulative_profit_usd: String,
}

impl Default for ExecutionStats {
    fn default() -> Self {
        Self {
            counters: Arc::new(Counters::default()),
            cumulative_profit_usd: Arc::new(Mutex::new(Decimal::ZERO)),
        }
    }
}

impl ExecutionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_signal_received(&self) {
        self.counters.total_signals.fetch_add(1, Ordering::Relaxed);
        counter!("xarb_total_signals").increment(1);
    }

    pub fn record_dropped(&self) {
        self.counters.dropped_signals.fetch_add(1, Ordering::Relaxed);
        counter!("xarb_dropped_signals").increment(1);
    }

    pub fn record_paper_execution(&self, profit_usd: Decimal) {
        self.counters.paper_executed.fetch_add(1, Ordering::Relaxed);
        counter!("xarb_paper_executed").increment(1);
        self.record_success(profit_usd);
    }

    pub fn record_live_execution(&self, profit_usd: Decimal) {
        self.counters.live_executed.fetch_add(1, Ordering::Relaxed);
        counter!("xarb_live_executed").increment(1);
        self.record_success(profit_usd);
    }

    fn record_success(&self, profit_usd: Decimal) {
        self.counters.consecutive_failures.store(0, Ordering::Relaxed);
        gauge!("xarb_consecutive_failures").set(0.0);
        *self.cumulative_profit_usd.lock() += profit_usd;
    }

    /// Returns the new consecutive-failure count, for the circuit breaker
    /// to compare against its threshold.
    pub fn record_failure(&self) -> u64 {
        self.counters.failed.fetch_add(1, Ordering::Relaxed);
        let consecutive = self.counters.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
        counter!("xarb_failed").increment(1);
        gauge!("xarb_consecutive_failures").set(consecutive as f64);
        consecutive
    }

    /// A gate-level rejection (Stage 1-3: validation, chain gate, build).
    /// Counts toward `failed` but never toward the circuit breaker's
    /// consecutive-failure streak — those are configuration problems, not
    /// execution failures.
    pub fn record_gate_failure(&self) {
        self.counters.failed.fetch_add(1, Ordering::Relaxed);
        counter!("xarb_failed").increment(1);
    }

    pub fn consecutive_failures(&self) -> u64 {
        self.counters.consecutive_failures.load(Ordering::Relaxed)
    }

    pub fn reset_consecutive_failures(&self) {
        self.counters.consecutive_failures.store(0, Ordering::Relaxed);
        gauge!("xarb_consecutive_failures").set(0.0);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total_signals: self.counters.total_signals.load(Ordering::Relaxed),
            paper_executed: self.counters.paper_executed.load(Ordering::Relaxed),
            live_executed: self.counters.live_executed.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            consecutive_failures: self.counters.consecutive_failures.load(Ordering::Relaxed),
            dropped_signals: self.counters.dropped_signals.load(Ordering::Relaxed),
            cumulative_profit_usd: self.cumulative_profit_usd.lock().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn success_resets_consecutive_failures() {
        let stats = ExecutionStats::new();
        stats.record_failure();
        stats.record_failure();
        assert_eq!(stats.consecutive_failures(), 2);
        stats.record_paper_execution(dec!(10));
        assert_eq!(stats.consecutive_failures(), 0);
    }

    #[test]
    fn cumulative_profit_accumulates() {
        let stats = ExecutionStats::new();
        stats.record_paper_execution(dec!(10));
        stats.record_live_execution(dec!(5.5));
        assert_eq!(stats.snapshot().cumulative_profit_usd, "15.5");
    }

    #[test]
    fn dropped_signals_counted_independently() {
        let stats = ExecutionStats::new();
        stats.record_dropped();
        stats.record_dropped();
        assert_eq!(stats.snapshot().dropped_signals, 2);
    }
}
