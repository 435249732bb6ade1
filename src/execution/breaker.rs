//! Circuit breaker — §4.9 "Stage 5 and the circuit breaker", §8 Scenario E.
//!
//! Opens after `threshold` consecutive post-simulation failures, rejecting
//! every signal for `cooldown` before trying again. Built on the
//! consecutive-failure counter `ExecutionStats` already tracks rather than
//! keeping its own — there is exactly one source of truth for that count.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::{EngineError, EngineResult};
use crate::stats::ExecutionStats;

pub const DEFAULT_THRESHOLD: u64 = 10;
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(60);

pub struct CircuitBreaker {
    stats: ExecutionStats,
    threshold: u64,
    cooldown: Duration,
    /// Unix timestamp the breaker may close again, 0 while closed.
    cooldown_until_unix: AtomicU64,
}

impl CircuitBreaker {
    pub fn new(stats: ExecutionStats) -> Self {
        Self::with_params(stats, DEFAULT_THRESHOLD, DEFAULT_COOLDOWN)
    }

    pub fn with_params(stats: ExecutionStats, threshold: u64, cooldown: Duration) -> Self {
        Self { stats, threshold, cooldown, cooldown_until_unix: AtomicU64::new(0) }
    }

    /// Reject with `CircuitBreakerOpen` if the breaker is currently tripped.
    /// Call before Stage 5 on every pipeline run.
    pub fn check(&self) -> EngineResult<()> {
        let until = self.cooldown_until_unix.load(Ordering::Acquire);
        if until == 0 {
            return Ok(());
        }
        if now_unix() >= until {
            self.cooldown_until_unix.store(0, Ordering::Release);
            self.stats.reset_consecutive_failures();
            return Ok(());
        }
        Err(EngineError::CircuitBreakerOpen { cooldown_until_unix: until })
    }

    /// Record a post-simulation failure. Trips the breaker once the
    /// consecutive count reaches `threshold`.
    pub fn record_failure(&self) {
        let consecutive = self.stats.record_failure();
        if consecutive >= self.threshold {
            let until = now_unix() + self.cooldown.as_secs();
            self.cooldown_until_unix.store(until, Ordering::Release);
        }
    }

    pub fn record_success(&self) {
        self.stats.reset_consecutive_failures();
    }

    pub fn is_open(&self) -> bool {
        self.cooldown_until_unix.load(Ordering::Acquire) != 0
    }
}

fn now_unix() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stays_closed_below_threshold() {
        let breaker = CircuitBreaker::with_params(ExecutionStats::new(), 10, Duration::from_secs(60));
        for _ in 0..9 {
            breaker.record_failure();
        }
        assert!(breaker.check().is_ok());
        assert!(!breaker.is_open());
    }

    #[test]
    fn opens_at_threshold() {
        let breaker = CircuitBreaker::with_params(ExecutionStats::new(), 10, Duration::from_secs(60));
        for _ in 0..10 {
            breaker.record_failure();
        }
        assert!(breaker.is_open());
        assert!(matches!(breaker.check(), Err(EngineError::CircuitBreakerOpen { .. })));
    }

    #[test]
    fn success_resets_the_consecutive_counter() {
        let stats = ExecutionStats::new();
        let breaker = CircuitBreaker::with_params(stats.clone(), 10, Duration::from_secs(60));
        for _ in 0..9 {
            breaker.record_failure();
        }
        breaker.record_success();
        assert_eq!(stats.consecutive_failures(), 0);
        for _ in 0..9 {
            breaker.record_failure();
        }
        assert!(!breaker.is_open());
    }

    #[test]
    fn closes_again_after_cooldown_elapses() {
        let breaker = CircuitBreaker::with_params(ExecutionStats::new(), 1, Duration::from_secs(0));
        breaker.record_failure();
        assert!(breaker.is_open());
        // cooldown of 0s means now_unix() >= until is true on the very next check
        assert!(breaker.check().is_ok());
        assert!(!breaker.is_open());
    }
}
