//! Circuit breaker for sustained extraction failure.
//!
//! Counts *consecutive* exhausted-retry failures across keys. When the
//! count reaches the threshold, the scheduler pauses for a cooldown,
//! recycles the shared session, and resets the counter before starting
//! the next batch. Failures within a batch never abort that batch — the
//! breaker only gates the next batch's start.

use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Configuration for circuit breaker behavior.
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Consecutive terminal failures before the breaker trips.
    pub failure_threshold: u32,

    /// How long the scheduler pauses after a trip, before recycling.
    pub cooldown: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Default)]
struct BreakerInner {
    consecutive_failures: u32,
    last_error: Option<String>,
}

/// Snapshot of breaker state for logging/monitoring.
#[derive(Debug, Clone)]
pub struct BreakerStats {
    pub consecutive_failures: u32,
    pub failure_threshold: u32,
    pub last_error: Option<String>,
}

/// Thread-safe consecutive-failure counter with a trip threshold.
#[derive(Clone)]
pub struct CircuitBreaker {
    config: BreakerConfig,
    inner: Arc<Mutex<BreakerInner>>,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            inner: Arc::new(Mutex::new(BreakerInner::default())),
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.config.cooldown
    }

    /// Acquires the inner mutex lock, recovering from poison if necessary.
    fn lock_inner(&self) -> std::sync::MutexGuard<'_, BreakerInner> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Recovered from poisoned breaker mutex");
            poisoned.into_inner()
        })
    }

    /// Any success clears the consecutive-failure streak.
    pub fn record_success(&self) {
        let mut inner = self.lock_inner();
        inner.consecutive_failures = 0;
        inner.last_error = None;
    }

    pub fn record_failure(&self, error: &str) {
        let mut inner = self.lock_inner();
        inner.consecutive_failures += 1;
        inner.last_error = Some(error.to_string());
        if inner.consecutive_failures == self.config.failure_threshold {
            tracing::warn!(
                failures = inner.consecutive_failures,
                error = %error,
                "Failure threshold reached, breaker will trip before the next batch"
            );
        }
    }

    /// True once the streak has reached the threshold. Checked by the
    /// scheduler before each batch.
    pub fn is_tripped(&self) -> bool {
        self.lock_inner().consecutive_failures >= self.config.failure_threshold
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.lock_inner().consecutive_failures
    }

    pub fn reset(&self) {
        let mut inner = self.lock_inner();
        inner.consecutive_failures = 0;
        inner.last_error = None;
        tracing::info!("Circuit breaker reset");
    }

    pub fn stats(&self) -> BreakerStats {
        let inner = self.lock_inner();
        BreakerStats {
            consecutive_failures: inner.consecutive_failures,
            failure_threshold: self.config.failure_threshold,
            last_error: inner.last_error.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32) -> CircuitBreaker {
        CircuitBreaker::new(BreakerConfig {
            failure_threshold: threshold,
            ..Default::default()
        })
    }

    #[test]
    fn test_starts_untripped() {
        let cb = breaker(3);
        assert!(!cb.is_tripped());
        assert_eq!(cb.consecutive_failures(), 0);
    }

    #[test]
    fn test_trips_at_threshold() {
        let cb = breaker(3);
        for _ in 0..3 {
            cb.record_failure("timeout");
        }
        assert!(cb.is_tripped());
    }

    #[test]
    fn test_stays_below_threshold() {
        let cb = breaker(5);
        for _ in 0..4 {
            cb.record_failure("timeout");
        }
        assert!(!cb.is_tripped());
    }

    #[test]
    fn test_single_success_resets_streak() {
        let cb = breaker(5);
        for _ in 0..4 {
            cb.record_failure("timeout");
        }
        cb.record_success();
        for _ in 0..4 {
            cb.record_failure("timeout");
        }
        assert!(!cb.is_tripped());
    }

    #[test]
    fn test_reset_clears_state() {
        let cb = breaker(1);
        cb.record_failure("timeout");
        assert!(cb.is_tripped());
        cb.reset();
        assert!(!cb.is_tripped());
        assert!(cb.stats().last_error.is_none());
    }

    #[test]
    fn test_stats_carry_last_error() {
        let cb = breaker(5);
        cb.record_failure("connection reset");
        let stats = cb.stats();
        assert_eq!(stats.consecutive_failures, 1);
        assert_eq!(stats.failure_threshold, 5);
        assert_eq!(stats.last_error.as_deref(), Some("connection reset"));
    }
}
