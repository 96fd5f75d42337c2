use std::time::Duration;

use crate::breaker::BreakerConfig;
use crate::retry::RetryConfig;

/// Tunables for a harvest run.
///
/// Defaults are deliberately gentle: the source throttles aggressive
/// clients, and a recycled browser session is cheaper than a ban.
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    /// Maximum items in flight at once (global, independent of batch size).
    pub concurrency: usize,

    /// Items per batch; the full result set is persisted after each batch.
    pub batch_size: usize,

    /// Retries per item after the first attempt.
    pub max_retries: u32,

    /// Base delay for linear per-item retry backoff.
    pub base_retry_delay: Duration,

    /// Pacing delay between batches, even when nothing failed.
    pub batch_delay: Duration,

    /// Settle delay after each item, inside its concurrency slot.
    pub item_delay: Duration,

    /// Consecutive terminal failures before the breaker trips.
    pub failure_threshold: u32,

    /// Pause after a breaker trip, before recycling the session.
    pub cooldown: Duration,

    /// Recycle the session every this many completed batches (0 disables).
    pub recycle_after_batches: usize,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            concurrency: 2,
            batch_size: 5,
            max_retries: 2,
            base_retry_delay: Duration::from_secs(5),
            batch_delay: Duration::from_secs(3),
            item_delay: Duration::from_secs(1),
            failure_threshold: 5,
            cooldown: Duration::from_secs(30),
            recycle_after_batches: 4,
        }
    }
}

impl HarvestConfig {
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.max_retries,
            base_delay: self.base_retry_delay,
        }
    }

    pub fn breaker_config(&self) -> BreakerConfig {
        BreakerConfig {
            failure_threshold: self.failure_threshold,
            cooldown: self.cooldown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sensible() {
        let config = HarvestConfig::default();
        assert_eq!(config.concurrency, 2);
        assert_eq!(config.batch_size, 5);
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.recycle_after_batches, 4);
        assert!(config.concurrency <= config.batch_size);
    }

    #[test]
    fn test_builder_overrides() {
        let config = HarvestConfig::default()
            .with_concurrency(4)
            .with_batch_size(10)
            .with_max_retries(1);
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.retry_config().max_retries, 1);
    }
}
