use std::time::Duration;

use crate::error::AppError;
use crate::record::WordRecord;
use crate::traits::{Extractor, SessionHandle, SessionPool};
use crate::work::{ItemState, WorkItem};

/// Retry configuration with linear backoff.
///
/// Delay schedule for `base_delay = 5s`: 5s, 10s, 15s, …
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt (total attempts = `max_retries + 1`).
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_secs(5),
        }
    }
}

impl RetryConfig {
    /// Delay after a failed attempt (1-indexed): `attempt × base_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

/// The terminal outcome of one work item: exactly one record per item,
/// regardless of how many attempts it took.
#[derive(Debug, Clone)]
pub struct ItemOutcome {
    pub item: WorkItem,
    pub record: WordRecord,
    /// Message of the last attempt error for failed items.
    pub error: Option<String>,
}

impl ItemOutcome {
    pub fn succeeded(&self) -> bool {
        self.item.state == ItemState::Succeeded
    }
}

/// Wraps a single key's extraction with bounded retries.
///
/// Every call returns an [`ItemOutcome`] — success or terminal failure —
/// so a bad key is never fatal to its batch. The controller does not
/// touch the circuit breaker; the scheduler feeds outcomes into it.
#[derive(Clone)]
pub struct RetryController<P, E>
where
    P: SessionPool,
    E: Extractor<Handle = P::Handle>,
{
    pool: P,
    extractor: E,
    config: RetryConfig,
}

impl<P, E> RetryController<P, E>
where
    P: SessionPool,
    E: Extractor<Handle = P::Handle>,
{
    pub fn new(pool: P, extractor: E, config: RetryConfig) -> Self {
        Self {
            pool,
            extractor,
            config,
        }
    }

    /// Drive one item to a terminal state.
    pub async fn attempt(&self, mut item: WorkItem) -> ItemOutcome {
        let total_attempts = self.config.max_retries + 1;

        loop {
            item.attempt += 1;
            match self.attempt_once(&item.key).await {
                Ok(record) => {
                    item.state = ItemState::Succeeded;
                    return ItemOutcome {
                        item,
                        record,
                        error: None,
                    };
                }
                Err(e) if item.attempt < total_attempts => {
                    let delay = self.config.delay_for_attempt(item.attempt);
                    tracing::warn!(
                        key = %item.key,
                        attempt = item.attempt,
                        max_attempts = total_attempts,
                        error = %e,
                        delay_ms = %delay.as_millis(),
                        "Attempt failed, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    tracing::warn!(
                        key = %item.key,
                        attempts = item.attempt,
                        error = %e,
                        "Retries exhausted, recording terminal failure"
                    );
                    item.state = ItemState::Failed;
                    let record = WordRecord::not_found(&item.key);
                    return ItemOutcome {
                        item,
                        record,
                        error: Some(e.to_string()),
                    };
                }
            }
        }
    }

    /// One attempt: borrow a handle, extract, release the handle.
    ///
    /// The handle is closed on both arms, so an extraction error can
    /// never leak a page. A borrow failure is an attempt failure like
    /// any other.
    async fn attempt_once(&self, key: &str) -> Result<WordRecord, AppError> {
        let handle = self.pool.borrow().await?;
        let result = self.extractor.extract(key, &handle).await;
        handle.close().await;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{MockExtractor, MockPool};

    fn controller(
        pool: MockPool,
        extractor: MockExtractor,
        max_retries: u32,
    ) -> RetryController<MockPool, MockExtractor> {
        RetryController::new(
            pool,
            extractor,
            RetryConfig {
                max_retries,
                base_delay: Duration::from_millis(100),
            },
        )
    }

    fn in_flight(key: &str) -> WorkItem {
        let mut item = WorkItem::new(key);
        item.state = ItemState::InFlight;
        item
    }

    #[test]
    fn test_linear_delay_schedule() {
        let config = RetryConfig {
            max_retries: 3,
            base_delay: Duration::from_secs(5),
        };
        assert_eq!(config.delay_for_attempt(1), Duration::from_secs(5));
        assert_eq!(config.delay_for_attempt(2), Duration::from_secs(10));
        assert_eq!(config.delay_for_attempt(3), Duration::from_secs(15));
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let pool = MockPool::new();
        let extractor = MockExtractor::ok();
        let outcome = controller(pool.clone(), extractor.clone(), 2)
            .attempt(in_flight("你好"))
            .await;

        assert!(outcome.succeeded());
        assert_eq!(outcome.item.attempt, 1);
        assert_eq!(outcome.record.key(), "你好");
        assert!(outcome.error.is_none());
        assert_eq!(extractor.call_count(), 1);
        assert_eq!(pool.close_count(), 1);
    }

    #[tokio::test]
    async fn test_always_failing_key_attempted_exactly_max_retries_plus_one() {
        let pool = MockPool::new();
        let extractor = MockExtractor::with_failing_keys(&["坏"]);
        let outcome = controller(pool.clone(), extractor.clone(), 2)
            .attempt(in_flight("坏"))
            .await;

        assert!(!outcome.succeeded());
        assert_eq!(outcome.item.state, ItemState::Failed);
        assert_eq!(outcome.item.attempt, 3);
        assert_eq!(extractor.call_count(), 3);
        assert!(outcome.record.is_not_found());
        assert!(outcome.error.is_some());
    }

    #[tokio::test]
    async fn test_success_after_transient_failures() {
        let pool = MockPool::new();
        let extractor = MockExtractor::with_responses(vec![
            Err(AppError::NetworkError("reset".into())),
            Ok(WordRecord::empty("好")),
        ]);
        let outcome = controller(pool, extractor, 2).attempt(in_flight("好")).await;

        assert!(outcome.succeeded());
        assert_eq!(outcome.item.attempt, 2);
    }

    #[tokio::test]
    async fn test_borrow_failure_counts_as_attempt_failure() {
        let pool = MockPool::with_borrow_errors(vec![
            AppError::PoolError("no session".into()),
            AppError::PoolError("no session".into()),
            AppError::PoolError("no session".into()),
        ]);
        let extractor = MockExtractor::ok();
        let outcome = controller(pool, extractor.clone(), 2)
            .attempt(in_flight("词"))
            .await;

        assert!(!outcome.succeeded());
        assert_eq!(outcome.item.attempt, 3);
        // The adapter never ran: the borrow itself kept failing.
        assert_eq!(extractor.call_count(), 0);
        assert!(outcome.record.is_not_found());
    }

    #[tokio::test]
    async fn test_handle_released_on_every_failed_attempt() {
        let pool = MockPool::new();
        let extractor = MockExtractor::with_failing_keys(&["坏"]);
        let _ = controller(pool.clone(), extractor, 2)
            .attempt(in_flight("坏"))
            .await;

        assert_eq!(pool.borrow_count(), 3);
        assert_eq!(pool.close_count(), 3);
    }
}
