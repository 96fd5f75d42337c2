//! The batch scheduler: the top-level driver and the only component with
//! global ordering authority.
//!
//! For each run it computes the pending set (distinct input keys minus
//! the checkpoint), partitions it into fixed-size batches, fans each
//! batch out under a bounded concurrency limit, and persists the full
//! result set after every batch so an interrupted run resumes exactly
//! where it left off. Between batches it consults the circuit breaker,
//! recycles the shared session on a fixed cadence, and paces itself to
//! respect source-side rate limits.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::breaker::CircuitBreaker;
use crate::checkpoint::ResultSet;
use crate::config::HarvestConfig;
use crate::record::WordRecord;
use crate::report::{HarvestEvent, RecycleReason, Reporter};
use crate::retry::{ItemOutcome, RetryController};
use crate::traits::{Extractor, ResultStore, SessionPool};
use crate::work::{ItemState, WorkItem, dedupe_keys};

/// Totals for one completed (or interrupted) run.
#[derive(Debug, Clone, Serialize)]
pub struct HarvestSummary {
    /// Distinct keys in the input.
    pub total_keys: usize,
    /// Keys skipped because they were already checkpointed.
    pub skipped: usize,
    /// Keys newly recorded with real data this run.
    pub succeeded: usize,
    /// Keys newly recorded with the sentinel this run.
    pub failed: usize,
    /// Times the circuit breaker tripped.
    pub breaker_trips: u32,
    /// True if the run stopped early on operator request.
    pub interrupted: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_secs: f64,
}

impl HarvestSummary {
    /// Share of newly processed keys that succeeded, in percent.
    /// A run that processed nothing counts as fully successful.
    pub fn success_rate(&self) -> f64 {
        let processed = self.succeeded + self.failed;
        if processed == 0 {
            100.0
        } else {
            self.succeeded as f64 * 100.0 / processed as f64
        }
    }
}

/// Drives a full harvest over a key list.
///
/// Generic over the session pool, the extraction adapter, and the result
/// store, enabling dependency injection and testability without a real
/// browser or filesystem.
pub struct HarvestPipeline<P, E, S>
where
    P: SessionPool,
    E: Extractor<Handle = P::Handle>,
    S: ResultStore,
{
    pool: P,
    controller: RetryController<P, E>,
    store: S,
    breaker: CircuitBreaker,
    config: HarvestConfig,
}

impl<P, E, S> HarvestPipeline<P, E, S>
where
    P: SessionPool + 'static,
    E: Extractor<Handle = P::Handle> + 'static,
    S: ResultStore,
{
    pub fn new(pool: P, extractor: E, store: S, config: HarvestConfig) -> Self {
        let controller = RetryController::new(pool.clone(), extractor, config.retry_config());
        let breaker = CircuitBreaker::new(config.breaker_config());
        Self {
            pool,
            controller,
            store,
            breaker,
            config,
        }
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Run the pipeline over the given input keys until done or cancelled.
    ///
    /// Never fails: per-key errors degrade to sentinel records, a failed
    /// checkpoint load degrades to a fresh start, and a failed persist is
    /// retried implicitly by the next batch's full rewrite.
    pub async fn run<R: Reporter>(
        &self,
        input_keys: &[String],
        cancel: CancellationToken,
        reporter: &R,
    ) -> HarvestSummary {
        let started_at = Utc::now();
        let clock = Instant::now();

        // Checkpoint: keys already present in the persisted dataset.
        // A broken dataset is a degraded start, not an abort.
        let existing = match self.store.load().await {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(error = %e, "Could not read prior results, starting fresh");
                Vec::new()
            }
        };
        let mut results = ResultSet::from_records(existing);

        let distinct = dedupe_keys(input_keys);
        let total_keys = distinct.len();
        let pending: Vec<String> = distinct
            .into_iter()
            .filter(|key| !results.contains(key))
            .collect();
        let skipped = total_keys - pending.len();

        let batch_size = self.config.batch_size.max(1);
        let total_batches = pending.len().div_ceil(batch_size);

        reporter.report(HarvestEvent::RunStarted {
            total_keys,
            skipped,
            pending: pending.len(),
            batches: total_batches,
        });

        let mut succeeded = 0usize;
        let mut failed = 0usize;
        let mut breaker_trips = 0u32;
        let mut interrupted = false;

        if !pending.is_empty() {
            for (batch_idx, chunk) in pending.chunks(batch_size).enumerate() {
                let batch = batch_idx + 1;

                if cancel.is_cancelled() {
                    interrupted = true;
                    break;
                }

                // The breaker gates the *start* of a batch, never the
                // batch in progress.
                if self.breaker.is_tripped() {
                    breaker_trips += 1;
                    reporter.report(HarvestEvent::BreakerTripped {
                        failures: self.breaker.consecutive_failures(),
                        cooldown: self.breaker.cooldown(),
                    });
                    if !self.pause(self.breaker.cooldown(), &cancel).await {
                        interrupted = true;
                        break;
                    }
                    self.pool.recycle().await;
                    reporter.report(HarvestEvent::SessionRecycled {
                        reason: RecycleReason::BreakerTrip,
                    });
                    self.breaker.reset();
                }

                reporter.report(HarvestEvent::BatchStarted {
                    batch,
                    batches: total_batches,
                    size: chunk.len(),
                });

                let outcomes = self.run_batch(chunk).await;

                let mut batch_succeeded = 0usize;
                let mut batch_failed = 0usize;
                for outcome in outcomes {
                    if outcome.succeeded() {
                        batch_succeeded += 1;
                        self.breaker.record_success();
                    } else {
                        batch_failed += 1;
                        self.breaker
                            .record_failure(outcome.error.as_deref().unwrap_or("unknown"));
                    }
                    reporter.report(HarvestEvent::ItemFinished {
                        key: &outcome.item.key,
                        attempts: outcome.item.attempt,
                        succeeded: outcome.succeeded(),
                    });
                    results.merge(outcome.record);
                }
                succeeded += batch_succeeded;
                failed += batch_failed;

                // Persist the full set immediately: the file on disk after
                // batch N is a complete, valid dataset.
                match self.store.persist(results.records()).await {
                    Ok(()) => reporter.report(HarvestEvent::Persisted {
                        records: results.len(),
                    }),
                    Err(e) => {
                        let error = e.to_string();
                        reporter.report(HarvestEvent::PersistFailed { error: &error });
                    }
                }

                reporter.report(HarvestEvent::BatchCompleted {
                    batch,
                    succeeded: batch_succeeded,
                    failed: batch_failed,
                });

                let last_batch = batch == total_batches;

                // Memory hygiene: a long-lived browser session accumulates
                // render state, so start a fresh epoch every few batches.
                if !last_batch
                    && self.config.recycle_after_batches > 0
                    && batch % self.config.recycle_after_batches == 0
                {
                    self.pool.recycle().await;
                    reporter.report(HarvestEvent::SessionRecycled {
                        reason: RecycleReason::Cadence,
                    });
                }

                if !last_batch && !self.pause(self.config.batch_delay, &cancel).await {
                    interrupted = true;
                    break;
                }
            }

            // Release the shared session on every exit path.
            self.pool.recycle().await;
            reporter.report(HarvestEvent::SessionRecycled {
                reason: RecycleReason::Shutdown,
            });
        }

        let summary = HarvestSummary {
            total_keys,
            skipped,
            succeeded,
            failed,
            breaker_trips,
            interrupted,
            started_at,
            finished_at: Utc::now(),
            duration_secs: clock.elapsed().as_secs_f64(),
        };
        reporter.report(HarvestEvent::RunCompleted { summary: &summary });
        summary
    }

    /// Dispatch one batch: all items concurrently, bounded by the global
    /// concurrency limit, with a synchronous barrier at the end.
    ///
    /// Each item runs in its own task so that anything escaping the
    /// per-key retry boundary (a panic, in practice) surfaces as a join
    /// error and degrades to a terminal-failure record instead of
    /// dropping the key or aborting the run.
    async fn run_batch(&self, keys: &[String]) -> Vec<ItemOutcome> {
        let concurrency = self.config.concurrency.max(1);
        let item_delay = self.config.item_delay;

        stream::iter(keys.iter().cloned())
            .map(|key| {
                let controller = self.controller.clone();
                async move {
                    let mut item = WorkItem::new(key.clone());
                    item.state = ItemState::InFlight;
                    let task = tokio::spawn(async move {
                        let outcome = controller.attempt(item).await;
                        // Settle inside the slot before freeing it.
                        if !item_delay.is_zero() {
                            tokio::time::sleep(item_delay).await;
                        }
                        outcome
                    });
                    match task.await {
                        Ok(outcome) => outcome,
                        Err(e) => {
                            tracing::error!(
                                key = %key,
                                error = %e,
                                "Item task died unexpectedly, recording terminal failure"
                            );
                            let mut item = WorkItem::new(key.clone());
                            item.state = ItemState::Failed;
                            ItemOutcome {
                                item,
                                record: WordRecord::not_found(&key),
                                error: Some(e.to_string()),
                            }
                        }
                    }
                }
            })
            .buffer_unordered(concurrency)
            .collect()
            .await
    }

    /// Cancellation-aware sleep. Returns false if cancelled first.
    async fn pause(&self, delay: Duration, cancel: &CancellationToken) -> bool {
        if delay.is_zero() {
            return !cancel.is_cancelled();
        }
        tokio::select! {
            () = tokio::time::sleep(delay) => true,
            () = cancel.cancelled() => false,
        }
    }
}
