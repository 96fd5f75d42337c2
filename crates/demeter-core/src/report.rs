use std::time::Duration;

use crate::pipeline::HarvestSummary;

/// Why the shared session was recycled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecycleReason {
    /// The circuit breaker tripped.
    BreakerTrip,
    /// The fixed every-N-batches memory-hygiene cadence.
    Cadence,
    /// End of run.
    Shutdown,
}

impl RecycleReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecycleReason::BreakerTrip => "breaker-trip",
            RecycleReason::Cadence => "cadence",
            RecycleReason::Shutdown => "shutdown",
        }
    }
}

/// Events emitted by the pipeline for monitoring/logging.
#[derive(Debug, Clone)]
pub enum HarvestEvent<'a> {
    RunStarted {
        total_keys: usize,
        skipped: usize,
        pending: usize,
        batches: usize,
    },
    BatchStarted {
        batch: usize,
        batches: usize,
        size: usize,
    },
    ItemFinished {
        key: &'a str,
        attempts: u32,
        succeeded: bool,
    },
    BatchCompleted {
        batch: usize,
        succeeded: usize,
        failed: usize,
    },
    Persisted {
        records: usize,
    },
    PersistFailed {
        error: &'a str,
    },
    BreakerTripped {
        failures: u32,
        cooldown: Duration,
    },
    SessionRecycled {
        reason: RecycleReason,
    },
    RunCompleted {
        summary: &'a HarvestSummary,
    },
}

/// Trait for receiving pipeline events (decoupled logging).
pub trait Reporter: Send + Sync {
    fn report(&self, event: HarvestEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that discards all events.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentReporter;

impl Reporter for SilentReporter {}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn report(&self, event: HarvestEvent<'_>) {
        match event {
            HarvestEvent::RunStarted {
                total_keys,
                skipped,
                pending,
                batches,
            } => {
                if pending == 0 {
                    tracing::info!(%total_keys, %skipped, "All keys already recorded, nothing to do");
                } else {
                    tracing::info!(%total_keys, %skipped, %pending, %batches, "Harvest run started");
                }
            }
            HarvestEvent::BatchStarted {
                batch,
                batches,
                size,
            } => {
                tracing::info!(%batch, %batches, %size, "Processing batch");
            }
            HarvestEvent::ItemFinished {
                key,
                attempts,
                succeeded,
            } => {
                if succeeded {
                    tracing::info!(%key, %attempts, "Extracted");
                } else {
                    tracing::warn!(%key, %attempts, "Recorded terminal failure");
                }
            }
            HarvestEvent::BatchCompleted {
                batch,
                succeeded,
                failed,
            } => {
                tracing::info!(%batch, %succeeded, %failed, "Batch completed");
            }
            HarvestEvent::Persisted { records } => {
                tracing::info!(%records, "Progress saved");
            }
            HarvestEvent::PersistFailed { error } => {
                tracing::error!(%error, "Failed to persist progress, continuing");
            }
            HarvestEvent::BreakerTripped { failures, cooldown } => {
                tracing::warn!(
                    %failures,
                    cooldown_secs = cooldown.as_secs(),
                    "Circuit breaker tripped, cooling down before a fresh session"
                );
            }
            HarvestEvent::SessionRecycled { reason } => {
                tracing::info!(reason = reason.as_str(), "Session recycled");
            }
            HarvestEvent::RunCompleted { summary } => {
                tracing::info!(
                    total_keys = summary.total_keys,
                    skipped = summary.skipped,
                    succeeded = summary.succeeded,
                    failed = summary.failed,
                    success_rate = summary.success_rate(),
                    duration_secs = summary.duration_secs,
                    interrupted = summary.interrupted,
                    "Harvest run completed"
                );
            }
        }
    }
}
