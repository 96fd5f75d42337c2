//! Test utilities: mock implementations of all core traits.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::error::AppError;
use crate::record::WordRecord;
use crate::report::{HarvestEvent, Reporter};
use crate::traits::{Extractor, ResultStore, SessionHandle, SessionPool};

// ---------------------------------------------------------------------------
// MockPool / MockHandle
// ---------------------------------------------------------------------------

/// Mock session handle that records its release on a shared counter.
pub struct MockHandle {
    closes: Arc<Mutex<usize>>,
}

impl SessionHandle for MockHandle {
    async fn close(self) {
        *self.closes.lock().unwrap() += 1;
    }
}

/// Mock session pool with scripted borrow failures and call counters.
#[derive(Clone)]
pub struct MockPool {
    /// Queue of errors returned by `borrow` before it starts succeeding.
    borrow_errors: Arc<Mutex<Vec<AppError>>>,
    borrows: Arc<Mutex<usize>>,
    closes: Arc<Mutex<usize>>,
    recycles: Arc<Mutex<usize>>,
}

impl MockPool {
    pub fn new() -> Self {
        Self::with_borrow_errors(Vec::new())
    }

    pub fn with_borrow_errors(errors: Vec<AppError>) -> Self {
        Self {
            borrow_errors: Arc::new(Mutex::new(errors)),
            borrows: Arc::new(Mutex::new(0)),
            closes: Arc::new(Mutex::new(0)),
            recycles: Arc::new(Mutex::new(0)),
        }
    }

    pub fn borrow_count(&self) -> usize {
        *self.borrows.lock().unwrap()
    }

    /// How many borrowed handles have been closed.
    pub fn close_count(&self) -> usize {
        *self.closes.lock().unwrap()
    }

    pub fn recycle_count(&self) -> usize {
        *self.recycles.lock().unwrap()
    }
}

impl Default for MockPool {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionPool for MockPool {
    type Handle = MockHandle;

    async fn borrow(&self) -> Result<MockHandle, AppError> {
        let mut errors = self.borrow_errors.lock().unwrap();
        if !errors.is_empty() {
            return Err(errors.remove(0));
        }
        drop(errors);
        *self.borrows.lock().unwrap() += 1;
        Ok(MockHandle {
            closes: Arc::clone(&self.closes),
        })
    }

    async fn recycle(&self) {
        *self.recycles.lock().unwrap() += 1;
    }
}

// ---------------------------------------------------------------------------
// MockExtractor
// ---------------------------------------------------------------------------

/// Mock extractor with a scripted response queue and per-key failure set.
///
/// The global queue (if non-empty) is consumed first; otherwise keys in
/// the failing set error and everything else succeeds with a minimal
/// record.
#[derive(Clone)]
pub struct MockExtractor {
    responses: Arc<Mutex<Vec<Result<WordRecord, AppError>>>>,
    failing_keys: Arc<HashSet<String>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockExtractor {
    /// Succeeds for every key.
    pub fn ok() -> Self {
        Self::with_failing_keys(&[])
    }

    pub fn with_failing_keys(keys: &[&str]) -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            failing_keys: Arc::new(keys.iter().map(|k| k.to_string()).collect()),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_responses(responses: Vec<Result<WordRecord, AppError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            failing_keys: Arc::new(HashSet::new()),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Keys passed to `extract`, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl Extractor for MockExtractor {
    type Handle = MockHandle;

    async fn extract(&self, key: &str, _handle: &MockHandle) -> Result<WordRecord, AppError> {
        self.calls.lock().unwrap().push(key.to_string());

        let mut responses = self.responses.lock().unwrap();
        if !responses.is_empty() {
            return responses.remove(0);
        }
        drop(responses);

        if self.failing_keys.contains(key) {
            return Err(AppError::NetworkError(format!("no route to host for {key}")));
        }
        let mut record = WordRecord::empty(key);
        record.vietnamese_meaning = format!("meaning-{key}");
        Ok(record)
    }
}

// ---------------------------------------------------------------------------
// MockStore
// ---------------------------------------------------------------------------

/// Mock result store backed by an in-memory "file".
///
/// `persist` overwrites the stored records like the real whole-file
/// rewrite, so resume scenarios behave exactly as with a CSV on disk.
#[derive(Clone)]
pub struct MockStore {
    records: Arc<Mutex<Vec<WordRecord>>>,
    load_error: Arc<Mutex<Option<AppError>>>,
    persist_error: Arc<Mutex<Option<AppError>>>,
    persists: Arc<Mutex<usize>>,
}

impl MockStore {
    /// Empty store — first run, no previous data.
    pub fn empty() -> Self {
        Self::with_records(Vec::new())
    }

    pub fn with_records(records: Vec<WordRecord>) -> Self {
        Self {
            records: Arc::new(Mutex::new(records)),
            load_error: Arc::new(Mutex::new(None)),
            persist_error: Arc::new(Mutex::new(None)),
            persists: Arc::new(Mutex::new(0)),
        }
    }

    /// The next `load` call fails once, then loads normally.
    pub fn with_load_error(error: AppError) -> Self {
        let store = Self::empty();
        *store.load_error.lock().unwrap() = Some(error);
        store
    }

    /// The next `persist` call fails once, then persists normally.
    pub fn fail_next_persist(&self, error: AppError) {
        *self.persist_error.lock().unwrap() = Some(error);
    }

    /// Snapshot of the currently persisted records.
    pub fn records(&self) -> Vec<WordRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn persist_count(&self) -> usize {
        *self.persists.lock().unwrap()
    }
}

impl ResultStore for MockStore {
    async fn load(&self) -> Result<Vec<WordRecord>, AppError> {
        if let Some(e) = self.load_error.lock().unwrap().take() {
            return Err(e);
        }
        Ok(self.records.lock().unwrap().clone())
    }

    async fn persist(&self, records: &[WordRecord]) -> Result<(), AppError> {
        if let Some(e) = self.persist_error.lock().unwrap().take() {
            return Err(e);
        }
        *self.records.lock().unwrap() = records.to_vec();
        *self.persists.lock().unwrap() += 1;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// RecordingReporter
// ---------------------------------------------------------------------------

/// Reporter that records a compact tag per event, for ordering asserts.
#[derive(Clone)]
pub struct RecordingReporter {
    events: Arc<Mutex<Vec<String>>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl Default for RecordingReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Reporter for RecordingReporter {
    fn report(&self, event: HarvestEvent<'_>) {
        let tag = match event {
            HarvestEvent::RunStarted { pending, .. } => format!("run_started:{pending}"),
            HarvestEvent::BatchStarted { batch, .. } => format!("batch_started:{batch}"),
            HarvestEvent::ItemFinished { key, succeeded, .. } => {
                format!("item:{key}:{}", if succeeded { "ok" } else { "failed" })
            }
            HarvestEvent::BatchCompleted { batch, .. } => format!("batch_completed:{batch}"),
            HarvestEvent::Persisted { records } => format!("persisted:{records}"),
            HarvestEvent::PersistFailed { .. } => "persist_failed".to_string(),
            HarvestEvent::BreakerTripped { .. } => "breaker_tripped".to_string(),
            HarvestEvent::SessionRecycled { reason } => format!("recycled:{}", reason.as_str()),
            HarvestEvent::RunCompleted { .. } => "run_completed".to_string(),
        };
        self.events.lock().unwrap().push(tag);
    }
}
