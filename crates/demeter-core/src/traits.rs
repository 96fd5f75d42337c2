use std::future::Future;

use crate::error::AppError;
use crate::record::WordRecord;

/// A per-attempt sub-resource borrowed from the shared session
/// (one browser page/tab).
///
/// Handles are consumed by [`close`](SessionHandle::close); the retry
/// controller funnels every attempt — success or failure — through a
/// single close call, so release does not depend on caller discipline.
pub trait SessionHandle: Send {
    fn close(self) -> impl Future<Output = ()> + Send;
}

/// Owns the lifecycle of the expensive shared session.
///
/// At most one live session exists at a time. The session is created
/// lazily on the first [`borrow`](SessionPool::borrow) and torn down by
/// [`recycle`](SessionPool::recycle), which is a no-op when no session
/// exists and is therefore safe to call repeatedly. Recycling must only
/// happen when no borrowed handles are outstanding; the scheduler
/// guarantees this by recycling at batch boundaries only.
pub trait SessionPool: Send + Sync + Clone {
    type Handle: SessionHandle;

    fn borrow(&self) -> impl Future<Output = Result<Self::Handle, AppError>> + Send;

    /// Tear down the current session so the next borrow re-creates it fresh.
    fn recycle(&self) -> impl Future<Output = ()> + Send;
}

/// Extracts a structured record for one key through a borrowed handle.
///
/// Implementations may fail with a transient error (network/timeout/
/// render). A page that renders but yields little or no data is a
/// *successful* extraction with empty fields — the orchestration layer
/// never interprets field semantics.
pub trait Extractor: Send + Sync + Clone {
    type Handle: SessionHandle;

    fn extract(
        &self,
        key: &str,
        handle: &Self::Handle,
    ) -> impl Future<Output = Result<WordRecord, AppError>> + Send;
}

/// Persists and reloads the durable result dataset.
pub trait ResultStore: Send + Sync + Clone {
    /// Load all previously persisted records. A missing dataset is an
    /// empty result, not an error.
    fn load(&self) -> impl Future<Output = Result<Vec<WordRecord>, AppError>> + Send;

    /// Rewrite the full dataset. Must leave the previous complete file
    /// intact if interrupted partway.
    fn persist(&self, records: &[WordRecord]) -> impl Future<Output = Result<(), AppError>> + Send;
}
