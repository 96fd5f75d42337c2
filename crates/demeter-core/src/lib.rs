pub mod breaker;
pub mod checkpoint;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod record;
pub mod report;
pub mod retry;
pub mod testutil;
pub mod traits;
pub mod work;

pub use breaker::{BreakerConfig, CircuitBreaker};
pub use checkpoint::ResultSet;
pub use config::HarvestConfig;
pub use error::AppError;
pub use pipeline::{HarvestPipeline, HarvestSummary};
pub use record::{NOT_FOUND, WordRecord};
pub use report::{Reporter, SilentReporter, TracingReporter};
pub use retry::{RetryConfig, RetryController};
pub use traits::{Extractor, ResultStore, SessionHandle, SessionPool};
