// Application Layer - Use Cases

pub mod batch;
pub mod manager;
pub mod publisher;
pub mod submit;
pub mod worker;

// Re-exports
pub use batch::{BatchItem, BatchWork};
pub use manager::{JobCounts, JobFilter, JobManager};
pub use publisher::{
    CompleteData, DeliveryEvent, ErrorData, LogData, ProgressData, ProgressPublisher,
};
pub use submit::{SubmissionService, SubmitRequest};
pub use worker::{PoolConfig, PoolError, PoolStats, WorkerPool};
