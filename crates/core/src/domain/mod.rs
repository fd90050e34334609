// Domain Layer - Pure job bookkeeping

pub mod error;
pub mod job;
pub mod job_error;
pub mod kind;
pub mod progress;

// Re-exports
pub use error::DomainError;
pub use job::{
    CancelOutcome, Job, JobId, JobSnapshot, JobStatus, LogLine, DEFAULT_LOG_CAPACITY,
};
pub use job_error::{ErrorKind, JobError};
pub use kind::JobKind;
pub use progress::{batch_percent, clamp_percent, ProgressEvent};
