// Unit of Work Port
// The external collaborator that does the real processing and reports progress.

use crate::domain::{batch_percent, clamp_percent, Job, JobError, ProgressEvent};
use crate::port::TimeProvider;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

/// Value on success, structured error on failure
pub type WorkResult = Result<serde_json::Value, JobError>;

/// A unit of work runs once, consuming itself.
///
/// Implementations report progress through the reporter they are handed and
/// may poll it for cooperative cancellation. They never see the Job directly.
#[async_trait]
pub trait UnitOfWork: Send {
    async fn run(self: Box<Self>, progress: ProgressReporter) -> WorkResult;
}

/// Adapter turning an async closure into a boxed unit of work
pub struct FnWork<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> UnitOfWork for FnWork<F>
where
    F: FnOnce(ProgressReporter) -> Fut + Send + 'static,
    Fut: Future<Output = WorkResult> + Send + 'static,
{
    async fn run(self: Box<Self>, progress: ProgressReporter) -> WorkResult {
        (self.f)(progress).await
    }
}

pub fn work_fn<F, Fut>(f: F) -> Box<dyn UnitOfWork>
where
    F: FnOnce(ProgressReporter) -> Fut + Send + 'static,
    Fut: Future<Output = WorkResult> + Send + 'static,
{
    Box::new(FnWork { f })
}

#[derive(Debug, Clone, Copy)]
struct UnitSlot {
    index: usize,
    count: usize,
}

/// Progress callback handed to a unit of work.
///
/// Inside a batch the reporter is scoped to one unit: local percentages are
/// rescaled into that unit's slice and messages get an `[i/n] ` prefix.
#[derive(Clone)]
pub struct ProgressReporter {
    job: Arc<Job>,
    clock: Arc<dyn TimeProvider>,
    slot: Option<UnitSlot>,
}

impl ProgressReporter {
    pub fn new(job: Arc<Job>, clock: Arc<dyn TimeProvider>) -> Self {
        Self {
            job,
            clock,
            slot: None,
        }
    }

    pub fn job_id(&self) -> &str {
        self.job.id()
    }

    /// Report `percent` (clamped to 0..=100) with a short message.
    /// Silently ignored once the job is terminal.
    pub fn report(&self, percent: i64, message: impl Into<String>) {
        let message = message.into();
        let (percent, message) = match self.slot {
            Some(slot) => (
                i64::from(batch_percent(slot.index, slot.count, clamp_percent(percent))),
                format!("[{}/{}] {}", slot.index + 1, slot.count, message),
            ),
            None => (percent, message),
        };
        let event = ProgressEvent::new(percent, message, self.clock.now_millis());
        self.job.update_progress(event);
    }

    /// Reporter for unit `index` of `count` within the same job
    pub fn for_unit(&self, index: usize, count: usize) -> Self {
        Self {
            job: Arc::clone(&self.job),
            clock: Arc::clone(&self.clock),
            slot: Some(UnitSlot { index, count }),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.job.is_cancel_requested()
    }

    /// Resolves when cancellation is requested
    pub async fn cancelled(&self) {
        self.job.cancelled().await
    }
}

impl std::fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("job_id", &self.job.id())
            .field("slot", &self.slot)
            .finish()
    }
}
