// Batch execution: several inputs processed in order under one Job

use crate::application::worker::{run_isolated, PanicGuardResult};
use crate::domain::{batch_percent, ErrorKind, JobError};
use crate::port::{ProgressReporter, UnitOfWork, WorkResult};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, warn};

pub struct BatchItem {
    /// Display name used in progress messages and the result
    pub name: String,
    pub work: Box<dyn UnitOfWork>,
}

impl BatchItem {
    pub fn new(name: impl Into<String>, work: Box<dyn UnitOfWork>) -> Self {
        Self {
            name: name.into(),
            work,
        }
    }
}

#[derive(Debug, Serialize)]
struct BatchEntry {
    input: String,
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JobError>,
}

/// Runs items one after another.
///
/// A failing item is recorded and the batch moves on; only cancellation
/// stops it early. From the Job's point of view this is one unit whose
/// progress climbs monotonically to 100.
pub struct BatchWork {
    items: Vec<BatchItem>,
}

impl BatchWork {
    pub fn new(items: Vec<BatchItem>) -> Self {
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[async_trait]
impl UnitOfWork for BatchWork {
    async fn run(self: Box<Self>, progress: ProgressReporter) -> WorkResult {
        let total = self.items.len();
        let mut entries: Vec<BatchEntry> = Vec::with_capacity(total);

        for (index, item) in self.items.into_iter().enumerate() {
            if progress.is_cancelled() {
                return Err(cancelled(index, total));
            }
            progress.report(
                i64::from(batch_percent(index, total, 0)),
                format!("Processing {}/{}: {}", index + 1, total, item.name),
            );

            let unit = progress.for_unit(index, total);
            let error = match run_isolated(item.work.run(unit)).await {
                PanicGuardResult::Completed(Ok(output)) => {
                    debug!(job_id = %progress.job_id(), input = %item.name, "Batch input done");
                    entries.push(BatchEntry {
                        input: item.name,
                        success: true,
                        output: Some(output),
                        error: None,
                    });
                    continue;
                }
                PanicGuardResult::Completed(Err(err))
                    if err.kind == ErrorKind::Cancelled || progress.is_cancelled() =>
                {
                    return Err(cancelled(index, total));
                }
                PanicGuardResult::Completed(Err(err)) => err,
                PanicGuardResult::Panicked(_) => JobError::execution("unit of work panicked"),
                PanicGuardResult::Aborted => JobError::execution("unit of work aborted"),
            };

            warn!(
                job_id = %progress.job_id(),
                input = %item.name,
                error = %error,
                "Batch input failed"
            );
            entries.push(BatchEntry {
                input: item.name,
                success: false,
                output: None,
                error: Some(error),
            });
        }

        let success_count = entries.iter().filter(|entry| entry.success).count();
        Ok(json!({
            "type": "batch",
            "total": total,
            "success_count": success_count,
            "failed_count": total - success_count,
            "results": entries,
        }))
    }
}

fn cancelled(index: usize, total: usize) -> JobError {
    JobError::cancelled(format!("Batch stopped after {index} of {total} inputs"))
}
