// Submission Service - validate, build units, create and queue one Job

pub mod validate;

pub use validate::{
    default_label, display_name, validate_request, MAX_BATCH_INPUTS, MAX_LABEL_LEN,
    MAX_SETTINGS_DEPTH,
};

use crate::application::batch::{BatchItem, BatchWork};
use crate::application::manager::JobManager;
use crate::domain::{Job, JobKind};
use crate::error::{AppError, Result};
use crate::port::{UnitOfWork, WorkFactory};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

fn empty_settings() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

/// Submission request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub kind: JobKind,
    pub inputs: Vec<String>,
    #[serde(default = "empty_settings")]
    pub settings: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

pub struct SubmissionService {
    manager: Arc<JobManager>,
    factory: Arc<dyn WorkFactory>,
}

impl SubmissionService {
    pub fn new(manager: Arc<JobManager>, factory: Arc<dyn WorkFactory>) -> Self {
        Self { manager, factory }
    }

    pub fn manager(&self) -> &Arc<JobManager> {
        &self.manager
    }

    /// Create and queue a job for `req`.
    ///
    /// One input runs as a single unit; several run as a batch under one Job.
    ///
    /// # Errors
    /// - `AppError::Validation` before any Job is created
    /// - `AppError::Rejected` when the pool is full (the Job exists and is FAILED)
    pub fn submit(&self, req: SubmitRequest) -> Result<Arc<Job>> {
        validate_request(&req)?;

        let mut items = Vec::with_capacity(req.inputs.len());
        for input in &req.inputs {
            let work = self.factory.build(req.kind, input, &req.settings)?;
            items.push(BatchItem::new(display_name(input), work));
        }

        let work: Box<dyn UnitOfWork> = if items.len() > 1 {
            Box::new(BatchWork::new(items))
        } else {
            items
                .pop()
                .map(|item| item.work)
                .ok_or_else(|| AppError::Validation("No input files given".to_string()))?
        };

        let label = req
            .label
            .filter(|label| !label.trim().is_empty())
            .unwrap_or_else(|| default_label(&req.inputs));
        let job = self.manager.create_job(req.kind, label)?;
        self.manager.submit(&job, work)?;

        info!(
            job_id = %job.id(),
            kind = %req.kind,
            inputs = req.inputs.len(),
            "Job submitted"
        );
        Ok(job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::manager::JobFilter;
    use crate::application::worker::{PoolConfig, WorkerPool};
    use crate::domain::{JobStatus, DEFAULT_LOG_CAPACITY};
    use crate::port::id_provider::mocks::SequentialIdProvider;
    use crate::port::time_provider::mocks::ManualClock;
    use crate::port::work_factory::mocks::{ScriptedWorkFactory, Step};
    use serde_json::json;
    use std::time::Duration;

    fn service(
        factory: ScriptedWorkFactory,
        queue: usize,
    ) -> (SubmissionService, Arc<ScriptedWorkFactory>) {
        let manager = Arc::new(JobManager::new(
            WorkerPool::start(PoolConfig::new(1, queue)),
            Arc::new(ManualClock::new(0)),
            Arc::new(SequentialIdProvider::default()),
            DEFAULT_LOG_CAPACITY,
        ));
        let factory = Arc::new(factory);
        let service = SubmissionService::new(manager, Arc::clone(&factory) as Arc<dyn WorkFactory>);
        (service, factory)
    }

    fn request(inputs: &[&str]) -> SubmitRequest {
        SubmitRequest {
            kind: JobKind::Audio,
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            settings: json!({"language": "en"}),
            label: None,
        }
    }

    async fn finished(job: &Job) -> crate::domain::JobSnapshot {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let snap = job.snapshot();
                if snap.is_terminal() {
                    return snap;
                }
                job.wait_for_change(snap.version, Duration::from_millis(100))
                    .await;
            }
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_single_input_runs_single_unit() {
        let (service, _) = service(ScriptedWorkFactory::new(vec![Step::progress(50, "half")]), 1);
        let job = service.submit(request(&["/in/talk.mp3"])).unwrap();
        assert_eq!(job.label(), "talk.mp3");
        let snap = finished(&job).await;
        assert_eq!(snap.status, JobStatus::Completed);
        assert_eq!(snap.result.unwrap()["type"], "single");
    }

    #[tokio::test]
    async fn test_several_inputs_run_as_batch() {
        let factory = ScriptedWorkFactory::new(vec![])
            .with_input("b.mp3", vec![Step::Fail(crate::domain::JobError::execution("bad"))]);
        let (service, _) = service(factory, 1);
        let job = service.submit(request(&["a.mp3", "b.mp3"])).unwrap();
        assert_eq!(job.label(), "Batch (2 files)");
        let result = finished(&job).await.result.unwrap();
        assert_eq!(result["type"], "batch");
        assert_eq!(result["success_count"], 1);
        assert_eq!(result["failed_count"], 1);
    }

    #[tokio::test]
    async fn test_validation_failure_creates_no_job() {
        let (service, factory) = service(ScriptedWorkFactory::new(vec![]), 1);
        assert!(matches!(
            service.submit(request(&["notes.txt"])),
            Err(AppError::Validation(_))
        ));
        assert_eq!(factory.built_count(), 0);
        assert!(service
            .manager()
            .list_recent(10, &JobFilter::default())
            .is_empty());
    }

    #[tokio::test]
    async fn test_adapter_rejection_creates_no_job() {
        let factory = ScriptedWorkFactory::new(vec![]).with_invalid_input("gone.mp3");
        let (service, _) = service(factory, 1);
        let err = service.submit(request(&["ok.mp3", "gone.mp3"])).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(service.manager().counts().total, 0);
    }

    #[tokio::test]
    async fn test_custom_label_kept_blank_label_replaced() {
        let (service, _) = service(ScriptedWorkFactory::new(vec![]), 4);
        let mut req = request(&["a.mp3"]);
        req.label = Some("Weekly sync".to_string());
        assert_eq!(service.submit(req).unwrap().label(), "Weekly sync");

        let mut req = request(&["a.mp3"]);
        req.label = Some("   ".to_string());
        assert_eq!(service.submit(req).unwrap().label(), "a.mp3");
    }

    #[test]
    fn test_request_settings_default_to_empty_object() {
        let req: SubmitRequest =
            serde_json::from_value(json!({"kind": "video", "inputs": ["a.mp4"]})).unwrap();
        assert_eq!(req.settings, json!({}));
        assert!(req.label.is_none());
    }
}
