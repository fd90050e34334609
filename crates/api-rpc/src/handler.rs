//! RPC Method Handlers
//!
//! Thin adapters from JSON-RPC params onto the submission service and
//! the job manager.

use crate::error::to_rpc_error;
use crate::types::{
    CancelResponse, JobIdRequest, JobSummary, ListJobsRequest, ListJobsResponse, RemoveResponse,
    StatsResponse, SubmitResponse,
};
use jsonrpsee::types::ErrorObjectOwned;
use std::sync::Arc;
use verba_core::application::worker::constants::{DEFAULT_RECENT_LIMIT, MAX_RECENT_LIMIT};
use verba_core::application::{JobFilter, JobManager, SubmissionService, SubmitRequest};
use verba_core::domain::JobSnapshot;
use verba_core::error::AppError;

/// RPC Handler with injected dependencies
pub struct RpcHandler {
    service: Arc<SubmissionService>,
    start_time: std::time::Instant,
}

impl RpcHandler {
    pub fn new(service: Arc<SubmissionService>) -> Self {
        Self {
            service,
            start_time: std::time::Instant::now(),
        }
    }

    pub fn manager(&self) -> &Arc<JobManager> {
        self.service.manager()
    }

    /// job.submit.v1
    pub async fn submit(&self, req: SubmitRequest) -> Result<SubmitResponse, ErrorObjectOwned> {
        let job = self.service.submit(req).map_err(to_rpc_error)?;
        Ok(SubmitResponse {
            job_id: job.id().to_string(),
            status: job.status(),
            label: job.label().to_string(),
        })
    }

    /// job.get.v1
    pub async fn get(&self, req: JobIdRequest) -> Result<JobSnapshot, ErrorObjectOwned> {
        self.manager()
            .snapshot(&req.job_id)
            .ok_or_else(|| to_rpc_error(AppError::NotFound(format!("Job {}", req.job_id))))
    }

    /// job.list.v1
    pub async fn list(&self, req: ListJobsRequest) -> Result<ListJobsResponse, ErrorObjectOwned> {
        let limit = req
            .limit
            .unwrap_or(DEFAULT_RECENT_LIMIT)
            .min(MAX_RECENT_LIMIT);
        let filter = JobFilter {
            kind: req.kind,
            status: req.status,
        };
        let jobs = self
            .manager()
            .list_recent(limit, &filter)
            .into_iter()
            .map(JobSummary::from)
            .collect();
        Ok(ListJobsResponse { jobs })
    }

    /// job.cancel.v1
    pub async fn cancel(&self, req: JobIdRequest) -> Result<CancelResponse, ErrorObjectOwned> {
        self.manager().cancel(&req.job_id).map_err(to_rpc_error)?;
        let snap = self
            .manager()
            .snapshot(&req.job_id)
            .ok_or_else(|| to_rpc_error(AppError::NotFound(format!("Job {}", req.job_id))))?;
        Ok(CancelResponse {
            job_id: snap.id,
            status: snap.status,
            cancel_requested: snap.cancel_requested,
        })
    }

    /// job.remove.v1
    pub async fn remove(&self, req: JobIdRequest) -> Result<RemoveResponse, ErrorObjectOwned> {
        let snap = self.manager().remove(&req.job_id).map_err(to_rpc_error)?;
        Ok(RemoveResponse {
            job_id: snap.id,
            removed: true,
        })
    }

    /// admin.stats.v1
    pub async fn stats(&self) -> Result<StatsResponse, ErrorObjectOwned> {
        Ok(StatsResponse {
            jobs: self.manager().counts(),
            pool: self.manager().pool_stats(),
            uptime_seconds: self.start_time.elapsed().as_secs(),
            version: verba_core::VERSION.to_string(),
        })
    }
}
