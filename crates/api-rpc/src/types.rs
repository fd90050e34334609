//! RPC Request/Response Types
//!
//! JSON-RPC method parameters and results. Job snapshots and delivery
//! events are serialized straight from the core types.

use serde::{Deserialize, Serialize};
use verba_core::application::{JobCounts, PoolStats};
use verba_core::domain::{JobKind, JobSnapshot, JobStatus};

/// job.submit.v1 - params are `verba_core::application::SubmitRequest`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub job_id: String,
    pub status: JobStatus,
    pub label: String,
}

/// job.get.v1 / job.cancel.v1 / job.remove.v1 / job.subscribe.v1
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobIdRequest {
    pub job_id: String,
}

/// job.list.v1 - Recent jobs, newest first
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListJobsRequest {
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub kind: Option<JobKind>,
    #[serde(default)]
    pub status: Option<JobStatus>,
}

/// Listing row (snapshot without log lines and result payload)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSummary {
    pub id: String,
    pub kind: JobKind,
    pub label: String,
    pub status: JobStatus,
    pub progress_percent: u8,
    pub progress_message: String,
    pub created_at: i64,
    pub finished_at: Option<i64>,
}

impl From<JobSnapshot> for JobSummary {
    fn from(snap: JobSnapshot) -> Self {
        Self {
            id: snap.id,
            kind: snap.kind,
            label: snap.label,
            status: snap.status,
            progress_percent: snap.progress_percent,
            progress_message: snap.progress_message,
            created_at: snap.created_at,
            finished_at: snap.finished_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListJobsResponse {
    pub jobs: Vec<JobSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelResponse {
    pub job_id: String,
    pub status: JobStatus,
    pub cancel_requested: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveResponse {
    pub job_id: String,
    pub removed: bool,
}

/// admin.stats.v1 - Engine statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsResponse {
    pub jobs: JobCounts,
    pub pool: PoolStats,
    pub uptime_seconds: u64,
    pub version: String,
}
