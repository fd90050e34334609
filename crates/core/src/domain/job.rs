// Job Domain Model
//
// A Job is written by exactly one worker and read by any number of viewers.
// All mutable fields live behind one mutex; every mutation bumps `version`
// and publishes it on a watch channel so readers can wait without polling.

use super::error::{DomainError, Result};
use super::job_error::JobError;
use super::kind::JobKind;
use super::progress::ProgressEvent;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;

/// Job ID (8 hex chars by default, see `port::id_provider`)
pub type JobId = String;

/// Upper bound on retained log lines per job
pub const DEFAULT_LOG_CAPACITY: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Running => "RUNNING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
            JobStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(JobStatus::Pending),
            "RUNNING" => Ok(JobStatus::Running),
            "COMPLETED" => Ok(JobStatus::Completed),
            "FAILED" => Ok(JobStatus::Failed),
            "CANCELLED" => Ok(JobStatus::Cancelled),
            other => Err(DomainError::UnknownStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    /// Per-job sequence number, starts at 1 and never repeats
    pub seq: u64,
    pub at: i64,
    pub message: String,
}

/// Outcome of a cancellation request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// Job was PENDING and is now CANCELLED
    Cancelled,
    /// Job is RUNNING; the cooperative flag is set
    Requested,
}

/// Immutable copy of a Job, taken under its guard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub id: JobId,
    pub kind: JobKind,
    pub label: String,
    pub status: JobStatus,
    pub progress_percent: u8,
    pub progress_message: String,
    pub log: Vec<LogLine>,
    pub result: Option<serde_json::Value>,
    pub error: Option<JobError>,
    pub created_at: i64,
    pub started_at: Option<i64>,
    pub finished_at: Option<i64>,
    pub version: u64,
    pub cancel_requested: bool,
}

impl JobSnapshot {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[derive(Debug)]
struct JobInner {
    status: JobStatus,
    progress_percent: u8,
    progress_message: String,
    log: VecDeque<LogLine>,
    next_seq: u64,
    result: Option<serde_json::Value>,
    error: Option<JobError>,
    started_at: Option<i64>,
    finished_at: Option<i64>,
    version: u64,
    cancel_requested: bool,
}

#[derive(Debug)]
pub struct Job {
    id: JobId,
    kind: JobKind,
    label: String,
    created_at: i64,
    log_capacity: usize,
    inner: Mutex<JobInner>,
    version_tx: watch::Sender<u64>,
    submitted: AtomicBool,
}

impl Job {
    pub fn new(
        id: impl Into<JobId>,
        kind: JobKind,
        label: impl Into<String>,
        created_at: i64,
        log_capacity: usize,
    ) -> Self {
        let (version_tx, _) = watch::channel(0);
        Self {
            id: id.into(),
            kind,
            label: label.into(),
            created_at,
            log_capacity: log_capacity.max(1),
            inner: Mutex::new(JobInner {
                status: JobStatus::Pending,
                progress_percent: 0,
                progress_message: String::new(),
                log: VecDeque::new(),
                next_seq: 1,
                result: None,
                error: None,
                started_at: None,
                finished_at: None,
                version: 0,
                cancel_requested: false,
            }),
            version_tx,
            submitted: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> JobKind {
        self.kind
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    pub fn status(&self) -> JobStatus {
        self.lock().status
    }

    pub fn version(&self) -> u64 {
        *self.version_tx.borrow()
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.lock().cancel_requested
    }

    /// Returns true exactly once per Job; later callers lose the race
    pub fn claim_submission(&self) -> bool {
        !self.submitted.swap(true, Ordering::AcqRel)
    }

    pub fn mark_running(&self, now: i64) -> Result<()> {
        let mut inner = self.lock();
        if inner.status != JobStatus::Pending {
            return Err(transition(inner.status, JobStatus::Running));
        }
        inner.status = JobStatus::Running;
        inner.started_at = Some(now);
        self.push_log(&mut inner, now, "Started");
        self.bump(&mut inner);
        Ok(())
    }

    /// Applies one progress update. Returns false when the job is not RUNNING.
    pub fn update_progress(&self, event: ProgressEvent) -> bool {
        let mut inner = self.lock();
        if inner.status != JobStatus::Running {
            return false;
        }
        inner.progress_percent = inner.progress_percent.max(event.percent.min(100));
        if !event.message.is_empty() && event.message != inner.progress_message {
            self.push_log(&mut inner, event.at, &event.message);
        }
        inner.progress_message = event.message;
        self.bump(&mut inner);
        true
    }

    pub fn mark_completed(&self, result: serde_json::Value, now: i64) -> Result<()> {
        let mut inner = self.lock();
        if inner.status != JobStatus::Running {
            return Err(transition(inner.status, JobStatus::Completed));
        }
        inner.status = JobStatus::Completed;
        inner.progress_percent = 100;
        inner.result = Some(result);
        inner.finished_at = Some(now);
        self.push_log(&mut inner, now, "Completed");
        self.bump(&mut inner);
        Ok(())
    }

    /// RUNNING -> FAILED, or PENDING -> FAILED when the unit never started
    pub fn mark_failed(&self, error: JobError, now: i64) -> Result<()> {
        let mut inner = self.lock();
        if inner.status.is_terminal() {
            return Err(transition(inner.status, JobStatus::Failed));
        }
        let line = format!("Failed: {}", error.message);
        inner.status = JobStatus::Failed;
        inner.error = Some(error);
        inner.finished_at = Some(now);
        self.push_log(&mut inner, now, &line);
        self.bump(&mut inner);
        Ok(())
    }

    pub fn mark_cancelled(&self, now: i64) -> Result<()> {
        let mut inner = self.lock();
        if inner.status.is_terminal() {
            return Err(transition(inner.status, JobStatus::Cancelled));
        }
        self.cancel_locked(&mut inner, now);
        Ok(())
    }

    /// Atomic check-and-cancel: PENDING is cancelled outright, RUNNING gets the flag.
    pub fn request_cancel(&self, now: i64) -> Result<CancelOutcome> {
        let mut inner = self.lock();
        match inner.status {
            JobStatus::Pending => {
                self.cancel_locked(&mut inner, now);
                Ok(CancelOutcome::Cancelled)
            }
            JobStatus::Running => {
                if !inner.cancel_requested {
                    inner.cancel_requested = true;
                    self.push_log(&mut inner, now, "Cancellation requested");
                    self.bump(&mut inner);
                }
                Ok(CancelOutcome::Requested)
            }
            status => Err(transition(status, JobStatus::Cancelled)),
        }
    }

    pub fn snapshot(&self) -> JobSnapshot {
        let inner = self.lock();
        JobSnapshot {
            id: self.id.clone(),
            kind: self.kind,
            label: self.label.clone(),
            status: inner.status,
            progress_percent: inner.progress_percent,
            progress_message: inner.progress_message.clone(),
            log: inner.log.iter().cloned().collect(),
            result: inner.result.clone(),
            error: inner.error.clone(),
            created_at: self.created_at,
            started_at: inner.started_at,
            finished_at: inner.finished_at,
            version: inner.version,
            cancel_requested: inner.cancel_requested,
        }
    }

    /// Waits until `version > since` or the timeout elapses.
    ///
    /// Returns immediately when the version already moved past `since`, so an
    /// update landing between a reader's snapshot and this call is never missed.
    pub async fn wait_for_change(&self, since: u64, timeout: Duration) -> bool {
        let mut rx = self.version_tx.subscribe();
        let moved = async { rx.wait_for(|version| *version > since).await.is_ok() };
        let changed = tokio::time::timeout(timeout, moved).await.unwrap_or(false);
        changed
    }

    /// Resolves once cancellation is requested or the job is terminal
    pub async fn cancelled(&self) {
        let mut rx = self.version_tx.subscribe();
        loop {
            {
                let inner = self.lock();
                if inner.cancel_requested || inner.status.is_terminal() {
                    return;
                }
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    fn cancel_locked(&self, inner: &mut JobInner, now: i64) {
        inner.status = JobStatus::Cancelled;
        inner.cancel_requested = true;
        inner.finished_at = Some(now);
        self.push_log(inner, now, "Cancelled");
        self.bump(inner);
    }

    fn push_log(&self, inner: &mut JobInner, at: i64, message: &str) {
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.log.push_back(LogLine {
            seq,
            at,
            message: message.to_string(),
        });
        while inner.log.len() > self.log_capacity {
            inner.log.pop_front();
        }
    }

    // Called with the guard held so watch values stay ordered with mutations.
    fn bump(&self, inner: &mut JobInner) {
        inner.version += 1;
        self.version_tx.send_replace(inner.version);
    }

    fn lock(&self) -> MutexGuard<'_, JobInner> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            tracing::warn!(job_id = %self.id, "Job lock poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

fn transition(from: JobStatus, to: JobStatus) -> DomainError {
    DomainError::InvalidStateTransition {
        from: from.to_string(),
        to: to.to_string(),
    }
}
