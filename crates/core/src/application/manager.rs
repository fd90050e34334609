// Job Manager - registry of jobs plus the submission wrapper
//
// The wrapper built in `submit` is the only code that moves a Job out of
// PENDING/RUNNING. Every exit path (normal return, error, panic, drop while
// queued, abort at shutdown) ends in exactly one terminal transition.

use crate::application::worker::constants::{MAX_ID_ATTEMPTS, MAX_RECENT_LIMIT};
use crate::application::worker::{
    run_isolated, PanicGuardResult, PoolError, PoolStats, Slot, WorkerPool,
};
use crate::domain::{
    CancelOutcome, Job, JobError, JobId, JobKind, JobSnapshot, JobStatus, DEFAULT_LOG_CAPACITY,
};
use crate::error::{AppError, Result};
use crate::port::{IdProvider, ProgressReporter, TimeProvider, UnitOfWork};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Optional listing filter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFilter {
    pub kind: Option<JobKind>,
    pub status: Option<JobStatus>,
}

impl JobFilter {
    fn matches(&self, job: &Job) -> bool {
        self.kind.map_or(true, |kind| job.kind() == kind)
            && self.status.map_or(true, |status| job.status() == status)
    }
}

/// Jobs per status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCounts {
    pub total: usize,
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
}

#[derive(Default)]
struct Registry {
    by_id: HashMap<JobId, Arc<Job>>,
    // Creation order; lookups go through `by_id`
    order: Vec<JobId>,
}

pub struct JobManager {
    registry: RwLock<Registry>,
    pool: WorkerPool,
    clock: Arc<dyn TimeProvider>,
    ids: Arc<dyn IdProvider>,
    log_capacity: usize,
}

impl JobManager {
    pub fn new(
        pool: WorkerPool,
        clock: Arc<dyn TimeProvider>,
        ids: Arc<dyn IdProvider>,
        log_capacity: usize,
    ) -> Self {
        Self {
            registry: RwLock::new(Registry::default()),
            pool,
            clock,
            ids,
            log_capacity,
        }
    }

    /// Manager with system clock, random short IDs and default log capacity
    pub fn with_pool(pool: WorkerPool) -> Self {
        Self::new(
            pool,
            Arc::new(crate::port::SystemTimeProvider),
            Arc::new(crate::port::UuidProvider),
            DEFAULT_LOG_CAPACITY,
        )
    }

    /// Allocate a PENDING job and register it
    pub fn create_job(&self, kind: JobKind, label: impl Into<String>) -> Result<Arc<Job>> {
        let label = label.into();
        let mut registry = self.write();
        for _ in 0..MAX_ID_ATTEMPTS {
            let id = self.ids.generate_id();
            if registry.by_id.contains_key(&id) {
                debug!(job_id = %id, "Generated job ID collides, retrying");
                continue;
            }
            let job = Arc::new(Job::new(
                id.clone(),
                kind,
                label,
                self.clock.now_millis(),
                self.log_capacity,
            ));
            registry.by_id.insert(id.clone(), Arc::clone(&job));
            registry.order.push(id);
            debug!(job_id = %job.id(), kind = %kind, "Job created");
            return Ok(job);
        }
        Err(AppError::Internal(format!(
            "could not allocate a unique job ID after {MAX_ID_ATTEMPTS} attempts"
        )))
    }

    /// Hand `work` to the pool. Returns as soon as the unit is queued.
    ///
    /// # Errors
    /// - `AppError::Conflict` if this job was already submitted
    /// - `AppError::Rejected` if the pool is full or shutting down; the job is
    ///   failed with kind REJECTED before this returns
    pub fn submit(&self, job: &Arc<Job>, work: Box<dyn UnitOfWork>) -> Result<()> {
        if !job.claim_submission() {
            return Err(AppError::Conflict(format!(
                "Job {} was already submitted",
                job.id()
            )));
        }

        match self.pool.reserve() {
            Ok(slot) => self.queue(job, slot, work),
            Err(err) => Err(self.reject(job, err)),
        }
    }

    fn queue(&self, job: &Arc<Job>, slot: Slot, work: Box<dyn UnitOfWork>) -> Result<()> {
        let guard = CompletionGuard {
            job: Arc::clone(job),
            clock: Arc::clone(&self.clock),
        };
        if let Err(undelivered) = slot.dispatch(guard.execute(work)) {
            // fail as REJECTED while the guard is still held
            let err = self.reject(job, undelivered.error());
            drop(undelivered);
            return Err(err);
        }
        debug!(job_id = %job.id(), "Job queued");
        Ok(())
    }

    fn reject(&self, job: &Job, err: PoolError) -> AppError {
        warn!(job_id = %job.id(), error = %err, "Job rejected");
        let failure = JobError::rejected(err.to_string());
        if let Err(e) = job.mark_failed(failure, self.clock.now_millis()) {
            debug!(job_id = %job.id(), error = %e, "Rejected job was already terminal");
        }
        AppError::Rejected(err.to_string())
    }

    pub fn get(&self, id: &str) -> Option<Arc<Job>> {
        self.read().by_id.get(id).cloned()
    }

    pub fn snapshot(&self, id: &str) -> Option<JobSnapshot> {
        self.get(id).map(|job| job.snapshot())
    }

    /// Most recently created first, at most `limit` (capped at `MAX_RECENT_LIMIT`)
    pub fn list_recent(&self, limit: usize, filter: &JobFilter) -> Vec<JobSnapshot> {
        let jobs: Vec<Arc<Job>> = {
            let registry = self.read();
            registry
                .order
                .iter()
                .rev()
                .filter_map(|id| registry.by_id.get(id).cloned())
                .collect()
        };
        jobs.iter()
            .filter(|job| filter.matches(job))
            .take(limit.min(MAX_RECENT_LIMIT))
            .map(|job| job.snapshot())
            .collect()
    }

    /// Cancel a PENDING job or flag a RUNNING one
    ///
    /// # Errors
    /// - `AppError::NotFound` for an unknown id
    /// - `AppError::InvalidState` if the job is already terminal
    pub fn cancel(&self, id: &str) -> Result<CancelOutcome> {
        let job = self
            .get(id)
            .ok_or_else(|| AppError::NotFound(format!("Job {id}")))?;
        let outcome = job
            .request_cancel(self.clock.now_millis())
            .map_err(|err| AppError::InvalidState(err.to_string()))?;
        info!(job_id = %id, outcome = ?outcome, "Job cancellation requested");
        Ok(outcome)
    }

    /// Drop a terminal job from the registry
    ///
    /// # Errors
    /// - `AppError::NotFound` for an unknown id
    /// - `AppError::InvalidState` if the job is still PENDING or RUNNING
    pub fn remove(&self, id: &str) -> Result<JobSnapshot> {
        let mut registry = self.write();
        let job = registry
            .by_id
            .get(id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Job {id}")))?;
        let snapshot = job.snapshot();
        if !snapshot.is_terminal() {
            return Err(AppError::InvalidState(format!(
                "Job {id} is {}, only finished jobs can be removed",
                snapshot.status
            )));
        }
        registry.by_id.remove(id);
        registry.order.retain(|existing| existing != id);
        info!(job_id = %id, "Job removed");
        Ok(snapshot)
    }

    pub fn counts(&self) -> JobCounts {
        let registry = self.read();
        let mut counts = JobCounts {
            total: registry.by_id.len(),
            ..JobCounts::default()
        };
        for job in registry.by_id.values() {
            match job.status() {
                JobStatus::Pending => counts.pending += 1,
                JobStatus::Running => counts.running += 1,
                JobStatus::Completed => counts.completed += 1,
                JobStatus::Failed => counts.failed += 1,
                JobStatus::Cancelled => counts.cancelled += 1,
            }
        }
        counts
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    /// Stop the pool. Queued jobs and jobs still running after `grace` end FAILED.
    pub async fn shutdown(&self, grace: Duration) {
        self.pool.shutdown(grace).await;
    }

    fn read(&self) -> RwLockReadGuard<'_, Registry> {
        self.registry.read().unwrap_or_else(|poisoned| {
            warn!("Job registry lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, Registry> {
        self.registry.write().unwrap_or_else(|poisoned| {
            warn!("Job registry lock poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

/// Owns a submitted job until it is terminal.
///
/// Built before the unit is queued so a queued-but-never-run unit still
/// reaches FAILED when its future is dropped.
struct CompletionGuard {
    job: Arc<Job>,
    clock: Arc<dyn TimeProvider>,
}

impl CompletionGuard {
    async fn execute(self, work: Box<dyn UnitOfWork>) {
        let job = Arc::clone(&self.job);
        if let Err(err) = job.mark_running(self.clock.now_millis()) {
            // Cancelled while queued
            debug!(job_id = %job.id(), error = %err, "Skipping unit, job no longer pending");
            return;
        }
        info!(job_id = %job.id(), kind = %job.kind(), "Job started");

        let reporter = ProgressReporter::new(Arc::clone(&job), Arc::clone(&self.clock));
        let outcome = run_isolated(work.run(reporter)).await;
        let now = self.clock.now_millis();

        let transition = match outcome {
            PanicGuardResult::Completed(Ok(value)) => {
                info!(job_id = %job.id(), "Job completed");
                job.mark_completed(value, now)
            }
            PanicGuardResult::Completed(Err(err)) if job.is_cancel_requested() => {
                info!(job_id = %job.id(), reason = %err, "Job cancelled");
                job.mark_cancelled(now)
            }
            PanicGuardResult::Completed(Err(err)) => {
                warn!(job_id = %job.id(), error = %err, "Job failed");
                job.mark_failed(err, now)
            }
            PanicGuardResult::Panicked(msg) => {
                error!(job_id = %job.id(), panic_msg = %msg, "Job failed: unit of work panicked");
                job.mark_failed(JobError::execution("unit of work panicked"), now)
            }
            PanicGuardResult::Aborted => {
                job.mark_failed(JobError::execution("unit of work aborted"), now)
            }
        };
        if let Err(err) = transition {
            error!(job_id = %job.id(), error = %err, "Terminal transition rejected");
        }
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if self.job.status().is_terminal() {
            return;
        }
        warn!(job_id = %self.job.id(), "Job abandoned before finishing");
        let _ = self.job.mark_failed(
            JobError::execution("abandoned: worker pool stopped before the job finished"),
            self.clock.now_millis(),
        );
    }
}
