//! Job lifecycle through the manager and worker pool

use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use verba_core::application::{JobManager, PoolConfig, WorkerPool};
use verba_core::domain::{
    batch_percent, ErrorKind, Job, JobError, JobKind, JobSnapshot, JobStatus,
    DEFAULT_LOG_CAPACITY,
};
use verba_core::error::AppError;
use verba_core::port::{work_fn, SystemTimeProvider, UuidProvider};

fn manager(workers: usize, queue: usize) -> Arc<JobManager> {
    Arc::new(JobManager::new(
        WorkerPool::start(PoolConfig::new(workers, queue)),
        Arc::new(SystemTimeProvider),
        Arc::new(UuidProvider),
        DEFAULT_LOG_CAPACITY,
    ))
}

async fn finished(job: &Job) -> JobSnapshot {
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
    .expect("job did not finish")
}

/// progress(10) -> progress(5) -> progress(90) -> return R
#[tokio::test]
async fn test_progress_regression_is_ignored_and_completion_forces_100() {
    let manager = manager(1, 1);
    let job = manager.create_job(JobKind::Audio, "a.mp3").unwrap();

    let gate = Arc::new(Semaphore::new(0));
    let (ack_tx, mut ack_rx) = mpsc::unbounded_channel();
    let unit_gate = Arc::clone(&gate);
    let work = work_fn(move |progress| async move {
        for (percent, message) in [(10, "a"), (5, "b"), (90, "c")] {
            unit_gate.acquire().await.unwrap().forget();
            progress.report(percent, message);
            ack_tx.send(()).unwrap();
        }
        Ok(json!({"transcript": "R"}))
    });

    let mut seen = vec![job.snapshot().progress_percent];
    manager.submit(&job, work).unwrap();
    for _ in 0..3 {
        gate.add_permits(1);
        ack_rx.recv().await.unwrap();
        seen.push(job.snapshot().progress_percent);
    }
    let snap = finished(&job).await;
    seen.push(snap.progress_percent);

    assert_eq!(seen, vec![0, 10, 10, 90, 100]);
    assert_eq!(snap.status, JobStatus::Completed);
    assert_eq!(snap.result, Some(json!({"transcript": "R"})));
    assert!(snap.error.is_none());
}

#[tokio::test]
async fn test_failure_keeps_last_percent() {
    let manager = manager(1, 1);
    let job = manager.create_job(JobKind::Video, "clip.mp4").unwrap();
    let work = work_fn(|progress| async move {
        progress.report(30, "x");
        Err(JobError::execution("decoder crashed"))
    });
    manager.submit(&job, work).unwrap();

    let snap = finished(&job).await;
    assert_eq!(snap.status, JobStatus::Failed);
    assert_eq!(snap.progress_percent, 30);
    assert!(snap.result.is_none());
    let err = snap.error.unwrap();
    assert_eq!(err.kind, ErrorKind::Execution);
    assert_eq!(err.message, "decoder crashed");
}

#[tokio::test]
async fn test_panicking_unit_fails_job_and_pool_survives() {
    let manager = manager(1, 2);
    let bad = manager.create_job(JobKind::Summary, "a.txt").unwrap();
    manager
        .submit(
            &bad,
            work_fn(|_| async move {
                if true {
                    panic!("boom at /secret/path");
                }
                Ok(json!(null))
            }),
        )
        .unwrap();
    let good = manager.create_job(JobKind::Summary, "b.txt").unwrap();
    manager
        .submit(&good, work_fn(|_| async move { Ok(json!("ok")) }))
        .unwrap();

    let snap = finished(&bad).await;
    assert_eq!(snap.status, JobStatus::Failed);
    let err = snap.error.unwrap();
    assert_eq!(err.kind, ErrorKind::Execution);
    assert!(!err.message.contains("/secret/path"));

    assert_eq!(finished(&good).await.status, JobStatus::Completed);
}

#[tokio::test]
async fn test_concurrent_duplicate_submit_runs_once() {
    let manager = manager(2, 4);
    let job = manager.create_job(JobKind::Audio, "a.mp3").unwrap();
    let runs = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let manager = Arc::clone(&manager);
        let job = Arc::clone(&job);
        let runs = Arc::clone(&runs);
        handles.push(tokio::spawn(async move {
            let work = work_fn(move |_| async move {
                runs.fetch_add(1, Ordering::SeqCst);
                Ok(json!(null))
            });
            manager.submit(&job, work)
        }));
    }

    let mut accepted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) => accepted += 1,
            Err(AppError::Conflict(_)) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(accepted, 1);

    let snap = finished(&job).await;
    assert_eq!(snap.status, JobStatus::Completed);
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    let started = snap.log.iter().filter(|l| l.message == "Started").count();
    assert_eq!(started, 1);
}

#[tokio::test]
async fn test_cancel_running_unit_that_observes_flag() {
    let manager = manager(1, 1);
    let job = manager.create_job(JobKind::Audio, "a.mp3").unwrap();
    let (started_tx, mut started_rx) = mpsc::unbounded_channel();
    let work = work_fn(move |progress| async move {
        progress.report(20, "listening");
        started_tx.send(()).unwrap();
        progress.cancelled().await;
        Err(JobError::cancelled("stopped"))
    });
    manager.submit(&job, work).unwrap();
    started_rx.recv().await.unwrap();

    manager.cancel(job.id()).unwrap();
    let snap = finished(&job).await;
    assert_eq!(snap.status, JobStatus::Cancelled);
    assert!(snap.result.is_none());
    assert!(snap.error.is_none());
    assert!(matches!(manager.cancel(job.id()), Err(AppError::InvalidState(_))));
}

#[test]
fn test_batch_mapper_reference_points() {
    assert_eq!(batch_percent(2, 5, 50), 50);
    assert_eq!(batch_percent(4, 5, 100), 100);
    assert_eq!(batch_percent(0, 5, 0), 0);
    assert_eq!(batch_percent(0, 1, 37), 37);
}

#[tokio::test]
async fn test_list_recent_newest_first_and_capped() {
    let manager = manager(1, 1);
    for name in ["1.mp3", "2.mp3", "3.mp3"] {
        manager.create_job(JobKind::Audio, name).unwrap();
    }
    let recent = manager.list_recent(2, &Default::default());
    let labels: Vec<_> = recent.iter().map(|s| s.label.as_str()).collect();
    assert_eq!(labels, vec!["3.mp3", "2.mp3"]);
    assert!(manager.get("nope").is_none());
}
