//! Submission through the subprocess pipeline adapter
#![cfg(unix)]

use serde_json::json;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use verba_core::application::{
    JobManager, PoolConfig, SubmissionService, SubmitRequest, WorkerPool,
};
use verba_core::domain::{ErrorKind, Job, JobKind, JobSnapshot, JobStatus, DEFAULT_LOG_CAPACITY};
use verba_core::error::AppError;
use verba_core::port::{SystemTimeProvider, UuidProvider};
use verba_infra_system::{CommandWorkFactory, PipelineCommand};

/// Reports two stages, then writes the output file named by `$1`
const SCRIPT: &str = r#"
case "$0" in *broken*) echo "unsupported codec" >&2; exit 4;; esac
echo "PROGRESS 30 Transcribing"
echo "PROGRESS 0.8 Formatting"
echo "text of $0" > "$1"
"#;

fn service(dir: &Path) -> SubmissionService {
    let mut pipelines = HashMap::new();
    pipelines.insert(
        JobKind::Audio,
        PipelineCommand::new(
            "/bin/sh",
            vec![
                "-c".to_string(),
                SCRIPT.to_string(),
                "{input}".to_string(),
                "{output}".to_string(),
            ],
        ),
    );
    let output_dir = dir.join("out");
    std::fs::create_dir_all(&output_dir).unwrap();

    let manager = Arc::new(JobManager::new(
        WorkerPool::start(PoolConfig::new(1, 4)),
        Arc::new(SystemTimeProvider),
        Arc::new(UuidProvider),
        DEFAULT_LOG_CAPACITY,
    ));
    SubmissionService::new(manager, Arc::new(CommandWorkFactory::new(pipelines, output_dir)))
}

fn input(dir: &Path, name: &str) -> String {
    let path = dir.join(name);
    std::fs::write(&path, b"fake audio").unwrap();
    path.to_string_lossy().into_owned()
}

async fn finished(job: &Job) -> JobSnapshot {
    tokio::time::timeout(Duration::from_secs(10), async {
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
    .expect("pipeline job did not finish")
}

#[tokio::test]
async fn test_single_input_writes_output() {
    let dir = tempfile::tempdir().unwrap();
    let service = service(dir.path());
    let job = service
        .submit(SubmitRequest {
            kind: JobKind::Audio,
            inputs: vec![input(dir.path(), "standup.mp3")],
            settings: json!({}),
            label: None,
        })
        .unwrap();

    let snap = finished(&job).await;
    assert_eq!(snap.status, JobStatus::Completed, "{:?}", snap.error);
    let result = snap.result.unwrap();
    assert_eq!(result["type"], "single");
    let output = result["output_path"].as_str().unwrap();
    assert!(output.ends_with("standup.txt"));
    assert!(std::fs::read_to_string(output).unwrap().contains("standup.mp3"));
    assert!(snap.log.iter().any(|line| line.message == "Formatting"));
}

#[tokio::test]
async fn test_batch_records_failed_input_and_continues() {
    let dir = tempfile::tempdir().unwrap();
    let service = service(dir.path());
    let job = service
        .submit(SubmitRequest {
            kind: JobKind::Audio,
            inputs: vec![
                input(dir.path(), "one.mp3"),
                input(dir.path(), "broken.mp3"),
                input(dir.path(), "three.mp3"),
            ],
            settings: json!({"language": "en"}),
            label: None,
        })
        .unwrap();
    assert_eq!(job.label(), "Batch (3 files)");

    let snap = finished(&job).await;
    assert_eq!(snap.status, JobStatus::Completed);
    assert_eq!(snap.progress_percent, 100);
    let result = snap.result.unwrap();
    assert_eq!(result["type"], "batch");
    assert_eq!(result["total"], 3);
    assert_eq!(result["success_count"], 2);
    assert_eq!(result["failed_count"], 1);
    let failed = &result["results"][1];
    assert_eq!(failed["success"], false);
    assert_eq!(failed["error"]["kind"], "EXECUTION");
    assert!(failed["error"]["message"]
        .as_str()
        .unwrap()
        .contains("unsupported codec"));
    assert!(snap
        .log
        .iter()
        .any(|line| line.message == "[3/3] Transcribing"));
}

#[tokio::test]
async fn test_missing_file_and_unconfigured_kind_are_validation_errors() {
    let dir = tempfile::tempdir().unwrap();
    let service = service(dir.path());

    let missing = dir.path().join("gone.mp3").to_string_lossy().into_owned();
    let err = service
        .submit(SubmitRequest {
            kind: JobKind::Audio,
            inputs: vec![missing],
            settings: json!({}),
            label: None,
        })
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)), "{err}");
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = service
        .submit(SubmitRequest {
            kind: JobKind::Video,
            inputs: vec![input(dir.path(), "clip.mp4")],
            settings: json!({}),
            label: None,
        })
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)), "{err}");
    assert_eq!(service.manager().counts().total, 0);
}
