// Progress Publisher - turns one Job's state changes into a delivery stream
//
// Transport-agnostic: the SSE and JSON-RPC boundaries both consume the same
// stream. A viewer that disconnects simply drops the stream.

use crate::application::manager::JobManager;
use crate::application::worker::constants::DEFAULT_POLL_INTERVAL;
use crate::domain::{ErrorKind, JobSnapshot, JobStatus, LogLine};
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressData {
    pub job_id: String,
    pub status: JobStatus,
    pub percent: u8,
    pub message: String,
    pub version: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogData {
    pub job_id: String,
    pub seq: u64,
    pub at: i64,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompleteData {
    pub job_id: String,
    pub result: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorData {
    pub job_id: String,
    pub kind: ErrorKind,
    pub message: String,
}

/// One named event pushed to a viewer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "lowercase")]
pub enum DeliveryEvent {
    Progress(ProgressData),
    Log(LogData),
    Complete(CompleteData),
    Error(ErrorData),
}

impl DeliveryEvent {
    pub fn name(&self) -> &'static str {
        match self {
            DeliveryEvent::Progress(_) => "progress",
            DeliveryEvent::Log(_) => "log",
            DeliveryEvent::Complete(_) => "complete",
            DeliveryEvent::Error(_) => "error",
        }
    }

    /// `complete` and `error` end a stream
    pub fn is_terminal(&self) -> bool {
        matches!(self, DeliveryEvent::Complete(_) | DeliveryEvent::Error(_))
    }

    /// The `data` record alone, as JSON text
    pub fn data_json(&self) -> serde_json::Result<String> {
        match self {
            DeliveryEvent::Progress(data) => serde_json::to_string(data),
            DeliveryEvent::Log(data) => serde_json::to_string(data),
            DeliveryEvent::Complete(data) => serde_json::to_string(data),
            DeliveryEvent::Error(data) => serde_json::to_string(data),
        }
    }

    /// Rebuild an event from its wire name and data (client side)
    pub fn from_parts(name: &str, data: &str) -> serde_json::Result<Self> {
        let data: serde_json::Value = serde_json::from_str(data)?;
        serde_json::from_value(serde_json::json!({ "event": name, "data": data }))
    }

    pub fn not_found(job_id: &str) -> Self {
        DeliveryEvent::Error(ErrorData {
            job_id: job_id.to_string(),
            kind: ErrorKind::NotFound,
            message: format!("Job {job_id} not found"),
        })
    }

    fn progress(snap: &JobSnapshot) -> Self {
        DeliveryEvent::Progress(ProgressData {
            job_id: snap.id.clone(),
            status: snap.status,
            percent: snap.progress_percent,
            message: snap.progress_message.clone(),
            version: snap.version,
        })
    }

    fn log(job_id: &str, line: &LogLine) -> Self {
        DeliveryEvent::Log(LogData {
            job_id: job_id.to_string(),
            seq: line.seq,
            at: line.at,
            message: line.message.clone(),
        })
    }

    /// Final event for a terminal snapshot, None while the job is live
    fn terminal(snap: &JobSnapshot) -> Option<Self> {
        let job_id = snap.id.clone();
        match snap.status {
            JobStatus::Completed => Some(DeliveryEvent::Complete(CompleteData {
                job_id,
                result: snap.result.clone().unwrap_or(serde_json::Value::Null),
            })),
            JobStatus::Failed => {
                let (kind, message) = snap
                    .error
                    .as_ref()
                    .map(|err| (err.kind, err.message.clone()))
                    .unwrap_or((ErrorKind::Execution, "Job failed".to_string()));
                Some(DeliveryEvent::Error(ErrorData {
                    job_id,
                    kind,
                    message,
                }))
            }
            JobStatus::Cancelled => Some(DeliveryEvent::Error(ErrorData {
                job_id,
                kind: ErrorKind::Cancelled,
                message: "Job cancelled".to_string(),
            })),
            JobStatus::Pending | JobStatus::Running => None,
        }
    }
}

#[derive(Clone)]
pub struct ProgressPublisher {
    manager: Arc<JobManager>,
    poll_interval: Duration,
}

impl ProgressPublisher {
    pub fn new(manager: Arc<JobManager>) -> Self {
        Self::with_poll_interval(manager, DEFAULT_POLL_INTERVAL)
    }

    pub fn with_poll_interval(manager: Arc<JobManager>, poll_interval: Duration) -> Self {
        Self {
            manager,
            poll_interval,
        }
    }

    /// Event stream for one viewer of `job_id`.
    ///
    /// Unknown id: a single NOT_FOUND `error` event. Otherwise `progress`
    /// (once per version) and `log` (once per line) events until the job is
    /// terminal, then one `complete` or `error` event, then the end.
    pub fn subscribe(
        &self,
        job_id: impl Into<String>,
    ) -> impl Stream<Item = DeliveryEvent> + Send + 'static {
        let manager = Arc::clone(&self.manager);
        let poll_interval = self.poll_interval;
        let job_id = job_id.into();

        async_stream::stream! {
            let Some(job) = manager.get(&job_id) else {
                debug!(job_id = %job_id, "Subscription for unknown job");
                yield DeliveryEvent::not_found(&job_id);
                return;
            };
            drop(manager);

            let mut last_version: Option<u64> = None;
            let mut last_seq = 0u64;
            loop {
                let snap = job.snapshot();
                if last_version != Some(snap.version) {
                    last_version = Some(snap.version);
                    yield DeliveryEvent::progress(&snap);
                }
                let seen = last_seq;
                for line in snap.log.iter().filter(|line| line.seq > seen) {
                    last_seq = line.seq;
                    yield DeliveryEvent::log(&snap.id, line);
                }
                if let Some(event) = DeliveryEvent::terminal(&snap) {
                    debug!(job_id = %snap.id, event = event.name(), "Delivery stream finished");
                    yield event;
                    return;
                }
                // Times out after one poll interval as a safety net
                job.wait_for_change(snap.version, poll_interval).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::worker::{PoolConfig, WorkerPool};
    use crate::domain::{JobError, JobKind, ProgressEvent, DEFAULT_LOG_CAPACITY};
    use crate::port::id_provider::mocks::SequentialIdProvider;
    use crate::port::time_provider::mocks::ManualClock;
    use futures::StreamExt;
    use serde_json::json;

    fn publisher() -> (Arc<JobManager>, ProgressPublisher) {
        let manager = Arc::new(JobManager::new(
            WorkerPool::start(PoolConfig::new(1, 1)),
            Arc::new(ManualClock::new(0)),
            Arc::new(SequentialIdProvider::default()),
            DEFAULT_LOG_CAPACITY,
        ));
        let publisher =
            ProgressPublisher::with_poll_interval(Arc::clone(&manager), Duration::from_millis(50));
        (manager, publisher)
    }

    async fn collect(stream: impl Stream<Item = DeliveryEvent>) -> Vec<DeliveryEvent> {
        tokio::time::timeout(Duration::from_secs(5), stream.collect::<Vec<_>>())
            .await
            .expect("stream did not end")
    }

    #[tokio::test]
    async fn test_unknown_job_yields_single_not_found() {
        let (_manager, publisher) = publisher();
        let events = collect(publisher.subscribe("missing")).await;
        assert_eq!(events.len(), 1);
        match &events[0] {
            DeliveryEvent::Error(data) => assert_eq!(data.kind, ErrorKind::NotFound),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_finished_job_replays_state_then_completes() {
        let (manager, publisher) = publisher();
        let job = manager.create_job(JobKind::Audio, "a.mp3").unwrap();
        job.mark_running(1).unwrap();
        job.update_progress(ProgressEvent::new(40, "transcribe", 2));
        job.mark_completed(json!({"output_path": "/out/a.txt"}), 3)
            .unwrap();

        let events = collect(publisher.subscribe(job.id())).await;
        let names: Vec<_> = events.iter().map(DeliveryEvent::name).collect();
        assert_eq!(
            names,
            vec!["progress", "log", "log", "log", "complete"],
            "{events:?}"
        );
        match &events[0] {
            DeliveryEvent::Progress(data) => {
                assert_eq!(data.percent, 100);
                assert_eq!(data.status, JobStatus::Completed);
            }
            other => panic!("unexpected {other:?}"),
        }
        match events.last().unwrap() {
            DeliveryEvent::Complete(data) => assert_eq!(data.result["output_path"], "/out/a.txt"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_live_job_streams_until_failure() {
        let (manager, publisher) = publisher();
        let job = manager.create_job(JobKind::Video, "v.mp4").unwrap();
        let stream = publisher.subscribe(job.id());

        let writer = Arc::clone(&job);
        let driver = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            writer.mark_running(1).unwrap();
            for pct in [10, 5, 30] {
                writer.update_progress(ProgressEvent::new(pct, format!("at {pct}"), 2));
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            writer
                .mark_failed(JobError::execution("ffmpeg exited with 1"), 3)
                .unwrap();
        });

        let events = collect(stream).await;
        driver.await.unwrap();

        let mut versions = Vec::new();
        let mut percents = Vec::new();
        for event in &events {
            if let DeliveryEvent::Progress(data) = event {
                versions.push(data.version);
                percents.push(data.percent);
            }
        }
        assert!(versions.windows(2).all(|w| w[0] < w[1]), "{versions:?}");
        assert!(percents.windows(2).all(|w| w[0] <= w[1]), "{percents:?}");
        assert_eq!(*percents.last().unwrap(), 30);

        let seqs: Vec<_> = events
            .iter()
            .filter_map(|event| match event {
                DeliveryEvent::Log(data) => Some(data.seq),
                _ => None,
            })
            .collect();
        assert_eq!(seqs, (1..=seqs.len() as u64).collect::<Vec<_>>());

        match events.last().unwrap() {
            DeliveryEvent::Error(data) => {
                assert_eq!(data.kind, ErrorKind::Execution);
                assert_eq!(data.message, "ffmpeg exited with 1");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cancelled_job_ends_with_cancelled_error() {
        let (manager, publisher) = publisher();
        let job = manager.create_job(JobKind::Summary, "n.txt").unwrap();
        manager.cancel(job.id()).unwrap();
        let events = collect(publisher.subscribe(job.id())).await;
        match events.last().unwrap() {
            DeliveryEvent::Error(data) => assert_eq!(data.kind, ErrorKind::Cancelled),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_wire_format_roundtrip() {
        let event = DeliveryEvent::Log(LogData {
            job_id: "j1".into(),
            seq: 4,
            at: 99,
            message: "extract".into(),
        });
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "log");
        assert_eq!(value["data"]["seq"], 4);

        let data = event.data_json().unwrap();
        assert_eq!(DeliveryEvent::from_parts(event.name(), &data).unwrap(), event);
        assert!(DeliveryEvent::from_parts("bogus", &data).is_err());
    }
}
