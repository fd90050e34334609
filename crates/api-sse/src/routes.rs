//! HTTP routes
//!
//! - GET /jobs              recent jobs, newest first (`limit`, `kind`, `status`)
//! - GET /jobs/{id}         one job snapshot
//! - GET /jobs/{id}/events  server-sent delivery events until the job is terminal

use crate::error::ApiError;
use axum::extract::{Path, Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::get;
use axum::{Json, Router};
use futures::{Stream, StreamExt};
use serde::Deserialize;
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{debug, warn};
use verba_core::application::worker::constants::{DEFAULT_RECENT_LIMIT, MAX_RECENT_LIMIT};
use verba_core::application::{JobFilter, JobManager, ProgressPublisher};
use verba_core::domain::{JobKind, JobSnapshot, JobStatus};

#[derive(Clone)]
pub struct SseState {
    pub manager: Arc<JobManager>,
    pub publisher: ProgressPublisher,
}

impl SseState {
    pub fn new(manager: Arc<JobManager>, publisher: ProgressPublisher) -> Self {
        Self { manager, publisher }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub limit: Option<usize>,
    pub kind: Option<String>,
    pub status: Option<String>,
}

impl ListQuery {
    fn filter(&self) -> Result<JobFilter, ApiError> {
        let kind = self
            .kind
            .as_deref()
            .map(str::parse::<JobKind>)
            .transpose()
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;
        let status = self
            .status
            .as_deref()
            .map(str::parse::<JobStatus>)
            .transpose()
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;
        Ok(JobFilter { kind, status })
    }
}

async fn list_jobs(
    State(state): State<SseState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<JobSnapshot>>, ApiError> {
    let filter = query.filter()?;
    let limit = query.limit.unwrap_or(DEFAULT_RECENT_LIMIT).min(MAX_RECENT_LIMIT);
    Ok(Json(state.manager.list_recent(limit, &filter)))
}

async fn get_job(
    State(state): State<SseState>,
    Path(id): Path<String>,
) -> Result<Json<JobSnapshot>, ApiError> {
    state
        .manager
        .snapshot(&id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Job {id} not found")))
}

/// Unknown ids still get a stream: one `error` event with kind NOT_FOUND.
async fn job_events(
    State(state): State<SseState>,
    Path(id): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    debug!(job_id = %id, "SSE viewer connected");
    let stream = state.publisher.subscribe(id).filter_map(|event| async move {
        match event.data_json() {
            Ok(data) => Some(Ok(Event::default().event(event.name()).data(data))),
            Err(e) => {
                warn!(event = event.name(), error = %e, "Dropping unserializable event");
                None
            }
        }
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Build the router
pub fn router(state: SseState) -> Router {
    Router::new()
        .route("/jobs", get(list_jobs))
        .route("/jobs/{id}", get(get_job))
        .route("/jobs/{id}/events", get(job_events))
        .with_state(state)
}
