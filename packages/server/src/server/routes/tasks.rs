//! Task producer and status endpoints.
//!
//! Single-item classify/embedding requests go to the critical lane, bulk
//! content generation to low, routine ingestion to default.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Serialize;

use crate::common::JobId;
use crate::kernel::jobs::{
    enqueue_payload, ClassifyPayload, ContentGeneratePayload, EmbeddingPayload, Job, JobHandle,
    JobPayload, JobStatus, QueueLane, RssSyncPayload, WebCrawlPayload,
};
use crate::server::app::AppState;
use crate::server::error::ApiError;

/// Task status response.
#[derive(Debug, Serialize)]
pub struct TaskResponse {
    #[serde(flatten)]
    pub job: Job,
    /// Decoded parameters, when the stored payload is readable
    pub subject: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub id: JobId,
    pub cancelled: bool,
    pub status: JobStatus,
}

async fn enqueue(
    state: &AppState,
    payload: JobPayload,
    lane: QueueLane,
) -> Result<(StatusCode, Json<JobHandle>), ApiError> {
    let handle = enqueue_payload(state.queue.as_ref(), &payload, lane).await?;
    Ok((StatusCode::ACCEPTED, Json(handle)))
}

pub async fn enqueue_rss_sync_task(
    State(state): State<AppState>,
    Json(body): Json<RssSyncPayload>,
) -> Result<impl IntoResponse, ApiError> {
    enqueue(&state, body.into(), QueueLane::Default).await
}

pub async fn enqueue_web_crawl_task(
    State(state): State<AppState>,
    Json(body): Json<WebCrawlPayload>,
) -> Result<impl IntoResponse, ApiError> {
    enqueue(&state, body.into(), QueueLane::Default).await
}

pub async fn enqueue_classify_task(
    State(state): State<AppState>,
    Json(body): Json<ClassifyPayload>,
) -> Result<impl IntoResponse, ApiError> {
    enqueue(&state, body.into(), QueueLane::Critical).await
}

pub async fn enqueue_embedding_task(
    State(state): State<AppState>,
    Json(body): Json<EmbeddingPayload>,
) -> Result<impl IntoResponse, ApiError> {
    enqueue(&state, body.into(), QueueLane::Critical).await
}

pub async fn enqueue_content_generate_task(
    State(state): State<AppState>,
    Json(body): Json<ContentGeneratePayload>,
) -> Result<impl IntoResponse, ApiError> {
    enqueue(&state, body.into(), QueueLane::Low).await
}

fn parse_job_id(raw: &str) -> Result<JobId, ApiError> {
    JobId::parse(raw).map_err(|e| ApiError::bad_request(format!("invalid task id {:?}: {}", raw, e)))
}

/// Get a task's status.
pub async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_job_id(&id)?;
    let job = state
        .queue
        .find(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("task not found: {}", id)))?;

    let subject = job
        .decode()
        .ok()
        .and_then(|p| p.subject().map(str::to_string));
    Ok(Json(TaskResponse { job, subject }))
}

/// Cancel a task that has not started yet.
pub async fn cancel_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_job_id(&id)?;
    if state.queue.find(id).await?.is_none() {
        return Err(ApiError::not_found(format!("task not found: {}", id)));
    }

    let cancelled = state.queue.cancel(id).await?;
    let status = state
        .queue
        .find(id)
        .await?
        .map(|job| job.status)
        .ok_or_else(|| ApiError::not_found(format!("task not found: {}", id)))?;

    let code = if cancelled {
        StatusCode::OK
    } else {
        StatusCode::CONFLICT
    };
    Ok((
        code,
        Json(CancelResponse {
            id,
            cancelled,
            status,
        }),
    ))
}

/// Job counts by status.
pub async fn task_stats(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let stats = state.queue.counts_by_status().await?;
    Ok(Json(stats))
}
