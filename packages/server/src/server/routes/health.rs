//! Liveness probe backed by the job queue.

use std::time::Duration;

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::kernel::jobs::QueueStats;
use crate::server::app::AppState;

const QUEUE_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Health {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: Health,
    pub queue: QueueProbe,
}

/// Outcome of asking the queue for its counts.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum QueueProbe {
    Ok { jobs: QueueStats },
    Error { error: String },
}

/// 200 when the queue answers within the probe timeout, 503 otherwise.
pub async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let probe = match tokio::time::timeout(QUEUE_PROBE_TIMEOUT, state.queue.counts_by_status()).await
    {
        Ok(Ok(jobs)) => QueueProbe::Ok { jobs },
        Ok(Err(e)) => QueueProbe::Error {
            error: e.to_string(),
        },
        Err(_) => QueueProbe::Error {
            error: format!("no answer within {}s", QUEUE_PROBE_TIMEOUT.as_secs()),
        },
    };

    let (code, status) = match probe {
        QueueProbe::Ok { .. } => (StatusCode::OK, Health::Healthy),
        QueueProbe::Error { .. } => (StatusCode::SERVICE_UNAVAILABLE, Health::Unhealthy),
    };

    (code, Json(HealthResponse { status, queue: probe }))
}
