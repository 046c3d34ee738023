//! Job model for background execution.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::error::JobError;
use super::payload::{JobKind, JobPayload};
use crate::common::JobId;

/// Upper bound on retry backoff.
pub const MAX_BACKOFF_SECS: i64 = 3600;

pub const DEFAULT_MAX_RETRIES: i32 = 3;

// ============================================================================
// Enums
// ============================================================================

/// Priority lane a job is delivered on.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, Default,
)]
#[sqlx(type_name = "queue_lane", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum QueueLane {
    /// Manual single-item operations.
    Critical,
    /// Routine ingestion.
    #[default]
    Default,
    /// Bulk background generation.
    Low,
}

impl QueueLane {
    pub const ALL: [QueueLane; 3] = [QueueLane::Critical, QueueLane::Default, QueueLane::Low];

    /// Relative share of worker attention under contention.
    pub fn weight(&self) -> u32 {
        match self {
            QueueLane::Critical => 6,
            QueueLane::Default => 3,
            QueueLane::Low => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QueueLane::Critical => "critical",
            QueueLane::Default => "default",
            QueueLane::Low => "low",
        }
    }
}

impl fmt::Display for QueueLane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueueLane {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        QueueLane::ALL
            .into_iter()
            .find(|lane| lane.as_str() == s)
            .ok_or_else(|| format!("unknown queue lane: {}", s))
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, Default,
)]
#[sqlx(type_name = "job_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Pending,
    Running,
    Succeeded,
    /// Failed with an error that will not succeed on retry.
    Failed,
    /// Retries exhausted.
    Dead,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Succeeded | JobStatus::Failed | JobStatus::Dead | JobStatus::Cancelled
        )
    }
}

// ============================================================================
// Job Model
// ============================================================================

#[derive(FromRow, Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub kind: String,
    #[serde(skip)]
    pub payload: Vec<u8>,
    pub lane: QueueLane,
    pub status: JobStatus,

    // Retry
    pub attempts: i32,
    pub max_retries: i32,
    pub run_at: DateTime<Utc>,

    // Lease
    pub worker_id: Option<String>,
    pub lease_expires_at: Option<DateTime<Utc>>,

    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// A fresh pending job, as stored by `enqueue`/`schedule`.
    pub fn pending(kind: JobKind, payload: Vec<u8>, lane: QueueLane, run_at: DateTime<Utc>) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            kind: kind.as_str().to_string(),
            payload,
            lane,
            status: JobStatus::Pending,
            attempts: 0,
            max_retries: DEFAULT_MAX_RETRIES,
            run_at,
            worker_id: None,
            lease_expires_at: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Resolve the stored kind name and decode the payload.
    pub fn decode(&self) -> Result<JobPayload, JobError> {
        let kind: JobKind = self.kind.parse()?;
        Ok(JobPayload::decode(kind, &self.payload)?)
    }

    pub fn handle(&self) -> JobHandle {
        JobHandle {
            id: self.id,
            kind: self.kind.clone(),
            lane: self.lane,
        }
    }

    /// Whether a worker may claim this job at `now`.
    pub fn is_claimable(&self, now: DateTime<Utc>) -> bool {
        match self.status {
            JobStatus::Pending => self.run_at <= now,
            JobStatus::Running => self.lease_expired(now) && self.attempts <= self.max_retries,
            _ => false,
        }
    }

    /// A running job whose lease lapsed after its last allowed attempt.
    /// Reclaiming it would exceed `max_retries`, so it goes to `dead`.
    pub fn is_abandoned(&self, now: DateTime<Utc>) -> bool {
        self.status == JobStatus::Running
            && self.lease_expired(now)
            && self.attempts > self.max_retries
    }

    fn lease_expired(&self, now: DateTime<Utc>) -> bool {
        self.lease_expires_at.is_some_and(|at| at < now)
    }
}

/// Recorded on jobs that went dead because their lease ran out.
pub fn lease_expired_message(attempts: i32) -> String {
    format!("lease expired after {} attempts", attempts)
}

/// Returned to producers so they can poll status later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHandle {
    pub id: JobId,
    pub kind: String,
    pub lane: QueueLane,
}

// ============================================================================
// Retry policy
// ============================================================================

/// What a failed attempt turns into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureTransition {
    Retry { run_at: DateTime<Utc> },
    Failed,
    Dead,
}

impl FailureTransition {
    pub fn status(&self) -> JobStatus {
        match self {
            FailureTransition::Retry { .. } => JobStatus::Pending,
            FailureTransition::Failed => JobStatus::Failed,
            FailureTransition::Dead => JobStatus::Dead,
        }
    }
}

/// Exponential backoff after the given attempt number, capped at one hour.
pub fn backoff_secs(attempts: i32) -> i64 {
    let exp = attempts.clamp(0, 62) as u32;
    2i64.checked_pow(exp)
        .unwrap_or(MAX_BACKOFF_SECS)
        .min(MAX_BACKOFF_SECS)
}

/// `attempts` counts claims, so a job runs at most `max_retries + 1` times.
pub fn failure_transition(
    attempts: i32,
    max_retries: i32,
    retryable: bool,
    now: DateTime<Utc>,
) -> FailureTransition {
    if !retryable {
        return FailureTransition::Failed;
    }
    if attempts <= max_retries {
        FailureTransition::Retry {
            run_at: now + Duration::seconds(backoff_secs(attempts)),
        }
    } else {
        FailureTransition::Dead
    }
}
