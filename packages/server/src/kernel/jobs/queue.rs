//! PostgreSQL-backed job queue implementation.
//!
//! Jobs live in the `jobs` table. Workers claim with `FOR UPDATE SKIP LOCKED`
//! and hold a lease; a crashed worker's jobs become claimable again once the
//! lease expires, which makes delivery at-least-once.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tracing::{debug, info, instrument, warn};

use super::error::QueueError;
use super::job::{failure_transition, FailureTransition, Job, JobHandle, JobStatus, QueueLane};
use super::payload::EncodedJob;
use crate::common::JobId;

/// Per-status job counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub pending: i64,
    pub running: i64,
    pub succeeded: i64,
    pub failed: i64,
    pub dead: i64,
    pub cancelled: i64,
}

impl QueueStats {
    pub fn record(&mut self, status: JobStatus, count: i64) {
        let slot = match status {
            JobStatus::Pending => &mut self.pending,
            JobStatus::Running => &mut self.running,
            JobStatus::Succeeded => &mut self.succeeded,
            JobStatus::Failed => &mut self.failed,
            JobStatus::Dead => &mut self.dead,
            JobStatus::Cancelled => &mut self.cancelled,
        };
        *slot += count;
    }
}

/// Durable queue of encoded jobs on priority lanes.
///
/// Retry and backoff are the backend's policy: `mark_failed` with a
/// retryable error re-queues the job until its retries are exhausted.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Enqueue for immediate execution.
    async fn enqueue(&self, job: EncodedJob, lane: QueueLane) -> Result<JobHandle, QueueError> {
        self.schedule(job, lane, Utc::now()).await
    }

    /// Enqueue to run no earlier than `run_at`.
    async fn schedule(
        &self,
        job: EncodedJob,
        lane: QueueLane,
        run_at: DateTime<Utc>,
    ) -> Result<JobHandle, QueueError>;

    /// Claim up to `limit` ready jobs, trying `lanes` in order and falling
    /// through to the next lane while capacity remains.
    async fn claim(
        &self,
        worker_id: &str,
        lanes: &[QueueLane],
        limit: i64,
    ) -> Result<Vec<Job>, QueueError>;

    async fn mark_succeeded(&self, id: JobId) -> Result<(), QueueError>;

    /// Record a failed attempt.
    async fn mark_failed(&self, id: JobId, error: &str, retryable: bool)
        -> Result<(), QueueError>;

    /// Cancel a pending job. Running jobs are not interrupted.
    async fn cancel(&self, id: JobId) -> Result<bool, QueueError>;

    async fn find(&self, id: JobId) -> Result<Option<Job>, QueueError>;

    async fn counts_by_status(&self) -> Result<QueueStats, QueueError>;
}

/// PostgreSQL-backed job queue.
pub struct PostgresJobQueue {
    pool: PgPool,
    lease_secs: f64,
}

impl PostgresJobQueue {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            lease_secs: 300.0,
        }
    }

    /// Create with a custom lease duration.
    pub fn with_lease_secs(pool: PgPool, lease_secs: f64) -> Self {
        Self { pool, lease_secs }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn claim_lane(
        &self,
        worker_id: &str,
        lane: QueueLane,
        limit: i64,
    ) -> Result<Vec<Job>, QueueError> {
        let abandoned = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'dead',
                error_message = 'lease expired after ' || attempts || ' attempts',
                worker_id = NULL,
                lease_expires_at = NULL,
                updated_at = NOW()
            WHERE lane = $1
              AND status = 'running'
              AND lease_expires_at < NOW()
              AND attempts > max_retries
            "#,
        )
        .bind(lane)
        .execute(&self.pool)
        .await?
        .rows_affected();
        if abandoned > 0 {
            warn!(lane = %lane, count = abandoned, "expired leases exhausted retries, jobs marked dead");
        }

        let jobs = sqlx::query_as::<_, Job>(
            r#"
            WITH next_jobs AS (
                SELECT id
                FROM jobs
                WHERE lane = $1
                  AND (
                    (status = 'pending' AND run_at <= NOW())
                    OR (status = 'running' AND lease_expires_at < NOW() AND attempts <= max_retries)
                  )
                ORDER BY run_at
                LIMIT $2
                FOR UPDATE SKIP LOCKED
            )
            UPDATE jobs
            SET status = 'running',
                attempts = attempts + 1,
                worker_id = $3,
                lease_expires_at = NOW() + make_interval(secs => $4),
                updated_at = NOW()
            WHERE id IN (SELECT id FROM next_jobs)
            RETURNING *
            "#,
        )
        .bind(lane)
        .bind(limit)
        .bind(worker_id)
        .bind(self.lease_secs)
        .fetch_all(&self.pool)
        .await?;

        Ok(jobs)
    }
}

#[async_trait]
impl JobQueue for PostgresJobQueue {
    #[instrument(skip(self, job), fields(kind = %job.kind))]
    async fn schedule(
        &self,
        job: EncodedJob,
        lane: QueueLane,
        run_at: DateTime<Utc>,
    ) -> Result<JobHandle, QueueError> {
        let record = Job::pending(job.kind, job.payload, lane, run_at);

        let inserted = sqlx::query_as::<_, Job>(
            r#"
            INSERT INTO jobs (id, kind, payload, lane, status, attempts, max_retries, run_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(record.id)
        .bind(&record.kind)
        .bind(&record.payload)
        .bind(record.lane)
        .bind(record.status)
        .bind(record.attempts)
        .bind(record.max_retries)
        .bind(record.run_at)
        .bind(record.created_at)
        .bind(record.updated_at)
        .fetch_one(&self.pool)
        .await?;

        debug!(job_id = %inserted.id, lane = %lane, "job enqueued");
        Ok(inserted.handle())
    }

    async fn claim(
        &self,
        worker_id: &str,
        lanes: &[QueueLane],
        limit: i64,
    ) -> Result<Vec<Job>, QueueError> {
        let mut claimed = Vec::new();
        for lane in lanes {
            let remaining = limit - claimed.len() as i64;
            if remaining <= 0 {
                break;
            }
            claimed.extend(self.claim_lane(worker_id, *lane, remaining).await?);
        }
        Ok(claimed)
    }

    async fn mark_succeeded(&self, id: JobId) -> Result<(), QueueError> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'succeeded',
                lease_expires_at = NULL,
                error_message = NULL,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn mark_failed(
        &self,
        id: JobId,
        error: &str,
        retryable: bool,
    ) -> Result<(), QueueError> {
        let Some(job) = self.find(id).await? else {
            return Err(QueueError::Storage(format!("job {} not found", id)));
        };

        let transition = failure_transition(job.attempts, job.max_retries, retryable, Utc::now());
        let run_at = match transition {
            FailureTransition::Retry { run_at } => run_at,
            FailureTransition::Failed | FailureTransition::Dead => job.run_at,
        };

        sqlx::query(
            r#"
            UPDATE jobs
            SET status = $1,
                run_at = $2,
                error_message = $3,
                worker_id = NULL,
                lease_expires_at = NULL,
                updated_at = NOW()
            WHERE id = $4
            "#,
        )
        .bind(transition.status())
        .bind(run_at)
        .bind(error)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if transition == FailureTransition::Dead {
            info!(job_id = %id, kind = %job.kind, attempts = job.attempts, "job retries exhausted");
        }

        Ok(())
    }

    async fn cancel(&self, id: JobId) -> Result<bool, QueueError> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'cancelled',
                updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn find(&self, id: JobId) -> Result<Option<Job>, QueueError> {
        let job = sqlx::query_as::<_, Job>("SELECT * FROM jobs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(job)
    }

    async fn counts_by_status(&self) -> Result<QueueStats, QueueError> {
        let rows = sqlx::query_as::<_, (JobStatus, i64)>(
            "SELECT status, COUNT(*) FROM jobs GROUP BY status",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut stats = QueueStats::default();
        for (status, count) in rows {
            stats.record(status, count);
        }
        Ok(stats)
    }
}
