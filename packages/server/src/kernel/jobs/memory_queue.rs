//! In-memory job queue for tests and local runs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use super::error::QueueError;
use super::job::{
    failure_transition, lease_expired_message, FailureTransition, Job, JobHandle, JobStatus,
    QueueLane,
};
use super::payload::{EncodedJob, JobPayload};
use super::queue::{JobQueue, QueueStats};
use crate::common::JobId;

/// Same retry policy as the Postgres queue, backed by a `Vec`.
#[derive(Clone)]
pub struct MemoryJobQueue {
    jobs: Arc<Mutex<Vec<Job>>>,
    unavailable: Arc<AtomicBool>,
    lease: Duration,
}

impl Default for MemoryJobQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryJobQueue {
    pub fn new() -> Self {
        Self {
            jobs: Arc::new(Mutex::new(Vec::new())),
            unavailable: Arc::new(AtomicBool::new(false)),
            lease: Duration::minutes(5),
        }
    }

    /// Simulate the broker going away; every call fails with `Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Snapshot of every stored job, in enqueue order.
    pub fn jobs(&self) -> Vec<Job> {
        self.lock().clone()
    }

    pub fn jobs_in_lane(&self, lane: QueueLane) -> Vec<Job> {
        self.lock()
            .iter()
            .filter(|job| job.lane == lane)
            .cloned()
            .collect()
    }

    /// Decoded payloads of every job, for assertions.
    pub fn payloads(&self) -> Vec<(JobPayload, QueueLane)> {
        self.lock()
            .iter()
            .filter_map(|job| job.decode().ok().map(|p| (p, job.lane)))
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Job>> {
        // A poisoned lock only means a test panicked mid-update.
        self.jobs.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_available(&self) -> Result<(), QueueError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(QueueError::Unavailable("memory queue offline".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl JobQueue for MemoryJobQueue {
    async fn schedule(
        &self,
        job: EncodedJob,
        lane: QueueLane,
        run_at: DateTime<Utc>,
    ) -> Result<JobHandle, QueueError> {
        self.check_available()?;
        let record = Job::pending(job.kind, job.payload, lane, run_at);
        let handle = record.handle();
        self.lock().push(record);
        Ok(handle)
    }

    async fn claim(
        &self,
        worker_id: &str,
        lanes: &[QueueLane],
        limit: i64,
    ) -> Result<Vec<Job>, QueueError> {
        self.check_available()?;
        let now = Utc::now();
        let limit = usize::try_from(limit).unwrap_or(0);
        let mut jobs = self.lock();
        let mut claimed = Vec::new();

        for job in jobs
            .iter_mut()
            .filter(|job| lanes.contains(&job.lane) && job.is_abandoned(now))
        {
            job.status = JobStatus::Dead;
            job.error_message = Some(lease_expired_message(job.attempts));
            job.worker_id = None;
            job.lease_expires_at = None;
            job.updated_at = now;
        }

        for lane in lanes {
            let mut ready: Vec<usize> = jobs
                .iter()
                .enumerate()
                .filter(|(_, job)| job.lane == *lane && job.is_claimable(now))
                .map(|(i, _)| i)
                .collect();
            ready.sort_by_key(|i| jobs[*i].run_at);

            for i in ready {
                if claimed.len() >= limit {
                    return Ok(claimed);
                }
                let job = &mut jobs[i];
                job.status = JobStatus::Running;
                job.attempts += 1;
                job.worker_id = Some(worker_id.to_string());
                job.lease_expires_at = Some(now + self.lease);
                job.updated_at = now;
                claimed.push(job.clone());
            }
        }

        Ok(claimed)
    }

    async fn mark_succeeded(&self, id: JobId) -> Result<(), QueueError> {
        self.check_available()?;
        let mut jobs = self.lock();
        let job = jobs
            .iter_mut()
            .find(|job| job.id == id)
            .ok_or_else(|| QueueError::Storage(format!("job {} not found", id)))?;
        job.status = JobStatus::Succeeded;
        job.lease_expires_at = None;
        job.error_message = None;
        job.updated_at = Utc::now();
        Ok(())
    }

    async fn mark_failed(
        &self,
        id: JobId,
        error: &str,
        retryable: bool,
    ) -> Result<(), QueueError> {
        self.check_available()?;
        let now = Utc::now();
        let mut jobs = self.lock();
        let job = jobs
            .iter_mut()
            .find(|job| job.id == id)
            .ok_or_else(|| QueueError::Storage(format!("job {} not found", id)))?;

        let transition = failure_transition(job.attempts, job.max_retries, retryable, now);
        if let FailureTransition::Retry { run_at } = transition {
            job.run_at = run_at;
        }
        job.status = transition.status();
        job.error_message = Some(error.to_string());
        job.worker_id = None;
        job.lease_expires_at = None;
        job.updated_at = now;
        Ok(())
    }

    async fn cancel(&self, id: JobId) -> Result<bool, QueueError> {
        self.check_available()?;
        let mut jobs = self.lock();
        match jobs
            .iter_mut()
            .find(|job| job.id == id && job.status == JobStatus::Pending)
        {
            Some(job) => {
                job.status = JobStatus::Cancelled;
                job.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn find(&self, id: JobId) -> Result<Option<Job>, QueueError> {
        self.check_available()?;
        Ok(self.lock().iter().find(|job| job.id == id).cloned())
    }

    async fn counts_by_status(&self) -> Result<QueueStats, QueueError> {
        self.check_available()?;
        let mut stats = QueueStats::default();
        for job in self.lock().iter() {
            stats.record(job.status, 1);
        }
        Ok(stats)
    }
}
