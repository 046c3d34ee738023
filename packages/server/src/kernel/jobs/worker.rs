//! Job worker service for processing background jobs.
//!
//! The `JobWorker` is a long-running service that:
//! - Claims ready jobs from the queue, walking lanes in weighted order
//! - Dispatches each job to its handler through the [`Dispatcher`]
//! - Enqueues the follow-up jobs a handler returns
//! - Reports success or failure back to the queue, which owns retries
//!
//! # Architecture
//!
//! ```text
//! JobWorker
//!     │
//!     ├─► LaneSelector.claim_order()   critical:default:low = 6:3:1
//!     ├─► JobQueue.claim(worker_id, lanes, free permits)
//!     ├─► spawn per job (bounded by Semaphore)
//!     │       ├─► Dispatcher.dispatch(job)
//!     │       ├─► enqueue follow-ups
//!     │       └─► mark_succeeded / mark_failed(retryable), panics count as retryable
//!     └─► on shutdown: stop claiming, wait for in-flight jobs
//! ```

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::dispatcher::{Dispatcher, FollowUp};
use super::error::{JobError, QueueError};
use super::job::Job;
use super::lanes::LaneSelector;
use super::queue::JobQueue;

/// Configuration for the job worker.
#[derive(Debug, Clone)]
pub struct JobWorkerConfig {
    /// Maximum number of jobs running at once
    pub concurrency: usize,
    /// How long to wait when no jobs are available
    pub poll_interval: Duration,
    /// How long to wait for in-flight jobs on shutdown
    pub shutdown_grace: Duration,
    /// Worker ID written to claimed jobs
    pub worker_id: String,
}

impl Default for JobWorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: 10,
            poll_interval: Duration::from_secs(1),
            shutdown_grace: Duration::from_secs(30),
            worker_id: format!("worker-{}", Uuid::new_v4()),
        }
    }
}

impl JobWorkerConfig {
    /// Create a new config with a specific worker ID.
    pub fn with_worker_id(worker_id: impl Into<String>) -> Self {
        Self {
            worker_id: worker_id.into(),
            ..Default::default()
        }
    }

    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

/// A job worker that processes jobs from a queue.
pub struct JobWorker {
    queue: Arc<dyn JobQueue>,
    dispatcher: Dispatcher,
    config: JobWorkerConfig,
    permits: Arc<Semaphore>,
    lanes: Mutex<LaneSelector>,
}

impl JobWorker {
    pub fn new(queue: Arc<dyn JobQueue>, dispatcher: Dispatcher, config: JobWorkerConfig) -> Self {
        let permits = Arc::new(Semaphore::new(config.concurrency.max(1)));
        Self {
            queue,
            dispatcher,
            config,
            permits,
            lanes: Mutex::new(LaneSelector::default()),
        }
    }

    pub fn config(&self) -> &JobWorkerConfig {
        &self.config
    }

    /// Run until `shutdown` fires, then wait for in-flight jobs.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) -> anyhow::Result<()> {
        info!(
            worker_id = %self.config.worker_id,
            concurrency = self.config.concurrency,
            "job worker starting"
        );

        let mut in_flight = JoinSet::new();

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            // Reap finished tasks so the set does not grow unbounded
            while let Some(joined) = in_flight.try_join_next() {
                if let Err(e) = joined {
                    error!(error = %e, "job task panicked");
                }
            }

            let available = self.permits.available_permits();
            if available == 0 {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = in_flight.join_next() => {}
                }
                continue;
            }

            let jobs = match self.claim(available as i64).await {
                Ok(jobs) => jobs,
                Err(e) => {
                    error!(error = %e, "failed to claim jobs");
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(self.config.poll_interval) => {}
                    }
                    continue;
                }
            };

            if jobs.is_empty() {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(self.config.poll_interval) => {}
                }
                continue;
            }

            debug!(count = jobs.len(), "claimed jobs");

            for job in jobs {
                let permit = match self.permits.clone().acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => break,
                };
                let worker = Arc::clone(&self);
                in_flight.spawn(async move {
                    worker.process_job(job).await;
                    drop(permit);
                });
            }
        }

        if !in_flight.is_empty() {
            info!(count = in_flight.len(), "waiting for running jobs to complete");
            let drain = async {
                while let Some(joined) = in_flight.join_next().await {
                    if let Err(e) = joined {
                        error!(error = %e, "job task panicked");
                    }
                }
            };
            if tokio::time::timeout(self.config.shutdown_grace, drain)
                .await
                .is_err()
            {
                warn!(
                    remaining = in_flight.len(),
                    "shutdown grace elapsed with jobs still running"
                );
                in_flight.abort_all();
            }
        }

        info!(worker_id = %self.config.worker_id, "job worker stopped");
        Ok(())
    }

    /// Claim and process one batch inline. Returns how many jobs ran.
    pub async fn run_once(&self) -> Result<usize, QueueError> {
        let jobs = self.claim(self.config.concurrency as i64).await?;
        let count = jobs.len();
        for job in jobs {
            self.process_job(job).await;
        }
        Ok(count)
    }

    /// Process batches until the queue has nothing ready, up to `max_batches`.
    pub async fn drain(&self, max_batches: usize) -> Result<usize, QueueError> {
        let mut total = 0;
        for _ in 0..max_batches {
            let ran = self.run_once().await?;
            if ran == 0 {
                break;
            }
            total += ran;
        }
        Ok(total)
    }

    async fn claim(&self, limit: i64) -> Result<Vec<Job>, QueueError> {
        let order = self.lanes.lock().await.claim_order();
        self.queue
            .claim(&self.config.worker_id, &order, limit)
            .await
    }

    /// Process a single claimed job.
    async fn process_job(&self, job: Job) {
        let job_id = job.id;
        let kind = job.kind.clone();

        let dispatched = match AssertUnwindSafe(self.dispatcher.dispatch(&job))
            .catch_unwind()
            .await
        {
            Ok(dispatched) => dispatched,
            Err(panic) => {
                let message = format!("handler panicked: {}", panic_message(panic.as_ref()));
                error!(job_id = %job_id, kind = %kind, attempt = job.attempts, "{}", message);
                self.report_failure(&job, &message, true).await;
                return;
            }
        };

        match dispatched {
            Ok(outcome) => {
                if let Err(e) = self.enqueue_follow_ups(&job, &outcome.follow_ups).await {
                    warn!(job_id = %job_id, kind = %kind, error = %e, "failed to enqueue follow-up jobs");
                    self.report_failure(&job, &e.to_string(), true).await;
                    return;
                }
                debug!(
                    job_id = %job_id,
                    kind = %kind,
                    follow_ups = outcome.follow_ups.len(),
                    "job succeeded"
                );
                if let Err(e) = self.queue.mark_succeeded(job_id).await {
                    error!(job_id = %job_id, error = %e, "failed to mark job as succeeded");
                }
            }
            Err(e) => {
                let retryable = e.is_retryable();
                warn!(
                    job_id = %job_id,
                    kind = %kind,
                    subject = ?subject_of(&job),
                    attempt = job.attempts,
                    retryable,
                    error = %e,
                    "job failed"
                );
                self.report_failure(&job, &e.to_string(), retryable).await;
            }
        }
    }

    async fn enqueue_follow_ups(&self, job: &Job, follow_ups: &[FollowUp]) -> Result<(), JobError> {
        for follow_up in follow_ups {
            let encoded = follow_up.payload.encode()?;
            let handle = self.queue.enqueue(encoded, follow_up.lane).await?;
            debug!(
                parent_id = %job.id,
                job_id = %handle.id,
                kind = %handle.kind,
                lane = %handle.lane,
                "follow-up enqueued"
            );
        }
        Ok(())
    }

    async fn report_failure(&self, job: &Job, message: &str, retryable: bool) {
        if let Err(e) = self.queue.mark_failed(job.id, message, retryable).await {
            error!(job_id = %job.id, error = %e, "failed to mark job as failed");
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

fn subject_of(job: &Job) -> Option<String> {
    job.decode()
        .ok()
        .and_then(|p| p.subject().map(str::to_string))
}
