//! Job infrastructure for background work.
//!
//! This module provides the kernel-level infrastructure for job execution:
//! - [`JobPayload`] - Closed set of job kinds and their JSON wire codec
//! - [`PostgresJobQueue`] / [`MemoryJobQueue`] - Durable and in-process queues
//! - [`Dispatcher`] - Routes a decoded job to its domain handler
//! - [`JobWorker`] - Long-running service that claims and executes jobs
//!
//! # Architecture
//!
//! ```text
//! HTTP / cron tick / follow-up
//!     │
//!     └─► JobPayload.encode() ─► JobQueue.enqueue(lane)
//!                                    └─► jobs table
//!
//! JobWorker
//!     │
//!     ├─► JobQueue.claim(lanes in weighted order)
//!     ├─► Dispatcher.dispatch(job)
//!     │       └─► domains::*::activities handler
//!     └─► enqueue follow-ups, mark succeeded/failed
//! ```
//!
//! Handlers live in their respective domains. This module only provides
//! the infrastructure.

mod dispatcher;
mod enqueue;
mod error;
mod job;
mod lanes;
mod memory_queue;
mod payload;
mod queue;
mod worker;

pub use dispatcher::{Dispatcher, FollowUp, HandlerOutcome};
pub use enqueue::{
    enqueue_classify, enqueue_content_generate, enqueue_embedding, enqueue_payload,
    enqueue_rss_sync, enqueue_web_crawl,
};
pub use error::{CodecError, JobError, QueueError};
pub use job::{
    backoff_secs, failure_transition, FailureTransition, Job, JobHandle, JobStatus, QueueLane,
    DEFAULT_MAX_RETRIES, MAX_BACKOFF_SECS,
};
pub use lanes::LaneSelector;
pub use memory_queue::MemoryJobQueue;
pub use payload::{
    ClassifyPayload, ContentGeneratePayload, EmbeddingPayload, EncodedJob, JobKind, JobPayload,
    RssSyncPayload, WebCrawlPayload,
};
pub use queue::{JobQueue, PostgresJobQueue, QueueStats};
pub use worker::{JobWorker, JobWorkerConfig};
