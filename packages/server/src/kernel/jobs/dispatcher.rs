//! Routes a claimed job to its handler.
//!
//! ```text
//! Job { kind, payload bytes }
//!     │
//!     ├─► JobKind::from_str(kind)      unknown → UnknownJobKind
//!     ├─► JobPayload::decode(bytes)    malformed → Decoding
//!     └─► match payload { ... }        one handler per kind
//!             └─► HandlerOutcome { follow_ups }
//! ```
//!
//! Handlers never touch the queue. Follow-on work comes back in the
//! outcome and the worker enqueues it.

use std::sync::Arc;

use tracing::{debug, instrument};

use super::error::JobError;
use super::job::{Job, QueueLane};
use super::payload::{ClassifyPayload, EmbeddingPayload, JobPayload};
use crate::common::ArticleId;
use crate::domains::articles::activities::{classify_article, embed_article, generate_content};
use crate::domains::sources::activities::{crawl_page, sync_rss};
use crate::kernel::WorkerDeps;

/// A job a handler wants enqueued after it succeeds.
#[derive(Debug, Clone, PartialEq)]
pub struct FollowUp {
    pub payload: JobPayload,
    pub lane: QueueLane,
}

impl FollowUp {
    pub fn new(payload: impl Into<JobPayload>, lane: QueueLane) -> Self {
        Self {
            payload: payload.into(),
            lane,
        }
    }

    pub fn classify(article_id: ArticleId, lane: QueueLane) -> Self {
        Self::new(
            ClassifyPayload {
                article_id: article_id.to_string(),
            },
            lane,
        )
    }

    pub fn embedding(article_id: ArticleId, lane: QueueLane) -> Self {
        Self::new(
            EmbeddingPayload {
                article_id: article_id.to_string(),
            },
            lane,
        )
    }
}

/// Result of a successful handler run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HandlerOutcome {
    pub follow_ups: Vec<FollowUp>,
}

impl HandlerOutcome {
    pub fn done() -> Self {
        Self::default()
    }

    pub fn with_follow_ups(follow_ups: Vec<FollowUp>) -> Self {
        Self { follow_ups }
    }
}

/// Dispatches jobs against a fixed set of dependencies.
#[derive(Clone)]
pub struct Dispatcher {
    deps: Arc<WorkerDeps>,
}

impl Dispatcher {
    pub fn new(deps: Arc<WorkerDeps>) -> Self {
        Self { deps }
    }

    pub fn deps(&self) -> &WorkerDeps {
        &self.deps
    }

    /// Decode a stored job and run its handler.
    #[instrument(skip(self, job), fields(job_id = %job.id, kind = %job.kind, attempt = job.attempts))]
    pub async fn dispatch(&self, job: &Job) -> Result<HandlerOutcome, JobError> {
        let payload = job.decode()?;
        debug!(subject = ?payload.subject(), "dispatching job");
        self.dispatch_payload(&payload).await
    }

    /// Run the handler for an already-decoded payload.
    pub async fn dispatch_payload(&self, payload: &JobPayload) -> Result<HandlerOutcome, JobError> {
        let deps = self.deps.as_ref();
        match payload {
            JobPayload::RssSync(p) => sync_rss(p, deps).await,
            JobPayload::WebCrawl(p) => crawl_page(p, deps).await,
            JobPayload::Classify(p) => classify_article(p, deps).await,
            JobPayload::Embedding(p) => embed_article(p, deps).await,
            JobPayload::ContentGenerate(p) => generate_content(p, deps).await,
        }
    }
}
