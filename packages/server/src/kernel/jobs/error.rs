//! Typed errors for the job layer.
//!
//! Library seams use `thiserror` enums so callers can branch on the failure;
//! store and collaborator internals stay on `anyhow` and are wrapped here.

use thiserror::Error;

use super::payload::JobKind;

/// Payload serialization failures.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to encode {kind} payload: {reason}")]
    Encoding { kind: JobKind, reason: String },

    #[error("failed to decode {kind} payload: {reason}")]
    Decoding { kind: JobKind, reason: String },
}

/// Failures talking to the queue backend.
#[derive(Debug, Error)]
pub enum QueueError {
    /// Broker connection is down. The job was not enqueued.
    #[error("job queue unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("job queue storage error: {0}")]
    Storage(String),
}

impl From<sqlx::Error> for QueueError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => QueueError::Unavailable(err.to_string()),
            other => QueueError::Storage(other.to_string()),
        }
    }
}

/// Why a single job failed.
///
/// Every variant is fatal for the job it came from, never for the worker.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("unknown job kind: {0}")]
    UnknownJobKind(String),

    #[error(transparent)]
    Decoding(#[from] CodecError),

    #[error("no enabled data source matches feed {feed_url}")]
    SourceNotFound { feed_url: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("invalid id {id:?}: {reason}")]
    InvalidId { id: String, reason: String },

    #[error("feed fetch failed for {url}: {reason}")]
    FeedFetch { url: String, reason: String },

    #[error("crawl failed for {url}: {reason}")]
    Crawl { url: String, reason: String },

    #[error("classification failed for article {article_id}: {reason}")]
    Classification { article_id: String, reason: String },

    #[error("embedding failed for article {article_id}: {reason}")]
    Embedding { article_id: String, reason: String },

    #[error("content generation failed for topic {topic:?}: {reason}")]
    ContentGeneration { topic: String, reason: String },

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("store error: {0}")]
    Store(#[from] anyhow::Error),

    #[error(transparent)]
    Queue(#[from] QueueError),
}

impl JobError {
    /// Collaborator and infrastructure failures may succeed on another
    /// attempt; malformed or dangling references never will.
    pub fn is_retryable(&self) -> bool {
        match self {
            JobError::UnknownJobKind(_)
            | JobError::Decoding(_)
            | JobError::SourceNotFound { .. }
            | JobError::NotFound { .. }
            | JobError::InvalidId { .. }
            | JobError::InvalidQuery(_) => false,
            JobError::FeedFetch { .. }
            | JobError::Crawl { .. }
            | JobError::Classification { .. }
            | JobError::Embedding { .. }
            | JobError::ContentGeneration { .. }
            | JobError::Store(_)
            | JobError::Queue(_) => true,
        }
    }
}
