//! Ad-hoc enqueue helpers.
//!
//! Each helper builds the payload, encodes it and enqueues it on the
//! default lane. Use [`enqueue_payload`] to pick a lane explicitly.

use tracing::info;

use super::error::JobError;
use super::job::{JobHandle, QueueLane};
use super::payload::{
    ClassifyPayload, ContentGeneratePayload, EmbeddingPayload, JobPayload, RssSyncPayload,
    WebCrawlPayload,
};
use super::queue::JobQueue;
use crate::common::CategoryId;

/// Encode a payload and enqueue it on `lane`.
pub async fn enqueue_payload(
    queue: &dyn JobQueue,
    payload: &JobPayload,
    lane: QueueLane,
) -> Result<JobHandle, JobError> {
    let encoded = payload.encode()?;
    let handle = queue.enqueue(encoded, lane).await?;
    info!(
        job_id = %handle.id,
        kind = %handle.kind,
        lane = %lane,
        subject = ?payload.subject(),
        "job enqueued"
    );
    Ok(handle)
}

pub async fn enqueue_rss_sync(
    queue: &dyn JobQueue,
    feed_url: Option<String>,
    category_id: Option<CategoryId>,
) -> Result<JobHandle, JobError> {
    let payload = RssSyncPayload {
        feed_url,
        category_id,
    };
    enqueue_payload(queue, &payload.into(), QueueLane::Default).await
}

pub async fn enqueue_web_crawl(
    queue: &dyn JobQueue,
    url: impl Into<String>,
    category_id: Option<CategoryId>,
    depth: Option<u32>,
) -> Result<JobHandle, JobError> {
    let payload = WebCrawlPayload {
        url: url.into(),
        category_id,
        depth,
    };
    enqueue_payload(queue, &payload.into(), QueueLane::Default).await
}

pub async fn enqueue_classify(
    queue: &dyn JobQueue,
    article_id: impl Into<String>,
) -> Result<JobHandle, JobError> {
    let payload = ClassifyPayload {
        article_id: article_id.into(),
    };
    enqueue_payload(queue, &payload.into(), QueueLane::Default).await
}

pub async fn enqueue_embedding(
    queue: &dyn JobQueue,
    article_id: impl Into<String>,
) -> Result<JobHandle, JobError> {
    let payload = EmbeddingPayload {
        article_id: article_id.into(),
    };
    enqueue_payload(queue, &payload.into(), QueueLane::Default).await
}

pub async fn enqueue_content_generate(
    queue: &dyn JobQueue,
    topic: impl Into<String>,
    category_id: Option<CategoryId>,
    style: Option<String>,
) -> Result<JobHandle, JobError> {
    let payload = ContentGeneratePayload {
        topic: topic.into(),
        category_id,
        style,
    };
    enqueue_payload(queue, &payload.into(), QueueLane::Default).await
}
