use tracing::{info, instrument};

use crate::domains::articles::models::{ArticleStatus, NewArticle};
use crate::kernel::jobs::{ContentGeneratePayload, FollowUp, HandlerOutcome, JobError, QueueLane};
use crate::kernel::WorkerDeps;

/// Draft an article about a topic and queue its embedding.
#[instrument(skip(payload, deps), fields(topic = %payload.topic))]
pub async fn generate_content(
    payload: &ContentGeneratePayload,
    deps: &WorkerDeps,
) -> Result<HandlerOutcome, JobError> {
    let generated = deps
        .generator
        .generate(&payload.topic, payload.style.as_deref())
        .await
        .map_err(|e| JobError::ContentGeneration {
            topic: payload.topic.clone(),
            reason: format!("{:#}", e),
        })?;

    let article = NewArticle::builder()
        .title(generated.title)
        .content(generated.content)
        .tags(generated.tags)
        .status(ArticleStatus::Draft)
        .build();
    let article = NewArticle {
        summary: generated.summary,
        category_id: payload.category_id,
        ..article
    };

    let article = deps.articles.create(article).await?;
    info!(article_id = %article.id, "draft article generated");

    Ok(HandlerOutcome::with_follow_ups(vec![FollowUp::embedding(
        article.id,
        QueueLane::Low,
    )]))
}
