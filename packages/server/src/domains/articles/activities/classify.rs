use tracing::{info, instrument};

use super::parse_article_id;
use crate::kernel::jobs::{ClassifyPayload, HandlerOutcome, JobError};
use crate::kernel::WorkerDeps;

/// Assign a category and tags to an article.
///
/// Overwrites any previous classification, so re-running is safe.
#[instrument(skip(payload, deps), fields(article_id = %payload.article_id))]
pub async fn classify_article(
    payload: &ClassifyPayload,
    deps: &WorkerDeps,
) -> Result<HandlerOutcome, JobError> {
    let id = parse_article_id(&payload.article_id)?;

    let article = deps
        .articles
        .get_by_id(id)
        .await?
        .ok_or_else(|| JobError::NotFound {
            entity: "article",
            id: id.to_string(),
        })?;

    let categories = deps.articles.list_categories().await?;

    let classification = deps
        .classifier
        .classify(&article.title, &article.content, &categories)
        .await
        .map_err(|e| JobError::Classification {
            article_id: id.to_string(),
            reason: format!("{:#}", e),
        })?;

    let updated = deps
        .articles
        .update_classification(id, classification.category_id, &classification.tags)
        .await?;
    if !updated {
        return Err(JobError::NotFound {
            entity: "article",
            id: id.to_string(),
        });
    }

    info!(
        category_id = ?classification.category_id,
        tags = classification.tags.len(),
        "article classified"
    );

    Ok(HandlerOutcome::done())
}
