use tracing::{info, instrument};

use super::parse_article_id;
use crate::kernel::jobs::{EmbeddingPayload, HandlerOutcome, JobError};
use crate::kernel::WorkerDeps;

/// Compute and store an article's embedding.
///
/// The vector must have exactly the store's dimension; anything else is a
/// failure and nothing is written. Re-running overwrites.
#[instrument(skip(payload, deps), fields(article_id = %payload.article_id))]
pub async fn embed_article(
    payload: &EmbeddingPayload,
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

    let embedding_error = |reason: String| JobError::Embedding {
        article_id: id.to_string(),
        reason,
    };

    let embedding = deps
        .embeddings
        .generate(&article.embedding_text())
        .await
        .map_err(|e| embedding_error(format!("{:#}", e)))?;

    let expected = deps.articles.dimensions();
    if embedding.is_empty() {
        return Err(embedding_error("empty embedding".to_string()));
    }
    if embedding.len() != expected {
        return Err(embedding_error(format!(
            "got {} dimensions, expected {}",
            embedding.len(),
            expected
        )));
    }

    let updated = deps
        .articles
        .update_embedding(id, &embedding)
        .await
        .map_err(|e| embedding_error(format!("{:#}", e)))?;
    if !updated {
        return Err(JobError::NotFound {
            entity: "article",
            id: id.to_string(),
        });
    }

    info!(dims = embedding.len(), "article embedded");
    Ok(HandlerOutcome::done())
}
