//! Article persistence seam.
//!
//! Handlers and HTTP routes talk to articles only through [`ArticleStore`];
//! production uses [`PostgresArticleStore`](super::PostgresArticleStore),
//! tests use [`MemoryArticleStore`](super::MemoryArticleStore).

use anyhow::Result;
use async_trait::async_trait;

use super::models::{
    Article, ArticleUpdate, ArticleVersion, Category, NewArticle, SearchError, SimilarityQuery,
};
use crate::common::{ArticleId, CategoryId};

#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Configured embedding dimensionality.
    fn dimensions(&self) -> usize;

    async fn get_by_id(&self, id: ArticleId) -> Result<Option<Article>>;

    async fn create(&self, article: NewArticle) -> Result<Article>;

    /// Apply a partial update. Snapshots the previous text into
    /// `article_versions` when the title or content changes.
    async fn update(&self, id: ArticleId, update: ArticleUpdate) -> Result<Option<Article>>;

    /// Overwrite the embedding. Rejects vectors of the wrong dimension.
    async fn update_embedding(&self, id: ArticleId, embedding: &[f32]) -> Result<bool>;

    /// Overwrite category and tags.
    async fn update_classification(
        &self,
        id: ArticleId,
        category_id: Option<CategoryId>,
        tags: &[String],
    ) -> Result<bool>;

    /// Insert keyed by `source_url`, or refresh the existing row's text.
    /// Returns the stored article and whether it was newly created.
    async fn upsert_by_source_url(&self, article: NewArticle) -> Result<(Article, bool)>;

    /// Oldest articles that still have no embedding.
    async fn find_without_embedding(&self, limit: i64) -> Result<Vec<Article>>;

    /// Embedded articles nearest to the query, ascending by cosine distance.
    async fn find_similar(
        &self,
        query: &SimilarityQuery,
    ) -> Result<Vec<(Article, f64)>, SearchError>;

    /// Articles nearest to an existing article. Empty when the seed has no
    /// embedding yet.
    async fn find_related(
        &self,
        id: ArticleId,
        k: usize,
    ) -> Result<Vec<(Article, f64)>, SearchError> {
        let seed = self
            .get_by_id(id)
            .await?
            .ok_or(SearchError::NotFound { id })?;

        let Some(embedding) = seed.embedding_slice() else {
            return Ok(Vec::new());
        };

        let query = SimilarityQuery::new(embedding.to_vec(), k).excluding(id);
        self.find_similar(&query).await
    }

    async fn increment_view_count(&self, id: ArticleId) -> Result<bool>;

    /// Delete an article and its versions.
    async fn delete(&self, id: ArticleId) -> Result<bool>;

    async fn versions(&self, id: ArticleId) -> Result<Vec<ArticleVersion>>;

    async fn list_categories(&self) -> Result<Vec<Category>>;
}

/// Shared guard for `update_embedding` implementations.
pub(crate) fn check_embedding(embedding: &[f32], dimensions: usize) -> Result<()> {
    if embedding.len() != dimensions {
        anyhow::bail!(
            "embedding has {} dimensions, expected {}",
            embedding.len(),
            dimensions
        );
    }
    if embedding.iter().all(|x| *x == 0.0) {
        anyhow::bail!("refusing to store a zero vector");
    }
    Ok(())
}
