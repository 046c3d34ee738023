use anyhow::{Context, Result};
use async_trait::async_trait;
use pgvector::Vector;
use sqlx::PgPool;
use tracing::instrument;

use super::models::{
    Article, ArticleUpdate, ArticleVersion, Category, NewArticle, SearchError, SimilarityQuery,
};
use super::store::{check_embedding, ArticleStore};
use crate::common::{ArticleId, CategoryId};

#[derive(sqlx::FromRow)]
struct ScoredArticle {
    #[sqlx(flatten)]
    article: Article,
    distance: f64,
}

#[derive(sqlx::FromRow)]
struct UpsertedArticle {
    #[sqlx(flatten)]
    article: Article,
    inserted: bool,
}

/// Articles in Postgres, embeddings in a pgvector column.
#[derive(Clone)]
pub struct PostgresArticleStore {
    pool: PgPool,
    dimensions: usize,
}

impl PostgresArticleStore {
    pub fn new(pool: PgPool, dimensions: usize) -> Self {
        Self { pool, dimensions }
    }

    /// Insert a category (used by seeding and tests).
    pub async fn insert_category(&self, name: &str, description: Option<&str>) -> Result<Category> {
        let category = sqlx::query_as::<_, Category>(
            r#"
            INSERT INTO categories (id, name, description)
            VALUES ($1, $2, $3)
            ON CONFLICT (name) DO UPDATE SET description = EXCLUDED.description
            RETURNING id, name, description
            "#,
        )
        .bind(CategoryId::new())
        .bind(name)
        .bind(description)
        .fetch_one(&self.pool)
        .await?;

        Ok(category)
    }
}

#[async_trait]
impl ArticleStore for PostgresArticleStore {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn get_by_id(&self, id: ArticleId) -> Result<Option<Article>> {
        let article = sqlx::query_as::<_, Article>("SELECT * FROM articles WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(article)
    }

    async fn create(&self, article: NewArticle) -> Result<Article> {
        let row = article.into_article();
        let article = sqlx::query_as::<_, Article>(
            r#"
            INSERT INTO articles (
                id, title, content, summary, category_id, tags, status,
                source_url, source_urls, data_source_id, published_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(row.id)
        .bind(&row.title)
        .bind(&row.content)
        .bind(&row.summary)
        .bind(row.category_id)
        .bind(&row.tags)
        .bind(row.status)
        .bind(&row.source_url)
        .bind(&row.source_urls)
        .bind(row.data_source_id)
        .bind(row.published_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(article)
    }

    async fn update(&self, id: ArticleId, update: ArticleUpdate) -> Result<Option<Article>> {
        let mut tx = self.pool.begin().await?;

        let Some(current) =
            sqlx::query_as::<_, Article>("SELECT * FROM articles WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
        else {
            return Ok(None);
        };

        if update.changes_text(&current) {
            sqlx::query(
                r#"
                INSERT INTO article_versions (id, article_id, title, content)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(uuid::Uuid::now_v7())
            .bind(id)
            .bind(&current.title)
            .bind(&current.content)
            .execute(&mut *tx)
            .await?;
        }

        let article = sqlx::query_as::<_, Article>(
            r#"
            UPDATE articles
            SET title = COALESCE($2, title),
                content = COALESCE($3, content),
                summary = COALESCE($4, summary),
                status = COALESCE($5, status),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(update.title)
        .bind(update.content)
        .bind(update.summary)
        .bind(update.status)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(article))
    }

    #[instrument(skip(self, embedding), fields(dims = embedding.len()))]
    async fn update_embedding(&self, id: ArticleId, embedding: &[f32]) -> Result<bool> {
        check_embedding(embedding, self.dimensions)?;
        let vector = Vector::from(embedding.to_vec());

        let result =
            sqlx::query("UPDATE articles SET embedding = $2, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .bind(vector)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_classification(
        &self,
        id: ArticleId,
        category_id: Option<CategoryId>,
        tags: &[String],
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE articles
            SET category_id = $2,
                tags = $3,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(category_id)
        .bind(tags)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, article), fields(source_url = ?article.source_url))]
    async fn upsert_by_source_url(&self, article: NewArticle) -> Result<(Article, bool)> {
        let row = article.into_article();
        let source_url = row
            .source_url
            .clone()
            .context("upsert_by_source_url requires a source_url")?;

        // xmax = 0 only for rows this statement inserted
        let upserted = sqlx::query_as::<_, UpsertedArticle>(
            r#"
            INSERT INTO articles (
                id, title, content, summary, category_id, tags, status,
                source_url, source_urls, data_source_id, published_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (source_url) DO UPDATE
            SET title = EXCLUDED.title,
                content = EXCLUDED.content,
                summary = COALESCE(EXCLUDED.summary, articles.summary),
                updated_at = NOW()
            RETURNING *, (xmax = 0) AS inserted
            "#,
        )
        .bind(row.id)
        .bind(&row.title)
        .bind(&row.content)
        .bind(&row.summary)
        .bind(row.category_id)
        .bind(&row.tags)
        .bind(row.status)
        .bind(&source_url)
        .bind(&row.source_urls)
        .bind(row.data_source_id)
        .bind(row.published_at)
        .fetch_one(&self.pool)
        .await?;

        Ok((upserted.article, upserted.inserted))
    }

    async fn find_without_embedding(&self, limit: i64) -> Result<Vec<Article>> {
        let articles = sqlx::query_as::<_, Article>(
            r#"
            SELECT * FROM articles
            WHERE embedding IS NULL
            ORDER BY created_at
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(articles)
    }

    #[instrument(skip(self, query), fields(k = query.k))]
    async fn find_similar(
        &self,
        query: &SimilarityQuery,
    ) -> Result<Vec<(Article, f64)>, SearchError> {
        let limit = query.validate(self.dimensions)?;
        if limit == 0 {
            return Ok(Vec::new());
        }

        let vector = Vector::from(query.embedding.clone());

        let rows = sqlx::query_as::<_, ScoredArticle>(
            r#"
            SELECT a.*, (a.embedding <=> $1)::float8 AS distance
            FROM articles a
            WHERE a.embedding IS NOT NULL
              AND ($2::uuid IS NULL OR a.id <> $2)
              AND ($3::uuid IS NULL OR a.category_id = $3)
              AND ($4::article_status IS NULL OR a.status = $4)
            ORDER BY a.embedding <=> $1
            LIMIT $5
            "#,
        )
        .bind(vector)
        .bind(query.exclude_id)
        .bind(query.category_id)
        .bind(query.status)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(anyhow::Error::from)?;

        Ok(rows.into_iter().map(|r| (r.article, r.distance)).collect())
    }

    async fn increment_view_count(&self, id: ArticleId) -> Result<bool> {
        let result = sqlx::query("UPDATE articles SET view_count = view_count + 1 WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: ArticleId) -> Result<bool> {
        // article_versions rows go with it (ON DELETE CASCADE)
        let result = sqlx::query("DELETE FROM articles WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn versions(&self, id: ArticleId) -> Result<Vec<ArticleVersion>> {
        let versions = sqlx::query_as::<_, ArticleVersion>(
            "SELECT * FROM article_versions WHERE article_id = $1 ORDER BY created_at",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        Ok(versions)
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        let categories = sqlx::query_as::<_, Category>(
            "SELECT id, name, description FROM categories ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(categories)
    }
}
