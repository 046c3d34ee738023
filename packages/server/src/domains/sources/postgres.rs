use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::models::{DataSource, DataSourceType};
use super::store::DataSourceStore;
use crate::common::DataSourceId;

#[derive(Clone)]
pub struct PostgresDataSourceStore {
    pool: PgPool,
}

impl PostgresDataSourceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a source (used by seeding and tests).
    pub async fn insert(&self, source: &DataSource) -> Result<DataSource> {
        let inserted = sqlx::query_as::<_, DataSource>(
            r#"
            INSERT INTO data_sources (
                id, name, source_type, url, enabled, fetch_interval_secs,
                last_fetched_at, last_error, category_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(source.id)
        .bind(&source.name)
        .bind(source.source_type)
        .bind(&source.url)
        .bind(source.enabled)
        .bind(source.fetch_interval_secs)
        .bind(source.last_fetched_at)
        .bind(&source.last_error)
        .bind(source.category_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(inserted)
    }
}

#[async_trait]
impl DataSourceStore for PostgresDataSourceStore {
    async fn find_by_type(&self, source_type: DataSourceType) -> Result<Vec<DataSource>> {
        let sources = sqlx::query_as::<_, DataSource>(
            "SELECT * FROM data_sources WHERE source_type = $1 ORDER BY created_at",
        )
        .bind(source_type)
        .fetch_all(&self.pool)
        .await?;
        Ok(sources)
    }

    async fn find_enabled(&self) -> Result<Vec<DataSource>> {
        let sources = sqlx::query_as::<_, DataSource>(
            "SELECT * FROM data_sources WHERE enabled ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(sources)
    }

    async fn find_due_for_fetch(&self, now: DateTime<Utc>) -> Result<Vec<DataSource>> {
        let sources = sqlx::query_as::<_, DataSource>(
            r#"
            SELECT * FROM data_sources
            WHERE enabled
              AND (
                last_fetched_at IS NULL
                OR $1 >= last_fetched_at + make_interval(secs => fetch_interval_secs::float8)
              )
            ORDER BY last_fetched_at NULLS FIRST
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        Ok(sources)
    }

    async fn update_last_fetched(
        &self,
        id: DataSourceId,
        at: DateTime<Utc>,
        error: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE data_sources
            SET last_fetched_at = $2,
                last_error = $3,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(at)
        .bind(error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
