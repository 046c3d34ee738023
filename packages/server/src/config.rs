use anyhow::{Context, Result};
use dotenvy::dotenv;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::env;
use std::str::FromStr;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Width of `articles.embedding` as declared in the migrations.
pub const EMBEDDING_COLUMN_DIMENSIONS: usize = 1536;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub embedding_model: String,
    pub embedding_dimensions: usize,
    pub chat_model: String,
    pub worker_concurrency: usize,
    pub worker_poll_interval: Duration,
    pub rss_sync_cron: String,
    pub source_sweep_cron: Option<String>,
    pub http_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            port: parse_or("PORT", 8080)?,
            openai_api_key: env::var("OPENAI_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            openai_base_url: env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            embedding_model: env::var("EMBEDDING_MODEL")
                .unwrap_or_else(|_| "text-embedding-3-small".to_string()),
            embedding_dimensions: check_embedding_dimensions(parse_or(
                "EMBEDDING_DIMENSIONS",
                EMBEDDING_COLUMN_DIMENSIONS,
            )?)?,
            chat_model: env::var("CHAT_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            worker_concurrency: parse_or("WORKER_CONCURRENCY", 10)?,
            worker_poll_interval: Duration::from_millis(parse_or("WORKER_POLL_INTERVAL_MS", 1000)?),
            rss_sync_cron: env::var("RSS_SYNC_CRON").unwrap_or_else(|_| "0 0 * * * *".to_string()),
            source_sweep_cron: env::var("SOURCE_SWEEP_CRON")
                .ok()
                .filter(|c| !c.trim().is_empty()),
            http_timeout: Duration::from_secs(parse_or("HTTP_TIMEOUT_SECS", 30)?),
        })
    }

    /// Connect to Postgres and apply pending migrations.
    pub async fn connect_and_migrate(&self, max_connections: u32) -> Result<PgPool> {
        tracing::info!(max_connections, "Connecting to database...");
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(&self.database_url)
            .await
            .context("Failed to connect to database")?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("Failed to run migrations")?;
        verify_embedding_column(&pool, self.embedding_dimensions).await?;
        tracing::info!("Database ready");

        Ok(pool)
    }
}

/// Only the column's own width is accepted.
pub fn check_embedding_dimensions(dimensions: usize) -> Result<usize> {
    if dimensions != EMBEDDING_COLUMN_DIMENSIONS {
        anyhow::bail!(
            "EMBEDDING_DIMENSIONS is {} but articles.embedding is vector({})",
            dimensions,
            EMBEDDING_COLUMN_DIMENSIONS
        );
    }
    Ok(dimensions)
}

/// Compare `dimensions` with the declared width of the live column.
pub async fn verify_embedding_column(pool: &PgPool, dimensions: usize) -> Result<()> {
    let declared: i32 = sqlx::query_scalar(
        r#"
        SELECT atttypmod
        FROM pg_attribute
        WHERE attrelid = 'articles'::regclass
          AND attname = 'embedding'
          AND NOT attisdropped
        "#,
    )
    .fetch_one(pool)
    .await
    .context("Failed to read articles.embedding column type")?;

    if usize::try_from(declared).ok() != Some(dimensions) {
        anyhow::bail!(
            "articles.embedding is declared with {} dimensions, configured {}",
            declared,
            dimensions
        );
    }
    Ok(())
}

/// Install the global subscriber. `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,insight_core=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} must be a valid number", key)),
        Err(_) => Ok(default),
    }
}
