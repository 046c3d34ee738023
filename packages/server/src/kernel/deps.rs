//! Worker dependencies for job handlers (using traits for testability)
//!
//! Built once at startup, shared behind an `Arc`, never mutated. Every
//! external service sits behind a Base* trait so tests can swap in mocks.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::warn;

use crate::common::utils::EmbeddingService;
use crate::config::Config;
use crate::domains::articles::{ArticleStore, PostgresArticleStore};
use crate::domains::sources::{DataSourceStore, PostgresDataSourceStore};
use crate::kernel::ai::{LlmClassifier, LlmContentGenerator, OpenAiChat};
use crate::kernel::feed_fetcher::RssFeedFetcher;
use crate::kernel::simple_scraper::SimpleScraper;
use crate::kernel::{
    BaseAI, BaseClassifier, BaseContentGenerator, BaseEmbeddingService, BaseFeedFetcher,
    BaseWebScraper,
};

// =============================================================================
// WorkerDeps
// =============================================================================

/// Dependencies accessible to job handlers
#[derive(Clone)]
pub struct WorkerDeps {
    pub articles: Arc<dyn ArticleStore>,
    pub sources: Arc<dyn DataSourceStore>,
    pub feed_fetcher: Arc<dyn BaseFeedFetcher>,
    pub scraper: Arc<dyn BaseWebScraper>,
    pub classifier: Arc<dyn BaseClassifier>,
    pub embeddings: Arc<dyn BaseEmbeddingService>,
    pub generator: Arc<dyn BaseContentGenerator>,
}

impl WorkerDeps {
    /// Create new WorkerDeps with the given dependencies
    pub fn new(
        articles: Arc<dyn ArticleStore>,
        sources: Arc<dyn DataSourceStore>,
        feed_fetcher: Arc<dyn BaseFeedFetcher>,
        scraper: Arc<dyn BaseWebScraper>,
        classifier: Arc<dyn BaseClassifier>,
        embeddings: Arc<dyn BaseEmbeddingService>,
        generator: Arc<dyn BaseContentGenerator>,
    ) -> Self {
        Self {
            articles,
            sources,
            feed_fetcher,
            scraper,
            classifier,
            embeddings,
            generator,
        }
    }

    /// Wire the Postgres stores and HTTP-backed collaborators.
    pub fn from_config(config: &Config, pool: PgPool) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()?;

        let (ai, embeddings): (Arc<dyn BaseAI>, Arc<dyn BaseEmbeddingService>) =
            match &config.openai_api_key {
                Some(key) => (
                    Arc::new(OpenAiChat::new(
                        client.clone(),
                        key.clone(),
                        config.openai_base_url.clone(),
                        config.chat_model.clone(),
                    )),
                    Arc::new(EmbeddingService::new(
                        client,
                        key.clone(),
                        config.openai_base_url.clone(),
                        config.embedding_model.clone(),
                        config.embedding_dimensions,
                    )),
                ),
                None => {
                    warn!("OPENAI_API_KEY not set; classify, embedding and generation jobs will fail");
                    (Arc::new(MissingApiKey), Arc::new(MissingApiKey))
                }
            };

        Ok(Self {
            articles: Arc::new(PostgresArticleStore::new(
                pool.clone(),
                config.embedding_dimensions,
            )),
            sources: Arc::new(PostgresDataSourceStore::new(pool)),
            feed_fetcher: Arc::new(RssFeedFetcher::new(config.http_timeout)?),
            scraper: Arc::new(SimpleScraper::new(config.http_timeout)?),
            classifier: Arc::new(LlmClassifier::new(ai.clone())),
            embeddings,
            generator: Arc::new(LlmContentGenerator::new(ai)),
        })
    }
}

// =============================================================================
// Unconfigured AI
// =============================================================================

/// Stand-in used when no API key is configured. Every call fails.
struct MissingApiKey;

#[async_trait]
impl BaseAI for MissingApiKey {
    async fn complete(&self, _system_prompt: &str, _user_prompt: &str) -> Result<String> {
        anyhow::bail!("OPENAI_API_KEY is not set")
    }
}

#[async_trait]
impl BaseEmbeddingService for MissingApiKey {
    async fn generate(&self, _text: &str) -> Result<Vec<f32>> {
        anyhow::bail!("OPENAI_API_KEY is not set")
    }
}
