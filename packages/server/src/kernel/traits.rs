// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no business logic.
// Handlers in the domains decide what to fetch, classify or embed; these
// traits only say how to talk to the outside world.
//
// Naming convention: Base* for trait names (e.g., BaseAI, BaseEmbeddingService)

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::CategoryId;
use crate::domains::articles::Category;

// =============================================================================
// Feed Fetcher Trait (Infrastructure)
// =============================================================================

/// One entry from an RSS feed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedItem {
    pub title: String,
    pub link: Option<String>,
    pub guid: Option<String>,
    pub content: Option<String>,
    pub summary: Option<String>,
    pub categories: Vec<String>,
    pub published_at: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait BaseFeedFetcher: Send + Sync {
    /// Fetch and parse a feed
    async fn fetch(&self, url: &str) -> Result<Vec<FeedItem>>;
}

// =============================================================================
// Web Scraper Trait (Infrastructure)
// =============================================================================

/// A single scraped page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScrapeResult {
    pub url: String,
    pub title: Option<String>,
    pub markdown: String,
    /// Same-domain links found on the page
    pub links: Vec<String>,
}

#[async_trait]
pub trait BaseWebScraper: Send + Sync {
    /// Scrape a single page
    async fn scrape(&self, url: &str) -> Result<ScrapeResult>;
}

// =============================================================================
// AI Trait (Infrastructure - Generic LLM capabilities)
// =============================================================================

#[async_trait]
pub trait BaseAI: Send + Sync {
    /// Complete a prompt with an LLM (returns raw text response)
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String>;

    /// Complete a prompt expecting a JSON response (returns raw JSON string)
    /// Parse with serde_json::from_str in calling code
    async fn complete_json(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        let system = format!("{}\n\nRespond with valid JSON only.", system_prompt);
        self.complete(&system, user_prompt).await
    }
}

// =============================================================================
// Classifier Trait (Infrastructure)
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub category_id: Option<CategoryId>,
    pub tags: Vec<String>,
}

#[async_trait]
pub trait BaseClassifier: Send + Sync {
    /// Pick a category (from `categories`) and tags for a piece of content
    async fn classify(
        &self,
        title: &str,
        content: &str,
        categories: &[Category],
    ) -> Result<Classification>;
}

// =============================================================================
// Embedding Service Trait (Infrastructure)
// =============================================================================

#[async_trait]
pub trait BaseEmbeddingService: Send + Sync {
    /// Generate embedding for text
    async fn generate(&self, text: &str) -> Result<Vec<f32>>;
}

// =============================================================================
// Content Generator Trait (Infrastructure)
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeneratedContent {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[async_trait]
pub trait BaseContentGenerator: Send + Sync {
    /// Draft an article about `topic`
    async fn generate(&self, topic: &str, style: Option<&str>) -> Result<GeneratedContent>;
}
