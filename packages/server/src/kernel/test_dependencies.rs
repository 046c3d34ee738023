//! Mock collaborators and in-memory stores for handler, dispatcher and
//! worker tests.
//!
//! Every mock records what it was asked for so tests can assert on calls.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use super::{
    BaseAI, BaseClassifier, BaseContentGenerator, BaseEmbeddingService, BaseFeedFetcher,
    BaseWebScraper, Classification, FeedItem, GeneratedContent, ScrapeResult, WorkerDeps,
};
use crate::domains::articles::{Category, MemoryArticleStore};
use crate::domains::sources::MemoryDataSourceStore;

/// Embedding size used by the in-memory test stores.
pub const TEST_DIMENSIONS: usize = 8;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Append-only record of the arguments a mock received.
pub struct CallLog<T>(Mutex<Vec<T>>);

impl<T> Default for CallLog<T> {
    fn default() -> Self {
        Self(Mutex::new(Vec::new()))
    }
}

impl<T: Clone> CallLog<T> {
    fn record(&self, call: T) {
        lock(&self.0).push(call);
    }

    pub fn all(&self) -> Vec<T> {
        lock(&self.0).clone()
    }

    pub fn len(&self) -> usize {
        lock(&self.0).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Build a feed item with a link, title and body.
pub fn feed_item(link: &str, title: &str, content: &str) -> FeedItem {
    FeedItem {
        title: title.to_string(),
        link: Some(link.to_string()),
        content: Some(content.to_string()),
        ..Default::default()
    }
}

// =============================================================================
// Feeds and pages
// =============================================================================

/// Serves canned feeds by URL. Unknown URLs yield an empty feed.
#[derive(Default)]
pub struct MockFeedFetcher {
    feeds: Mutex<HashMap<String, Vec<FeedItem>>>,
    down: HashSet<String>,
    fetched: CallLog<String>,
}

impl MockFeedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_feed(self, url: &str, items: Vec<FeedItem>) -> Self {
        self.set_feed(url, items);
        self
    }

    /// Every fetch of `url` fails with a connection error.
    pub fn with_failure(mut self, url: &str) -> Self {
        self.down.insert(url.to_string());
        self
    }

    /// Replace what `url` serves from now on.
    pub fn set_feed(&self, url: &str, items: Vec<FeedItem>) {
        lock(&self.feeds).insert(url.to_string(), items);
    }

    /// URLs fetched, in order.
    pub fn calls(&self) -> Vec<String> {
        self.fetched.all()
    }
}

#[async_trait]
impl BaseFeedFetcher for MockFeedFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<FeedItem>> {
        self.fetched.record(url.to_string());
        if self.down.contains(url) {
            anyhow::bail!("connection refused: {}", url);
        }
        Ok(lock(&self.feeds).get(url).cloned().unwrap_or_default())
    }
}

/// Serves canned pages by URL. Unknown URLs get a short placeholder page
/// without links.
#[derive(Default)]
pub struct MockWebScraper {
    pages: HashMap<String, ScrapeResult>,
    down: HashSet<String>,
    scraped: CallLog<String>,
}

impl MockWebScraper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, markdown: &str, links: Vec<&str>) -> Self {
        self.pages.insert(
            url.to_string(),
            ScrapeResult {
                url: url.to_string(),
                title: Some(format!("Page: {}", url)),
                markdown: markdown.to_string(),
                links: links.into_iter().map(str::to_string).collect(),
            },
        );
        self
    }

    /// Every scrape of `url` fails with an HTTP 500.
    pub fn with_failure(mut self, url: &str) -> Self {
        self.down.insert(url.to_string());
        self
    }

    pub fn scrape_calls(&self) -> Vec<String> {
        self.scraped.all()
    }

    pub fn was_scraped(&self, url: &str) -> bool {
        self.scraped.all().iter().any(|u| u == url)
    }
}

#[async_trait]
impl BaseWebScraper for MockWebScraper {
    async fn scrape(&self, url: &str) -> Result<ScrapeResult> {
        self.scraped.record(url.to_string());
        if self.down.contains(url) {
            anyhow::bail!("HTTP 500 for {}", url);
        }
        Ok(self.pages.get(url).cloned().unwrap_or_else(|| ScrapeResult {
            url: url.to_string(),
            title: Some("Placeholder".to_string()),
            markdown: format!("# Placeholder\n\nNo canned page for {}.", url),
            links: Vec::new(),
        }))
    }
}

// =============================================================================
// LLM-backed collaborators
// =============================================================================

/// Chat model that replays queued responses, then a fixed fallback.
#[derive(Default)]
pub struct MockAI {
    responses: Mutex<VecDeque<String>>,
    prompts: CallLog<String>,
}

impl MockAI {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the next response.
    pub fn with_response(self, response: impl Into<String>) -> Self {
        lock(&self.responses).push_back(response.into());
        self
    }

    /// User prompts received, in order.
    pub fn calls(&self) -> Vec<String> {
        self.prompts.all()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.len()
    }
}

#[async_trait]
impl BaseAI for MockAI {
    async fn complete(&self, _system_prompt: &str, user_prompt: &str) -> Result<String> {
        self.prompts.record(user_prompt.to_string());
        Ok(lock(&self.responses)
            .pop_front()
            .unwrap_or_else(|| "{}".to_string()))
    }
}

/// Picks a category by exact name (if offered) and fixed tags.
#[derive(Default)]
pub struct MockClassifier {
    category: Option<String>,
    tags: Vec<String>,
    fail: bool,
    panic: bool,
    titles: CallLog<String>,
}

impl MockClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_result(mut self, category: Option<&str>, tags: &[&str]) -> Self {
        self.category = category.map(str::to_string);
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// Panics inside `classify` instead of returning an error.
    pub fn panicking(mut self) -> Self {
        self.panic = true;
        self
    }

    /// Titles of the articles classified.
    pub fn calls(&self) -> Vec<String> {
        self.titles.all()
    }
}

#[async_trait]
impl BaseClassifier for MockClassifier {
    async fn classify(
        &self,
        title: &str,
        _content: &str,
        categories: &[Category],
    ) -> Result<Classification> {
        self.titles.record(title.to_string());
        if self.panic {
            panic!("classifier crashed on {:?}", title);
        }
        if self.fail {
            anyhow::bail!("classifier unavailable");
        }

        let category_id = self
            .category
            .as_deref()
            .and_then(|name| categories.iter().find(|c| c.name == name))
            .map(|c| c.id);

        Ok(Classification {
            category_id,
            tags: self.tags.clone(),
        })
    }
}

/// Deterministic embeddings: a per-pattern vector when the text mentions the
/// pattern, else one fixed vector.
pub struct MockEmbeddingService {
    default: Vec<f32>,
    by_pattern: Vec<(String, Vec<f32>)>,
    fail: bool,
    texts: CallLog<String>,
}

impl MockEmbeddingService {
    pub fn new(dimensions: usize) -> Self {
        Self {
            default: (0..dimensions).map(|i| 0.1 + i as f32 * 0.01).collect(),
            by_pattern: Vec::new(),
            fail: false,
            texts: CallLog::default(),
        }
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.default = embedding;
        self
    }

    /// Case-insensitive substring match; first registered pattern wins.
    pub fn with_pattern_embedding(mut self, pattern: &str, embedding: Vec<f32>) -> Self {
        self.by_pattern.push((pattern.to_lowercase(), embedding));
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// Texts embedded, in order.
    pub fn calls(&self) -> Vec<String> {
        self.texts.all()
    }
}

#[async_trait]
impl BaseEmbeddingService for MockEmbeddingService {
    async fn generate(&self, text: &str) -> Result<Vec<f32>> {
        self.texts.record(text.to_string());
        if self.fail {
            anyhow::bail!("embedding provider returned 503");
        }

        let lowered = text.to_lowercase();
        let embedding = self
            .by_pattern
            .iter()
            .find(|(pattern, _)| lowered.contains(pattern.as_str()))
            .map_or(&self.default, |(_, embedding)| embedding);
        Ok(embedding.clone())
    }
}

/// Writes a short explainer titled "Understanding {topic}".
#[derive(Default)]
pub struct MockContentGenerator {
    fail: bool,
    requests: CallLog<(String, Option<String>)>,
}

impl MockContentGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// (topic, style) of every request.
    pub fn calls(&self) -> Vec<(String, Option<String>)> {
        self.requests.all()
    }
}

#[async_trait]
impl BaseContentGenerator for MockContentGenerator {
    async fn generate(&self, topic: &str, style: Option<&str>) -> Result<GeneratedContent> {
        self.requests
            .record((topic.to_string(), style.map(str::to_string)));
        if self.fail {
            anyhow::bail!("generator timed out");
        }

        Ok(GeneratedContent {
            title: format!("Understanding {}", topic),
            content: format!("# {}\n\nA generated explainer about {}.", topic, topic),
            summary: Some(format!("An overview of {}", topic)),
            tags: vec![topic.to_lowercase()],
        })
    }
}

// =============================================================================
// TestDependencies
// =============================================================================

/// In-memory stores plus mock collaborators, kept as concrete types so
/// tests can seed data and inspect calls.
pub struct TestDependencies {
    pub articles: Arc<MemoryArticleStore>,
    pub sources: Arc<MemoryDataSourceStore>,
    pub feed_fetcher: Arc<MockFeedFetcher>,
    pub scraper: Arc<MockWebScraper>,
    pub classifier: Arc<MockClassifier>,
    pub embeddings: Arc<MockEmbeddingService>,
    pub generator: Arc<MockContentGenerator>,
}

impl Default for TestDependencies {
    fn default() -> Self {
        Self::new()
    }
}

impl TestDependencies {
    pub fn new() -> Self {
        Self {
            articles: Arc::new(MemoryArticleStore::new(TEST_DIMENSIONS)),
            sources: Arc::new(MemoryDataSourceStore::new()),
            feed_fetcher: Arc::new(MockFeedFetcher::new()),
            scraper: Arc::new(MockWebScraper::new()),
            classifier: Arc::new(MockClassifier::new()),
            embeddings: Arc::new(MockEmbeddingService::new(TEST_DIMENSIONS)),
            generator: Arc::new(MockContentGenerator::new()),
        }
    }

    pub fn with_feed_fetcher(mut self, fetcher: MockFeedFetcher) -> Self {
        self.feed_fetcher = Arc::new(fetcher);
        self
    }

    pub fn with_scraper(mut self, scraper: MockWebScraper) -> Self {
        self.scraper = Arc::new(scraper);
        self
    }

    pub fn with_classifier(mut self, classifier: MockClassifier) -> Self {
        self.classifier = Arc::new(classifier);
        self
    }

    pub fn with_embeddings(mut self, embeddings: MockEmbeddingService) -> Self {
        self.embeddings = Arc::new(embeddings);
        self
    }

    pub fn with_generator(mut self, generator: MockContentGenerator) -> Self {
        self.generator = Arc::new(generator);
        self
    }

    /// Wire everything into the handler dependency context.
    pub fn worker_deps(&self) -> WorkerDeps {
        WorkerDeps::new(
            self.articles.clone(),
            self.sources.clone(),
            self.feed_fetcher.clone(),
            self.scraper.clone(),
            self.classifier.clone(),
            self.embeddings.clone(),
            self.generator.clone(),
        )
    }
}
