//! Web crawl - fetch a page and store it as an article

use chrono::Utc;
use tracing::{info, instrument, warn};

use crate::domains::articles::{ArticleStatus, NewArticle};
use crate::domains::sources::models::{DataSource, DataSourceType};
use crate::kernel::jobs::{FollowUp, HandlerOutcome, JobError, QueueLane, WebCrawlPayload};
use crate::kernel::WorkerDeps;

/// Most links a single page may fan out to.
pub const MAX_LINKS_PER_PAGE: usize = 10;

/// Scrape one page and upsert it keyed by the requested URL.
///
/// Classification and embedding are queued only when the article is new,
/// so a redelivered job does not redo them. With `depth > 1` the page's
/// same-site links are queued one level shallower.
#[instrument(skip(payload, deps), fields(url = %payload.url, depth = ?payload.depth))]
pub async fn crawl_page(
    payload: &WebCrawlPayload,
    deps: &WorkerDeps,
) -> Result<HandlerOutcome, JobError> {
    let attempted_at = Utc::now();
    let source = find_crawl_source(&payload.url, deps).await?;

    let scraped = match deps.scraper.scrape(&payload.url).await {
        Ok(scraped) => scraped,
        Err(e) => {
            let reason = format!("{:#}", e);
            if let Some(source) = &source {
                deps.sources
                    .update_last_fetched(source.id, attempted_at, Some(&reason))
                    .await?;
            }
            return Err(JobError::Crawl {
                url: payload.url.clone(),
                reason,
            });
        }
    };

    let title = scraped
        .title
        .clone()
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| payload.url.clone());

    let article = NewArticle {
        title,
        content: scraped.markdown,
        summary: None,
        category_id: payload
            .category_id
            .or_else(|| source.as_ref().and_then(|s| s.category_id)),
        tags: Vec::new(),
        status: ArticleStatus::Published,
        source_url: Some(payload.url.clone()),
        data_source_id: source.as_ref().map(|s| s.id),
        published_at: Some(attempted_at),
    };

    let (article, created) = deps.articles.upsert_by_source_url(article).await?;

    let mut outcome = HandlerOutcome::done();
    if created {
        outcome
            .follow_ups
            .push(FollowUp::classify(article.id, QueueLane::Default));
        outcome
            .follow_ups
            .push(FollowUp::embedding(article.id, QueueLane::Default));
    }

    let depth = payload.depth.unwrap_or(1);
    if depth > 1 {
        for link in scraped.links.into_iter().take(MAX_LINKS_PER_PAGE) {
            outcome.follow_ups.push(FollowUp::new(
                WebCrawlPayload {
                    url: link,
                    category_id: payload.category_id,
                    depth: Some(depth - 1),
                },
                QueueLane::Default,
            ));
        }
    }

    if let Some(source) = &source {
        deps.sources
            .update_last_fetched(source.id, attempted_at, None)
            .await?;
    }

    info!(
        article_id = %article.id,
        created,
        follow_ups = outcome.follow_ups.len(),
        "page crawled"
    );
    Ok(outcome)
}

async fn find_crawl_source(url: &str, deps: &WorkerDeps) -> Result<Option<DataSource>, JobError> {
    let sources = deps.sources.find_by_type(DataSourceType::Crawl).await?;
    let matched = sources.into_iter().find(|s| s.enabled && s.matches_url(url));
    if matched.is_none() {
        warn!(url = %url, "crawling a URL with no configured source");
    }
    Ok(matched)
}
