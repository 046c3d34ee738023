//! RSS sync - pull feed items into articles

use chrono::Utc;
use tracing::{info, instrument, warn};

use crate::common::utils::content_identity;
use crate::common::CategoryId;
use crate::domains::articles::{ArticleStatus, NewArticle};
use crate::domains::sources::models::{DataSource, DataSourceType};
use crate::kernel::jobs::{FollowUp, HandlerOutcome, JobError, QueueLane, RssSyncPayload};
use crate::kernel::{FeedItem, WorkerDeps};

/// What one source contributed to a sync.
#[derive(Debug, Default)]
pub struct SourceSyncReport {
    pub fetched: usize,
    pub created: usize,
    pub follow_ups: Vec<FollowUp>,
}

/// Sync one feed (`feed_url` set) or every enabled RSS source.
///
/// With an explicit feed the job fails when that feed fails. Without one,
/// each source's failure is recorded on the source and the rest continue.
#[instrument(skip(payload, deps), fields(feed_url = ?payload.feed_url))]
pub async fn sync_rss(
    payload: &RssSyncPayload,
    deps: &WorkerDeps,
) -> Result<HandlerOutcome, JobError> {
    let enabled: Vec<DataSource> = deps
        .sources
        .find_by_type(DataSourceType::Rss)
        .await?
        .into_iter()
        .filter(|s| s.enabled)
        .collect();

    if let Some(feed_url) = &payload.feed_url {
        let source = enabled
            .into_iter()
            .find(|s| s.matches_url(feed_url))
            .ok_or_else(|| JobError::SourceNotFound {
                feed_url: feed_url.clone(),
            })?;

        let report = sync_source(&source, payload.category_id, deps).await?;
        info!(
            source = %source.name,
            fetched = report.fetched,
            created = report.created,
            "feed synced"
        );
        return Ok(HandlerOutcome::with_follow_ups(report.follow_ups));
    }

    let mut outcome = HandlerOutcome::done();
    let mut failed = 0usize;
    for source in &enabled {
        match sync_source(source, payload.category_id, deps).await {
            Ok(report) => {
                info!(
                    source = %source.name,
                    fetched = report.fetched,
                    created = report.created,
                    "feed synced"
                );
                outcome.follow_ups.extend(report.follow_ups);
            }
            Err(e) => {
                failed += 1;
                warn!(source = %source.name, url = %source.url, error = %e, "feed sync failed");
            }
        }
    }

    info!(
        sources = enabled.len(),
        failed,
        follow_ups = outcome.follow_ups.len(),
        "rss sync finished"
    );
    Ok(outcome)
}

/// Fetch one source and upsert its items. The attempt is always recorded
/// on the source, with the error text when it failed.
pub async fn sync_source(
    source: &DataSource,
    category_override: Option<CategoryId>,
    deps: &WorkerDeps,
) -> Result<SourceSyncReport, JobError> {
    let attempted_at = Utc::now();

    let items = match deps.feed_fetcher.fetch(&source.url).await {
        Ok(items) => items,
        Err(e) => {
            let reason = format!("{:#}", e);
            deps.sources
                .update_last_fetched(source.id, attempted_at, Some(&reason))
                .await?;
            return Err(JobError::FeedFetch {
                url: source.url.clone(),
                reason,
            });
        }
    };

    let category_id = category_override.or(source.category_id);
    let mut report = SourceSyncReport {
        fetched: items.len(),
        ..Default::default()
    };

    for item in items {
        let Some(article) = to_new_article(item, source, category_id) else {
            continue;
        };
        let (article, created) = match deps.articles.upsert_by_source_url(article).await {
            Ok(result) => result,
            Err(e) => {
                deps.sources
                    .update_last_fetched(source.id, attempted_at, Some(&format!("{:#}", e)))
                    .await?;
                return Err(e.into());
            }
        };
        if created {
            report.created += 1;
            report
                .follow_ups
                .push(FollowUp::classify(article.id, QueueLane::Default));
            report
                .follow_ups
                .push(FollowUp::embedding(article.id, QueueLane::Default));
        }
    }

    deps.sources
        .update_last_fetched(source.id, attempted_at, None)
        .await?;

    Ok(report)
}

/// Map a feed item to an article keyed by link, else guid, else a hash of
/// its text. Items with no title and no body are dropped.
fn to_new_article(
    item: FeedItem,
    source: &DataSource,
    category_id: Option<CategoryId>,
) -> Option<NewArticle> {
    let content = item
        .content
        .clone()
        .or_else(|| item.summary.clone())
        .unwrap_or_default();
    if item.title.is_empty() && content.trim().is_empty() {
        return None;
    }

    let title = if item.title.is_empty() {
        "Untitled".to_string()
    } else {
        item.title.clone()
    };

    let key = item
        .link
        .clone()
        .or_else(|| item.guid.clone().filter(|g| !g.trim().is_empty()))
        .unwrap_or_else(|| content_identity(&title, &content));

    let tags: Vec<String> = item
        .categories
        .iter()
        .map(|c| c.trim().to_lowercase())
        .filter(|c| !c.is_empty())
        .collect();

    Some(NewArticle {
        title,
        content,
        summary: item.summary,
        category_id,
        tags,
        status: ArticleStatus::Published,
        source_url: Some(key),
        data_source_id: Some(source.id),
        published_at: item.published_at.or_else(|| Some(Utc::now())),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> DataSource {
        DataSource::builder()
            .name("blog")
            .source_type(DataSourceType::Rss)
            .url("https://blog.example.org/feed")
            .build()
    }

    #[test]
    fn test_item_key_prefers_link_then_guid() {
        let item = FeedItem {
            title: "A".to_string(),
            link: Some("https://blog.example.org/a".to_string()),
            guid: Some("guid-a".to_string()),
            summary: Some("s".to_string()),
            ..Default::default()
        };
        let article = to_new_article(item.clone(), &source(), None).unwrap();
        assert_eq!(article.source_url.as_deref(), Some("https://blog.example.org/a"));

        let article = to_new_article(
            FeedItem {
                link: None,
                ..item
            },
            &source(),
            None,
        )
        .unwrap();
        assert_eq!(article.source_url.as_deref(), Some("guid-a"));
    }

    #[test]
    fn test_item_without_link_or_guid_uses_content_hash() {
        let item = FeedItem {
            title: "A".to_string(),
            content: Some("body".to_string()),
            ..Default::default()
        };
        let article = to_new_article(item, &source(), None).unwrap();
        assert!(article.source_url.unwrap().starts_with("urn:sha256:"));
    }

    #[test]
    fn test_empty_item_is_dropped() {
        assert!(to_new_article(FeedItem::default(), &source(), None).is_none());
    }
}
