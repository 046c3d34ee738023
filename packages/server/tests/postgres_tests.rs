//! Database-backed tests for the durable queue and pgvector search.
//!
//! These start a pgvector Postgres container and share it across the run.
//! Run with: cargo test --test postgres_tests -- --ignored

mod common;

use chrono::{Duration, Utc};
use common::*;
use insight_core::common::{CategoryId, DataSourceId};
use insight_core::domains::articles::{ArticleStore, NewArticle, SimilarityQuery};
use insight_core::domains::sources::DataSourceStore;
use insight_core::verify_embedding_column;
use insight_core::kernel::jobs::{
    JobPayload, JobQueue, JobStatus, QueueLane, RssSyncPayload, WebCrawlPayload,
};
use test_context::test_context;

const DIMS: usize = 1536;

fn crawl(url: &str) -> JobPayload {
    WebCrawlPayload {
        url: url.to_string(),
        category_id: None,
        depth: None,
    }
    .into()
}

async fn insert_category(ctx: &TestHarness) -> CategoryId {
    let id = CategoryId::new();
    sqlx::query("INSERT INTO categories (id, name) VALUES ($1, $2)")
        .bind(id)
        .bind(format!("category-{}", id))
        .execute(&ctx.db_pool)
        .await
        .unwrap();
    id
}

// =============================================================================
// Job queue
// =============================================================================

#[test_context(TestHarness)]
#[tokio::test]
#[ignore = "requires Docker"]
async fn enqueued_job_is_pending_and_decodable(ctx: &mut TestHarness) {
    let queue = ctx.queue();
    let payload = crawl("https://docs.example.org/pg");

    let handle = queue
        .enqueue(payload.encode().unwrap(), QueueLane::Low)
        .await
        .unwrap();

    let job = queue.find(handle.id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.lane, QueueLane::Low);
    assert_eq!(job.attempts, 0);
    assert_eq!(job.decode().unwrap(), payload);
}

#[test_context(TestHarness)]
#[tokio::test]
#[ignore = "requires Docker"]
async fn claim_takes_ready_jobs_and_leases_them(ctx: &mut TestHarness) {
    let queue = ctx.queue();
    let ready = queue
        .enqueue(
            crawl("https://docs.example.org/ready").encode().unwrap(),
            QueueLane::Critical,
        )
        .await
        .unwrap();
    let later = queue
        .schedule(
            crawl("https://docs.example.org/later").encode().unwrap(),
            QueueLane::Critical,
            Utc::now() + Duration::hours(1),
        )
        .await
        .unwrap();

    let claimed = queue
        .claim("pg-worker", &[QueueLane::Critical], 1000)
        .await
        .unwrap();

    let mine = claimed.iter().find(|j| j.id == ready.id).unwrap();
    assert_eq!(mine.status, JobStatus::Running);
    assert_eq!(mine.attempts, 1);
    assert_eq!(mine.worker_id.as_deref(), Some("pg-worker"));
    assert!(mine.lease_expires_at.is_some());
    assert!(claimed.iter().all(|j| j.id != later.id));

    queue.mark_succeeded(ready.id).await.unwrap();
    let done = queue.find(ready.id).await.unwrap().unwrap();
    assert_eq!(done.status, JobStatus::Succeeded);
    assert!(done.lease_expires_at.is_none());
}

#[test_context(TestHarness)]
#[tokio::test]
#[ignore = "requires Docker"]
async fn failures_follow_the_retry_policy(ctx: &mut TestHarness) {
    let queue = ctx.queue();
    let future = Utc::now() + Duration::hours(1);
    let encoded = JobPayload::from(RssSyncPayload::default()).encode().unwrap();
    let retried = queue
        .schedule(encoded.clone(), QueueLane::Default, future)
        .await
        .unwrap();
    let fatal = queue
        .schedule(encoded, QueueLane::Default, future)
        .await
        .unwrap();

    queue.mark_failed(retried.id, "timeout", true).await.unwrap();
    queue.mark_failed(fatal.id, "bad payload", false).await.unwrap();

    let retried = queue.find(retried.id).await.unwrap().unwrap();
    assert_eq!(retried.status, JobStatus::Pending);
    assert_eq!(retried.error_message.as_deref(), Some("timeout"));

    let fatal = queue.find(fatal.id).await.unwrap().unwrap();
    assert_eq!(fatal.status, JobStatus::Failed);
    assert_eq!(fatal.error_message.as_deref(), Some("bad payload"));
}

#[test_context(TestHarness)]
#[tokio::test]
#[ignore = "requires Docker"]
async fn expired_lease_on_last_attempt_goes_dead(ctx: &mut TestHarness) {
    let queue = ctx.queue();
    let handle = queue
        .enqueue(
            crawl("https://docs.example.org/crashed").encode().unwrap(),
            QueueLane::Default,
        )
        .await
        .unwrap();
    // Claimed for the last time by a worker that never came back
    sqlx::query(
        "UPDATE jobs SET status = 'running', attempts = max_retries + 1, \
         lease_expires_at = NOW() - INTERVAL '1 second' WHERE id = $1",
    )
    .bind(handle.id)
    .execute(&ctx.db_pool)
    .await
    .unwrap();

    let claimed = queue
        .claim("pg-worker", &[QueueLane::Default], 10)
        .await
        .unwrap();

    assert!(claimed.iter().all(|j| j.id != handle.id));
    let job = queue.find(handle.id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Dead);
    assert!(job.lease_expires_at.is_none());
    assert!(job.error_message.unwrap().contains("lease expired"));
}

#[test_context(TestHarness)]
#[tokio::test]
#[ignore = "requires Docker"]
async fn cancel_only_touches_pending_jobs(ctx: &mut TestHarness) {
    let queue = ctx.queue();
    let handle = queue
        .schedule(
            crawl("https://docs.example.org/cancel").encode().unwrap(),
            QueueLane::Default,
            Utc::now() + Duration::hours(1),
        )
        .await
        .unwrap();

    assert!(queue.cancel(handle.id).await.unwrap());
    assert!(!queue.cancel(handle.id).await.unwrap());
    assert_eq!(
        queue.find(handle.id).await.unwrap().unwrap().status,
        JobStatus::Cancelled
    );
}

// =============================================================================
// Articles and pgvector search
// =============================================================================

#[test_context(TestHarness)]
#[tokio::test]
#[ignore = "requires Docker"]
async fn pgvector_search_orders_by_cosine_distance(ctx: &mut TestHarness) {
    let store = ctx.articles();
    let category = insert_category(ctx).await;

    let mut seeded = Vec::new();
    for (title, tilt) in [("near", 0.1), ("middle", 1.0), ("far", 5.0)] {
        let article = store
            .create(
                NewArticle::builder()
                    .title(title)
                    .content(format!("{} body", title))
                    .category_id(category)
                    .build(),
            )
            .await
            .unwrap();
        store
            .update_embedding(article.id, &axis_vector(DIMS, 10, tilt))
            .await
            .unwrap();
        seeded.push(article.id);
    }
    // Same category, no embedding
    store
        .create(
            NewArticle::builder()
                .title("bare")
                .content("bare body")
                .category_id(category)
                .build(),
        )
        .await
        .unwrap();

    let query = SimilarityQuery::new(axis_vector(DIMS, 10, 0.0), 10).in_category(category);
    let results = store.find_similar(&query).await.unwrap();

    let ids: Vec<_> = results.iter().map(|(a, _)| a.id).collect();
    assert_eq!(ids, seeded);
    assert!(results.windows(2).all(|w| w[0].1 <= w[1].1));

    let top = store
        .find_similar(&SimilarityQuery::new(axis_vector(DIMS, 10, 0.0), 2).in_category(category))
        .await
        .unwrap();
    assert_eq!(top.len(), 2);
}

#[test_context(TestHarness)]
#[tokio::test]
#[ignore = "requires Docker"]
async fn related_articles_exclude_the_seed(ctx: &mut TestHarness) {
    let store = ctx.articles();
    let seed = seed_article(&store, "seed", Some(axis_vector(DIMS, 900, 0.0))).await;
    let neighbour = seed_article(&store, "neighbour", Some(axis_vector(DIMS, 900, 0.2))).await;

    let related = store.find_related(seed.id, 5).await.unwrap();

    assert!(related.iter().all(|(a, _)| a.id != seed.id));
    assert_eq!(related[0].0.id, neighbour.id);
}

#[test_context(TestHarness)]
#[tokio::test]
#[ignore = "requires Docker"]
async fn upsert_by_source_url_is_idempotent(ctx: &mut TestHarness) {
    let store = ctx.articles();
    let url = format!("https://blog.example.org/{}", DataSourceId::new());
    let article = || {
        NewArticle::builder()
            .title("Account abstraction")
            .content("ERC-4337 bundlers")
            .source_url(url.clone())
            .build()
    };

    let (first, created) = store.upsert_by_source_url(article()).await.unwrap();
    assert!(created);
    let (second, created) = store.upsert_by_source_url(article()).await.unwrap();
    assert!(!created);
    assert_eq!(first.id, second.id);
}

#[test_context(TestHarness)]
#[tokio::test]
#[ignore = "requires Docker"]
async fn embedding_column_width_is_checked(ctx: &mut TestHarness) {
    verify_embedding_column(&ctx.db_pool, DIMS).await.unwrap();

    let err = verify_embedding_column(&ctx.db_pool, 768).await.unwrap_err();
    assert!(err.to_string().contains("1536"));
}

// =============================================================================
// Data sources
// =============================================================================

#[test_context(TestHarness)]
#[tokio::test]
#[ignore = "requires Docker"]
async fn fetch_outcome_is_recorded(ctx: &mut TestHarness) {
    let source = rss_source("pg feed", "https://pg.example.org/feed");
    sqlx::query(
        "INSERT INTO data_sources (id, name, source_type, url) VALUES ($1, $2, $3, $4)",
    )
    .bind(source.id)
    .bind(&source.name)
    .bind(source.source_type)
    .bind(&source.url)
    .execute(&ctx.db_pool)
    .await
    .unwrap();

    let store = ctx.sources();
    assert!(store
        .find_due_for_fetch(Utc::now())
        .await
        .unwrap()
        .iter()
        .any(|s| s.id == source.id));

    store
        .update_last_fetched(source.id, Utc::now(), Some("HTTP 502"))
        .await
        .unwrap();

    let stored = store
        .find_enabled()
        .await
        .unwrap()
        .into_iter()
        .find(|s| s.id == source.id)
        .unwrap();
    assert_eq!(stored.last_error.as_deref(), Some("HTTP 502"));
    assert!(!store
        .find_due_for_fetch(Utc::now())
        .await
        .unwrap()
        .iter()
        .any(|s| s.id == source.id));
}

#[test_context(TestHarness)]
#[tokio::test]
#[ignore = "requires Docker"]
async fn fetch_interval_is_bounded(ctx: &mut TestHarness) {
    let source = rss_source("forever feed", "https://forever.example.org/feed");
    let inserted = sqlx::query(
        "INSERT INTO data_sources (id, name, source_type, url, fetch_interval_secs) \
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(source.id)
    .bind(&source.name)
    .bind(source.source_type)
    .bind(&source.url)
    .bind(i64::MAX)
    .execute(&ctx.db_pool)
    .await;

    assert!(inserted.is_err());
}
