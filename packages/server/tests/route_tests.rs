//! HTTP surface tests against the in-memory harness.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use common::*;
use insight_core::common::JobId;
use insight_core::kernel::jobs::{JobKind, JobStatus, QueueLane};
use serde_json::{json, Value};
use tower::ServiceExt;

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

// =============================================================================
// Tasks
// =============================================================================

#[tokio::test]
async fn enqueue_endpoints_pick_lanes() {
    let harness = MemoryHarness::new();

    let (status, body) = send(
        harness.router(),
        post_json("/api/tasks/web-crawl", json!({"url": "https://docs.example.org"})),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["kind"], "web:crawl");
    assert_eq!(body["lane"], "default");

    let (_, body) = send(
        harness.router(),
        post_json("/api/tasks/classify", json!({"article_id": "abc"})),
    )
    .await;
    assert_eq!(body["lane"], "critical");

    let (_, body) = send(
        harness.router(),
        post_json("/api/tasks/content-generate", json!({"topic": "Staking"})),
    )
    .await;
    assert_eq!(body["lane"], "low");

    assert_eq!(harness.queue.jobs_in_lane(QueueLane::Critical).len(), 1);
    assert_eq!(harness.queue.jobs_in_lane(QueueLane::Low).len(), 1);
    assert_eq!(harness.queue.jobs().len(), 3);
}

#[tokio::test]
async fn enqueue_with_missing_field_is_rejected() {
    let harness = MemoryHarness::new();

    let (status, _) = send(
        harness.router(),
        post_json("/api/tasks/web-crawl", json!({"depth": 2})),
    )
    .await;

    assert!(status.is_client_error());
    assert!(harness.queue.jobs().is_empty());
}

#[tokio::test]
async fn enqueue_with_empty_required_field_is_bad_request() {
    let harness = MemoryHarness::new();

    let (status, body) = send(
        harness.router(),
        post_json("/api/tasks/embedding", json!({"article_id": ""})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("article_id"));
    assert!(harness.queue.jobs().is_empty());
}

#[tokio::test]
async fn enqueue_while_queue_is_down_is_unavailable() {
    let harness = MemoryHarness::new();
    harness.queue.set_unavailable(true);

    let (status, body) = send(
        harness.router(),
        post_json("/api/tasks/rss-sync", json!({})),
    )
    .await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn task_status_reports_progress() {
    let harness = MemoryHarness::new();

    let (_, handle) = send(
        harness.router(),
        post_json("/api/tasks/content-generate", json!({"topic": "Oracles"})),
    )
    .await;
    let id = handle["id"].as_str().unwrap().to_string();

    let (status, body) = send(harness.router(), get(&format!("/api/tasks/{}", id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "pending");
    assert_eq!(body["kind"], JobKind::ContentGenerate.as_str());
    assert_eq!(body["subject"], "Oracles");

    harness.drain().await;

    let (_, body) = send(harness.router(), get(&format!("/api/tasks/{}", id))).await;
    assert_eq!(body["status"], "succeeded");
    assert_eq!(body["attempts"], 1);
}

#[tokio::test]
async fn task_status_for_unknown_or_bad_id() {
    let harness = MemoryHarness::new();

    let (status, _) = send(
        harness.router(),
        get(&format!("/api/tasks/{}", JobId::new())),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(harness.router(), get("/api/tasks/not-a-uuid")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn cancel_only_succeeds_for_pending_tasks() {
    let harness = MemoryHarness::new();

    let (_, handle) = send(
        harness.router(),
        post_json("/api/tasks/content-generate", json!({"topic": "Oracles"})),
    )
    .await;
    let id = handle["id"].as_str().unwrap().to_string();
    let uri = format!("/api/tasks/{}/cancel", id);

    let (status, body) = send(harness.router(), Request::post(&uri).body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cancelled"], true);
    assert_eq!(body["status"], "cancelled");

    // Cancelled jobs are never claimed
    assert_eq!(harness.drain().await, 0);

    let (status, body) = send(harness.router(), Request::post(&uri).body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["cancelled"], false);
}

#[tokio::test]
async fn stats_count_jobs_by_status() {
    let harness = MemoryHarness::new();
    for topic in ["Oracles", "Sequencers"] {
        send(
            harness.router(),
            post_json("/api/tasks/content-generate", json!({"topic": topic})),
        )
        .await;
    }
    send(
        harness.router(),
        post_json("/api/tasks/classify", json!({"article_id": "nope"})),
    )
    .await;
    harness.drain().await;

    let (status, body) = send(harness.router(), get("/api/tasks/stats")).await;
    assert_eq!(status, StatusCode::OK);
    // two drafts, their two embeddings, one permanently failed classify
    assert_eq!(body["succeeded"], 4);
    assert_eq!(body["failed"], 1);
    assert_eq!(body["pending"], 0);
    assert_eq!(
        harness
            .queue
            .jobs()
            .iter()
            .filter(|j| j.status == JobStatus::Failed)
            .count(),
        1
    );
}

#[tokio::test]
async fn health_follows_queue_availability() {
    let harness = MemoryHarness::new();

    let (status, body) = send(harness.router(), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    harness.queue.set_unavailable(true);
    let (status, body) = send(harness.router(), get("/health")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["queue"]["status"], "error");
}

// =============================================================================
// Similarity search
// =============================================================================

#[tokio::test]
async fn similar_articles_are_nearest_first() {
    let harness = MemoryHarness::new();
    let dims = harness.dimensions();
    let articles = harness.deps.articles.as_ref();
    let near = seed_article(articles, "Rollups", Some(axis_vector(dims, 0, 0.1))).await;
    let far = seed_article(articles, "NFTs", Some(axis_vector(dims, 3, 0.0))).await;

    let (status, body) = send(
        harness.router(),
        post_json(
            "/api/articles/similar",
            json!({"embedding": axis_vector(dims, 0, 0.0), "limit": 5}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let hits = body.as_array().unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0]["id"], near.id.to_string());
    assert_eq!(hits[1]["id"], far.id.to_string());
    assert!(hits[0]["distance"].as_f64().unwrap() < hits[1]["distance"].as_f64().unwrap());
}

#[tokio::test]
async fn similar_with_wrong_dimension_is_bad_request() {
    let harness = MemoryHarness::new();

    let (status, body) = send(
        harness.router(),
        post_json("/api/articles/similar", json!({"embedding": [0.1, 0.2]})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("dimensions"));
}

#[tokio::test]
async fn related_articles_exclude_seed() {
    let harness = MemoryHarness::new();
    let dims = harness.dimensions();
    let articles = harness.deps.articles.as_ref();
    let seed = seed_article(articles, "Rollups", Some(axis_vector(dims, 0, 0.0))).await;
    let other = seed_article(articles, "Validiums", Some(axis_vector(dims, 0, 0.5))).await;

    let (status, body) = send(
        harness.router(),
        get(&format!("/api/articles/{}/related?limit=3", seed.id)),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let hits = body.as_array().unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0]["id"], other.id.to_string());

    let (status, _) = send(
        harness.router(),
        get(&format!("/api/articles/{}/related", insight_core::common::ArticleId::new())),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
