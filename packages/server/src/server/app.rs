//! Application setup and server configuration.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::{header::CONTENT_TYPE, Method, StatusCode},
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::domains::articles::ArticleStore;
use crate::kernel::jobs::JobQueue;
use crate::server::routes::{
    cancel_task, enqueue_classify_task, enqueue_content_generate_task, enqueue_embedding_task,
    enqueue_rss_sync_task, enqueue_web_crawl_task, find_similar_articles, get_task,
    health_handler, related_articles, task_stats,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub queue: Arc<dyn JobQueue>,
    pub articles: Arc<dyn ArticleStore>,
}

impl AppState {
    pub fn new(queue: Arc<dyn JobQueue>, articles: Arc<dyn ArticleStore>) -> Self {
        Self { queue, articles }
    }
}

/// Build the Axum application router
pub fn build_app(state: AppState) -> Router {
    // CORS configuration - allow any origin for development
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health_handler))
        // Task producers
        .route("/api/tasks/rss-sync", post(enqueue_rss_sync_task))
        .route("/api/tasks/web-crawl", post(enqueue_web_crawl_task))
        .route("/api/tasks/classify", post(enqueue_classify_task))
        .route("/api/tasks/embedding", post(enqueue_embedding_task))
        .route(
            "/api/tasks/content-generate",
            post(enqueue_content_generate_task),
        )
        // Task status
        .route("/api/tasks/stats", get(task_stats))
        .route("/api/tasks/:id", get(get_task))
        .route("/api/tasks/:id/cancel", post(cancel_task))
        // Similarity search
        .route("/api/articles/similar", post(find_similar_articles))
        .route("/api/articles/:id/related", get(related_articles))
        .layer(cors)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            REQUEST_TIMEOUT,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
