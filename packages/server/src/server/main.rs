// HTTP API: task producers, task status and similarity search

use std::sync::Arc;

use anyhow::{Context, Result};
use insight_core::domains::articles::PostgresArticleStore;
use insight_core::kernel::jobs::PostgresJobQueue;
use insight_core::server::{build_app, AppState};
use insight_core::{init_tracing, Config};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = Config::from_env().context("Failed to load configuration")?;
    let pool = config.connect_and_migrate(10).await?;

    let state = AppState::new(
        Arc::new(PostgresJobQueue::new(pool.clone())),
        Arc::new(PostgresArticleStore::new(pool, config.embedding_dimensions)),
    );

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(%addr, "Web3 Insight API listening");

    axum::serve(listener, build_app(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received, draining connections");
        })
        .await
        .context("Server error")?;

    Ok(())
}
