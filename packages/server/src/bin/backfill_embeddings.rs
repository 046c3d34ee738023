//! Queue embedding jobs for every article that has no embedding yet.

use anyhow::{Context, Result};
use clap::Parser;
use insight_core::domains::articles::{ArticleStore, PostgresArticleStore};
use insight_core::kernel::jobs::{
    enqueue_payload, EmbeddingPayload, JobPayload, PostgresJobQueue, QueueLane,
};
use insight_core::Config;
use sqlx::PgPool;
use std::collections::HashSet;

#[derive(Parser)]
#[command(name = "backfill_embeddings")]
#[command(about = "Enqueue embedding jobs for articles missing embeddings")]
struct Cli {
    /// Articles fetched per batch
    #[arg(long, default_value_t = 100)]
    batch_size: i64,

    /// Stop after this many articles
    #[arg(long)]
    limit: Option<usize>,

    /// Only print what would be queued
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    let pool = PgPool::connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;

    println!("Connected to database");

    let articles = PostgresArticleStore::new(pool.clone(), config.embedding_dimensions);
    let queue = PostgresJobQueue::new(pool);

    // Jobs run later, so the same articles stay unembedded while we page.
    // Widen the window each round and skip ids already queued.
    let mut seen = HashSet::new();
    let mut window = cli.batch_size.max(1);
    let mut queued = 0usize;

    loop {
        let batch = articles
            .find_without_embedding(window)
            .await
            .context("Failed to find articles without embeddings")?;
        let fetched = batch.len();

        let fresh: Vec<_> = batch
            .into_iter()
            .filter(|a| seen.insert(a.id))
            .collect();
        if fresh.is_empty() {
            break;
        }

        for article in fresh {
            if cli.limit.is_some_and(|limit| queued >= limit) {
                break;
            }
            if cli.dry_run {
                println!("  would queue {} ({})", article.id, article.title);
            } else {
                let payload: JobPayload = EmbeddingPayload {
                    article_id: article.id.to_string(),
                }
                .into();
                let handle = enqueue_payload(&queue, &payload, QueueLane::Low)
                    .await
                    .with_context(|| format!("Failed to enqueue embedding for {}", article.id))?;
                println!("  queued {} for article {}", handle.id, article.id);
            }
            queued += 1;
        }

        if cli.limit.is_some_and(|limit| queued >= limit) || (fetched as i64) < window {
            break;
        }
        window += cli.batch_size.max(1);
    }

    println!("\nQueued {} embedding jobs", queued);
    Ok(())
}
