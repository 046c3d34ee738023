//! Enqueue any background job from the command line.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use insight_core::common::CategoryId;
use insight_core::kernel::jobs::{
    enqueue_payload, ClassifyPayload, ContentGeneratePayload, EmbeddingPayload, JobPayload,
    JobQueue, PostgresJobQueue, QueueLane, RssSyncPayload, WebCrawlPayload,
};
use insight_core::Config;
use sqlx::PgPool;

#[derive(Parser)]
#[command(name = "enqueue_cli")]
#[command(about = "Enqueue background jobs")]
struct Cli {
    /// Queue lane: critical, default or low
    #[arg(long, global = true, default_value = "default")]
    lane: QueueLane,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync one feed, or every enabled feed when no URL is given
    RssSync {
        #[arg(long)]
        feed_url: Option<String>,
        #[arg(long)]
        category_id: Option<CategoryId>,
    },

    /// Crawl a page
    WebCrawl {
        url: String,
        #[arg(long)]
        category_id: Option<CategoryId>,
        #[arg(long)]
        depth: Option<u32>,
    },

    /// Classify an article
    Classify { article_id: String },

    /// Generate an article's embedding
    Embedding { article_id: String },

    /// Draft an article about a topic
    ContentGenerate {
        topic: String,
        #[arg(long)]
        category_id: Option<CategoryId>,
        #[arg(long)]
        style: Option<String>,
    },

    /// Show a job's status
    Status { job_id: String },

    /// Cancel a pending job
    Cancel { job_id: String },

    /// Show job counts by status
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    let pool = PgPool::connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    let queue = PostgresJobQueue::new(pool);

    let payload: JobPayload = match cli.command {
        Commands::RssSync {
            feed_url,
            category_id,
        } => RssSyncPayload {
            feed_url,
            category_id,
        }
        .into(),
        Commands::WebCrawl {
            url,
            category_id,
            depth,
        } => WebCrawlPayload {
            url,
            category_id,
            depth,
        }
        .into(),
        Commands::Classify { article_id } => ClassifyPayload { article_id }.into(),
        Commands::Embedding { article_id } => EmbeddingPayload { article_id }.into(),
        Commands::ContentGenerate {
            topic,
            category_id,
            style,
        } => ContentGeneratePayload {
            topic,
            category_id,
            style,
        }
        .into(),
        Commands::Status { job_id } => {
            let id = job_id.parse().context("Invalid job id")?;
            let job = queue.find(id).await?.context("Job not found")?;
            println!("{}", serde_json::to_string_pretty(&job)?);
            return Ok(());
        }
        Commands::Cancel { job_id } => {
            let id = job_id.parse().context("Invalid job id")?;
            if queue.cancel(id).await? {
                println!("Cancelled {}", id);
            } else {
                println!("{} is not pending; nothing cancelled", id);
            }
            return Ok(());
        }
        Commands::Stats => {
            let stats = queue.counts_by_status().await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
            return Ok(());
        }
    };

    let handle = enqueue_payload(&queue, &payload, cli.lane).await?;
    println!(
        "Enqueued {} ({}) on lane {}",
        handle.id, handle.kind, handle.lane
    );
    Ok(())
}
