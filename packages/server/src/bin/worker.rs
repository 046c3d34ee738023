//! Background worker: claims jobs, runs handlers and fires cron schedules.

use std::sync::Arc;

use anyhow::{Context, Result};
use insight_core::kernel::jobs::{
    Dispatcher, JobQueue, JobWorker, JobWorkerConfig, PostgresJobQueue,
};
use insight_core::kernel::{default_schedule, PeriodicScheduler, WorkerDeps};
use insight_core::{init_tracing, Config};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = Config::from_env().context("Failed to load configuration")?;
    let pool = config
        .connect_and_migrate(config.worker_concurrency as u32 + 5)
        .await?;

    let deps = Arc::new(WorkerDeps::from_config(&config, pool.clone())?);
    let queue: Arc<dyn JobQueue> = Arc::new(PostgresJobQueue::new(pool));

    // Scheduler
    let scheduler = match &config.source_sweep_cron {
        Some(cron) => PeriodicScheduler::with_source_sweep(queue.clone(), deps.sources.clone(), cron)
            .context("Invalid SOURCE_SWEEP_CRON")?,
        None => PeriodicScheduler::new(queue.clone()),
    };
    let registered = scheduler.register_all(default_schedule(&config.rss_sync_cron));
    tracing::info!(registered, "schedules registered");
    scheduler.start().await.context("Failed to start scheduler")?;

    // Worker
    let worker_config = JobWorkerConfig::default()
        .concurrency(config.worker_concurrency)
        .poll_interval(config.worker_poll_interval);
    let worker = Arc::new(JobWorker::new(
        queue,
        Dispatcher::new(deps),
        worker_config,
    ));

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("Shutdown signal received");
        signal.cancel();
    });

    worker.run(shutdown).await?;

    if let Err(e) = scheduler.stop().await {
        tracing::warn!(error = %e, "scheduler did not stop cleanly");
    }

    Ok(())
}
