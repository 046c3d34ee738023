//! Scheduled background tasks using tokio-cron-scheduler.
//!
//! This module provides periodic tasks that run on schedules:
//! - Periodic RSS sync of every enabled feed
//! - An optional sweep that queues fetches for sources whose interval elapsed
//!
//! # Architecture
//!
//! Scheduled tasks never do work themselves. Each fire encodes its job
//! template and enqueues it, and the worker picks it up like any other job.
//!
//! ```text
//! Scheduler (cron)
//!     │
//!     ├─► tick("rss-sync")      ─► enqueue RssSync { feed_url: None }
//!     └─► tick("source-sweep")  ─► find_due_for_fetch(now)
//!             └─► for each source → enqueue RssSync(url) / WebCrawl(url)
//! ```
//!
//! States: `Stopped --start--> Running --stop--> Stopped`. Ticks while
//! stopped enqueue nothing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use chrono::Utc;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job as CronJob, JobScheduler, JobSchedulerError};
use tracing::{debug, error, info, warn};

use crate::domains::sources::{DataSourceStore, DataSourceType};
use crate::kernel::jobs::{
    EncodedJob, JobHandle, JobPayload, JobQueue, QueueError, QueueLane, RssSyncPayload,
    WebCrawlPayload,
};

/// Name of the built-in due-source sweep entry.
pub const SOURCE_SWEEP: &str = "source-sweep";

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("cannot register schedule {name:?}: {reason}")]
    Registration { name: String, reason: String },

    #[error("scheduler is already running")]
    AlreadyRunning,

    #[error("scheduler is not running")]
    NotRunning,

    #[error("scheduler error: {0:?}")]
    Scheduler(#[from] JobSchedulerError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// A named cron entry that enqueues one job per fire.
#[derive(Debug, Clone)]
pub struct ScheduleEntry {
    pub name: String,
    pub cron: String,
    pub template: JobPayload,
    pub lane: QueueLane,
}

impl ScheduleEntry {
    pub fn new(
        name: impl Into<String>,
        cron: impl Into<String>,
        template: impl Into<JobPayload>,
        lane: QueueLane,
    ) -> Self {
        Self {
            name: name.into(),
            cron: cron.into(),
            template: template.into(),
            lane,
        }
    }
}

/// The built-in schedule: sync every enabled feed on `rss_sync_cron`.
pub fn default_schedule(rss_sync_cron: &str) -> Vec<ScheduleEntry> {
    vec![ScheduleEntry::new(
        "rss-sync",
        rss_sync_cron,
        RssSyncPayload::default(),
        QueueLane::Default,
    )]
}

enum Action {
    Enqueue { job: EncodedJob, lane: QueueLane },
    SweepDueSources,
}

struct Registered {
    name: String,
    cron: String,
    action: Action,
}

struct Shared {
    queue: Arc<dyn JobQueue>,
    sources: Option<Arc<dyn DataSourceStore>>,
    entries: RwLock<Vec<Registered>>,
    running: AtomicBool,
}

/// Cron-driven producer of jobs.
pub struct PeriodicScheduler {
    shared: Arc<Shared>,
    cron: Mutex<Option<JobScheduler>>,
}

impl PeriodicScheduler {
    pub fn new(queue: Arc<dyn JobQueue>) -> Self {
        Self {
            shared: Arc::new(Shared {
                queue,
                sources: None,
                entries: RwLock::new(Vec::new()),
                running: AtomicBool::new(false),
            }),
            cron: Mutex::new(None),
        }
    }

    /// Add the due-source sweep on `cron`.
    pub fn with_source_sweep(
        queue: Arc<dyn JobQueue>,
        sources: Arc<dyn DataSourceStore>,
        cron: &str,
    ) -> Result<Self, ScheduleError> {
        let scheduler = Self {
            shared: Arc::new(Shared {
                queue,
                sources: Some(sources),
                entries: RwLock::new(Vec::new()),
                running: AtomicBool::new(false),
            }),
            cron: Mutex::new(None),
        };
        scheduler.insert(SOURCE_SWEEP, cron, Action::SweepDueSources)?;
        Ok(scheduler)
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Names of all registered entries, in registration order.
    pub fn entry_names(&self) -> Vec<String> {
        self.shared
            .entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|e| e.name.clone())
            .collect()
    }

    /// Validate and add one entry. Only allowed while stopped.
    pub fn register(&self, entry: ScheduleEntry) -> Result<(), ScheduleError> {
        let job = entry
            .template
            .encode()
            .map_err(|e| ScheduleError::Registration {
                name: entry.name.clone(),
                reason: e.to_string(),
            })?;
        self.insert(
            &entry.name,
            &entry.cron,
            Action::Enqueue {
                job,
                lane: entry.lane,
            },
        )?;
        info!(name = %entry.name, cron = %entry.cron, kind = %entry.template.kind(), "schedule registered");
        Ok(())
    }

    /// Register every entry, logging and skipping the ones that fail.
    /// Returns how many were registered.
    pub fn register_all(&self, entries: impl IntoIterator<Item = ScheduleEntry>) -> usize {
        let mut registered = 0;
        for entry in entries {
            let name = entry.name.clone();
            match self.register(entry) {
                Ok(()) => registered += 1,
                Err(e) => warn!(name = %name, error = %e, "skipping schedule entry"),
            }
        }
        registered
    }

    fn insert(&self, name: &str, cron: &str, action: Action) -> Result<(), ScheduleError> {
        if self.is_running() {
            return Err(ScheduleError::AlreadyRunning);
        }
        validate_cron(name, cron)?;

        let mut entries = self
            .shared
            .entries
            .write()
            .unwrap_or_else(|e| e.into_inner());
        if entries.iter().any(|e| e.name == name) {
            return Err(ScheduleError::Registration {
                name: name.to_string(),
                reason: "name already registered".to_string(),
            });
        }
        entries.push(Registered {
            name: name.to_string(),
            cron: cron.to_string(),
            action,
        });
        Ok(())
    }

    /// Start firing entries.
    pub async fn start(&self) -> Result<(), ScheduleError> {
        let mut slot = self.cron.lock().await;
        if slot.is_some() || self.is_running() {
            return Err(ScheduleError::AlreadyRunning);
        }

        let scheduler = JobScheduler::new().await?;
        let schedules: Vec<(String, String)> = self
            .shared
            .entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|e| (e.name.clone(), e.cron.clone()))
            .collect();

        for (name, cron) in &schedules {
            let shared = Arc::clone(&self.shared);
            let name = name.clone();
            let job = CronJob::new_async(cron.as_str(), move |_uuid, _lock| {
                let shared = Arc::clone(&shared);
                let name = name.clone();
                Box::pin(async move {
                    if let Err(e) = shared.tick(&name).await {
                        error!(name = %name, error = %e, "scheduled task failed");
                    }
                })
            })?;
            scheduler.add(job).await?;
        }

        // Running before the first fire so an immediate tick is not dropped
        self.shared.running.store(true, Ordering::SeqCst);
        if let Err(e) = scheduler.start().await {
            self.shared.running.store(false, Ordering::SeqCst);
            return Err(e.into());
        }
        *slot = Some(scheduler);

        info!(entries = schedules.len(), "scheduler started");
        Ok(())
    }

    /// Stop firing entries. In-flight ticks may still finish.
    pub async fn stop(&self) -> Result<(), ScheduleError> {
        let mut slot = self.cron.lock().await;
        let Some(mut scheduler) = slot.take() else {
            return Err(ScheduleError::NotRunning);
        };
        self.shared.running.store(false, Ordering::SeqCst);
        scheduler.shutdown().await?;
        info!("scheduler stopped");
        Ok(())
    }

    /// Run one fire of `name`. Enqueues nothing while stopped.
    pub async fn tick(&self, name: &str) -> Result<Vec<JobHandle>, ScheduleError> {
        self.shared.tick(name).await
    }

    /// Enqueue a fetch for every source whose interval has elapsed.
    pub async fn sweep_due_sources(&self) -> Result<Vec<JobHandle>, ScheduleError> {
        self.shared.sweep_due_sources().await
    }
}

impl Shared {
    async fn tick(&self, name: &str) -> Result<Vec<JobHandle>, ScheduleError> {
        if !self.running.load(Ordering::SeqCst) {
            debug!(name = %name, "tick while stopped, ignoring");
            return Ok(Vec::new());
        }

        // Copy what the tick needs so the lock is not held across awaits
        let planned = {
            let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
            let entry = entries
                .iter()
                .find(|e| e.name == name)
                .ok_or_else(|| ScheduleError::Registration {
                    name: name.to_string(),
                    reason: "no such schedule".to_string(),
                })?;
            match &entry.action {
                Action::Enqueue { job, lane } => Some((job.clone(), *lane)),
                Action::SweepDueSources => None,
            }
        };

        match planned {
            Some((job, lane)) => {
                let handle = self.queue.enqueue(job, lane).await?;
                info!(name = %name, job_id = %handle.id, kind = %handle.kind, "scheduled job enqueued");
                Ok(vec![handle])
            }
            None => self.sweep_due_sources().await,
        }
    }

    async fn sweep_due_sources(&self) -> Result<Vec<JobHandle>, ScheduleError> {
        let Some(sources) = &self.sources else {
            return Ok(Vec::new());
        };

        let due = sources.find_due_for_fetch(Utc::now()).await?;
        if due.is_empty() {
            debug!("no sources due for fetch");
            return Ok(Vec::new());
        }

        let mut handles = Vec::with_capacity(due.len());
        for source in due {
            let payload: JobPayload = match source.source_type {
                DataSourceType::Rss => RssSyncPayload {
                    feed_url: Some(source.url.clone()),
                    category_id: source.category_id,
                }
                .into(),
                DataSourceType::Crawl => WebCrawlPayload {
                    url: source.url.clone(),
                    category_id: source.category_id,
                    depth: None,
                }
                .into(),
                DataSourceType::Api => {
                    debug!(source = %source.name, "api sources are not fetched by the sweep");
                    continue;
                }
            };

            let job = match payload.encode() {
                Ok(job) => job,
                Err(e) => {
                    warn!(source = %source.name, error = %e, "skipping source with invalid url");
                    continue;
                }
            };
            let handle = self.queue.enqueue(job, QueueLane::Default).await?;
            info!(
                source = %source.name,
                job_id = %handle.id,
                kind = %handle.kind,
                "queued fetch for due source"
            );
            handles.push(handle);
        }

        Ok(handles)
    }
}

/// Build a throwaway cron job to check the expression parses.
fn validate_cron(name: &str, cron: &str) -> Result<(), ScheduleError> {
    CronJob::new_async(cron, |_uuid, _lock| Box::pin(async {}))
        .map(|_| ())
        .map_err(|e| ScheduleError::Registration {
            name: name.to_string(),
            reason: format!("invalid cron expression {:?}: {:?}", cron, e),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::sources::{DataSource, MemoryDataSourceStore};
    use crate::kernel::jobs::{JobKind, MemoryJobQueue, WebCrawlPayload};

    fn entry(name: &str, cron: &str) -> ScheduleEntry {
        ScheduleEntry::new(name, cron, RssSyncPayload::default(), QueueLane::Default)
    }

    #[tokio::test]
    async fn test_bad_cron_is_rejected() {
        let scheduler = PeriodicScheduler::new(Arc::new(MemoryJobQueue::new()));
        let err = scheduler.register(entry("broken", "every tuesday")).unwrap_err();
        assert!(matches!(err, ScheduleError::Registration { .. }));
        assert!(scheduler.entry_names().is_empty());
    }

    #[tokio::test]
    async fn test_bad_template_is_rejected() {
        let scheduler = PeriodicScheduler::new(Arc::new(MemoryJobQueue::new()));
        let bad = ScheduleEntry::new(
            "crawl",
            "0 0 * * * *",
            WebCrawlPayload {
                url: String::new(),
                category_id: None,
                depth: None,
            },
            QueueLane::Default,
        );
        assert!(matches!(
            scheduler.register(bad),
            Err(ScheduleError::Registration { .. })
        ));
    }

    #[tokio::test]
    async fn test_register_all_skips_failures() {
        let scheduler = PeriodicScheduler::new(Arc::new(MemoryJobQueue::new()));
        let registered = scheduler.register_all(vec![
            entry("a", "0 0 * * * *"),
            entry("b", "nope"),
            entry("c", "0 */5 * * * *"),
        ]);
        assert_eq!(registered, 2);
        assert_eq!(scheduler.entry_names(), vec!["a", "c"]);
    }

    #[tokio::test]
    async fn test_tick_only_enqueues_while_running() {
        let queue = MemoryJobQueue::new();
        let scheduler = PeriodicScheduler::new(Arc::new(queue.clone()));
        scheduler.register(entry("rss-sync", "0 0 0 1 1 *")).unwrap();

        assert!(scheduler.tick("rss-sync").await.unwrap().is_empty());
        assert!(queue.jobs().is_empty());

        scheduler.start().await.unwrap();
        let handles = scheduler.tick("rss-sync").await.unwrap();
        assert_eq!(handles.len(), 1);
        assert_eq!(handles[0].kind, JobKind::RssSync.as_str());

        scheduler.stop().await.unwrap();
        assert!(scheduler.tick("rss-sync").await.unwrap().is_empty());
        assert_eq!(queue.jobs().len(), 1);
    }

    #[tokio::test]
    async fn test_state_transitions() {
        let scheduler = PeriodicScheduler::new(Arc::new(MemoryJobQueue::new()));
        assert!(matches!(scheduler.stop().await, Err(ScheduleError::NotRunning)));

        scheduler.start().await.unwrap();
        assert!(scheduler.is_running());
        assert!(matches!(
            scheduler.start().await,
            Err(ScheduleError::AlreadyRunning)
        ));
        assert!(matches!(
            scheduler.register(entry("late", "0 0 * * * *")),
            Err(ScheduleError::AlreadyRunning)
        ));

        scheduler.stop().await.unwrap();
        assert!(!scheduler.is_running());
    }

    #[tokio::test]
    async fn test_sweep_enqueues_due_sources() {
        let queue = MemoryJobQueue::new();
        let sources = MemoryDataSourceStore::new();
        let defi = crate::common::CategoryId::new();
        sources.insert(
            DataSource::builder()
                .name("feed")
                .source_type(DataSourceType::Rss)
                .url("https://blog.example.org/feed")
                .category_id(defi)
                .build(),
        );
        sources.insert(
            DataSource::builder()
                .name("docs")
                .source_type(DataSourceType::Crawl)
                .url("https://docs.example.org")
                .build(),
        );
        sources.insert(
            DataSource::builder()
                .name("off")
                .source_type(DataSourceType::Rss)
                .url("https://off.example.org/feed")
                .enabled(false)
                .build(),
        );

        let scheduler = PeriodicScheduler::with_source_sweep(
            Arc::new(queue.clone()),
            Arc::new(sources),
            "0 */10 * * * *",
        )
        .unwrap();

        let handles = scheduler.sweep_due_sources().await.unwrap();
        assert_eq!(handles.len(), 2);

        let payloads = queue.payloads();
        assert!(payloads.iter().any(|(p, _)| *p
            == JobPayload::RssSync(RssSyncPayload {
                feed_url: Some("https://blog.example.org/feed".to_string()),
                category_id: Some(defi),
            })));
        assert!(payloads
            .iter()
            .any(|(p, _)| matches!(p, JobPayload::WebCrawl(c) if c.url == "https://docs.example.org")));
    }

    #[test]
    fn test_default_schedule() {
        let entries = default_schedule("0 0 * * * *");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].template, JobPayload::RssSync(RssSyncPayload::default()));
    }
}
