//! Kernel module - job infrastructure and worker dependencies.

pub mod ai;
pub mod deps;
pub mod feed_fetcher;
pub mod jobs;
pub mod scheduled_tasks;
pub mod simple_scraper;
pub mod test_dependencies;
pub mod traits;

pub use ai::{LlmClassifier, LlmContentGenerator, OpenAiChat};
pub use deps::WorkerDeps;
pub use feed_fetcher::RssFeedFetcher;
pub use scheduled_tasks::{default_schedule, PeriodicScheduler, ScheduleEntry, ScheduleError};
pub use simple_scraper::SimpleScraper;
pub use test_dependencies::TestDependencies;
pub use traits::*;
