//! Sources domain activities - ingestion job handlers

pub mod rss_sync;
pub mod web_crawl;

pub use rss_sync::{sync_rss, sync_source, SourceSyncReport};
pub use web_crawl::crawl_page;
