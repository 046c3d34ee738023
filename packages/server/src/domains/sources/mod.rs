//! Sources domain - RSS feeds and crawl targets that drive ingestion

pub mod activities;
mod memory;
pub mod models;
mod postgres;
mod store;

pub use memory::MemoryDataSourceStore;
pub use models::{DataSource, DataSourceType};
pub use postgres::PostgresDataSourceStore;
pub use store::DataSourceStore;
