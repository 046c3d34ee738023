use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::models::{DataSource, DataSourceType};
use crate::common::DataSourceId;

/// Read access to configured sources, plus fetch bookkeeping.
#[async_trait]
pub trait DataSourceStore: Send + Sync {
    async fn find_by_type(&self, source_type: DataSourceType) -> Result<Vec<DataSource>>;

    async fn find_enabled(&self) -> Result<Vec<DataSource>>;

    /// Enabled sources whose fetch interval has elapsed at `now`.
    async fn find_due_for_fetch(&self, now: DateTime<Utc>) -> Result<Vec<DataSource>>;

    /// Record a fetch attempt. `error` replaces `last_error`; `None` clears it.
    async fn update_last_fetched(
        &self,
        id: DataSourceId,
        at: DateTime<Utc>,
        error: Option<&str>,
    ) -> Result<()>;
}
