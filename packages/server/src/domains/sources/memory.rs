use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::models::{DataSource, DataSourceType};
use super::store::DataSourceStore;
use crate::common::DataSourceId;

#[derive(Clone, Default)]
pub struct MemoryDataSourceStore {
    sources: Arc<Mutex<Vec<DataSource>>>,
}

impl MemoryDataSourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, source: DataSource) -> DataSource {
        self.lock().push(source.clone());
        source
    }

    pub fn get(&self, id: DataSourceId) -> Option<DataSource> {
        self.lock().iter().find(|s| s.id == id).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<DataSource>> {
        self.sources.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl DataSourceStore for MemoryDataSourceStore {
    async fn find_by_type(&self, source_type: DataSourceType) -> Result<Vec<DataSource>> {
        Ok(self
            .lock()
            .iter()
            .filter(|s| s.source_type == source_type)
            .cloned()
            .collect())
    }

    async fn find_enabled(&self) -> Result<Vec<DataSource>> {
        Ok(self.lock().iter().filter(|s| s.enabled).cloned().collect())
    }

    async fn find_due_for_fetch(&self, now: DateTime<Utc>) -> Result<Vec<DataSource>> {
        Ok(self
            .lock()
            .iter()
            .filter(|s| s.is_due(now))
            .cloned()
            .collect())
    }

    async fn update_last_fetched(
        &self,
        id: DataSourceId,
        at: DateTime<Utc>,
        error: Option<&str>,
    ) -> Result<()> {
        let mut sources = self.lock();
        let source = sources
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| anyhow::anyhow!("data source {} not found", id))?;
        source.last_fetched_at = Some(at);
        source.last_error = error.map(ToOwned::to_owned);
        source.updated_at = Utc::now();
        Ok(())
    }
}
