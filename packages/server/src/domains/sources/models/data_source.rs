use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::common::{CategoryId, DataSourceId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "data_source_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DataSourceType {
    Rss,
    Api,
    Crawl,
}

/// A feed or crawl target that drives ingestion jobs
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, TypedBuilder)]
#[builder(field_defaults(setter(into)))]
pub struct DataSource {
    #[builder(default = DataSourceId::new())]
    pub id: DataSourceId,
    pub name: String,
    pub source_type: DataSourceType,
    pub url: String,
    #[builder(default = true)]
    pub enabled: bool,
    #[builder(default = 3600)]
    pub fetch_interval_secs: i64,
    #[builder(default, setter(strip_option))]
    pub last_fetched_at: Option<DateTime<Utc>>,
    #[builder(default, setter(strip_option))]
    pub last_error: Option<String>,
    #[builder(default, setter(strip_option))]
    pub category_id: Option<CategoryId>,
    #[builder(default = Utc::now())]
    pub created_at: DateTime<Utc>,
    #[builder(default = Utc::now())]
    pub updated_at: DateTime<Utc>,
}

impl DataSource {
    /// Enabled and either never fetched or its interval has elapsed. An
    /// interval too large to represent is never due.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        if !self.enabled {
            return false;
        }
        match self.last_fetched_at {
            None => true,
            Some(last) => Duration::try_seconds(self.fetch_interval_secs.max(0))
                .and_then(|interval| last.checked_add_signed(interval))
                .is_some_and(|due_at| now >= due_at),
        }
    }

    /// Compare feed URLs ignoring a trailing slash and scheme/host case.
    pub fn matches_url(&self, url: &str) -> bool {
        fn normalize(u: &str) -> String {
            let trimmed = u.trim().trim_end_matches('/');
            match trimmed.find("://") {
                Some(idx) => {
                    let (scheme, rest) = trimmed.split_at(idx + 3);
                    let (host, path) = rest.split_at(rest.find('/').unwrap_or(rest.len()));
                    format!("{}{}{}", scheme.to_lowercase(), host.to_lowercase(), path)
                }
                None => trimmed.to_string(),
            }
        }
        normalize(&self.url) == normalize(url)
    }
}
