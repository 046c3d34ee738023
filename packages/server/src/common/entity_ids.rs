//! Typed ID definitions for all domain entities.

pub use super::id::Id;

// ============================================================================
// Entity marker types
// ============================================================================

/// Marker type for Article entities (ingested or generated content).
pub struct Article;

/// Marker type for Category entities.
pub struct Category;

/// Marker type for DataSource entities (feeds, crawl targets).
pub struct DataSource;

/// Marker type for queued jobs.
pub struct QueuedJob;

// ============================================================================
// Type aliases - the primary API
// ============================================================================

pub type ArticleId = Id<Article>;

pub type CategoryId = Id<Category>;

pub type DataSourceId = Id<DataSource>;

pub type JobId = Id<QueuedJob>;
