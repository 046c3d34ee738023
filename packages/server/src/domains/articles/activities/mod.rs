//! Articles domain activities - job handlers that enrich stored articles
//!
//! Activities take the decoded payload plus the worker's dependencies,
//! handle id parsing, and return the follow-on jobs they want enqueued.

pub mod classify;
pub mod embed;
pub mod generate;

use crate::common::ArticleId;
use crate::kernel::jobs::JobError;

pub use classify::classify_article;
pub use embed::embed_article;
pub use generate::generate_content;

/// Parse an article id from a payload field.
pub(crate) fn parse_article_id(raw: &str) -> Result<ArticleId, JobError> {
    ArticleId::parse(raw.trim()).map_err(|e| JobError::InvalidId {
        id: raw.to_string(),
        reason: e.to_string(),
    })
}
