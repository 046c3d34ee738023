//! Job kinds and their wire payloads.
//!
//! The kind travels next to the payload (its own column in the jobs table),
//! and the payload is a flat JSON object with named snake_case fields. Both
//! shapes are a compatibility boundary between producers and workers that
//! may be deployed independently: add optional fields, never rename.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::{CodecError, JobError};
use crate::common::CategoryId;

// ============================================================================
// Job kinds
// ============================================================================

/// The closed set of background job kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobKind {
    RssSync,
    WebCrawl,
    Classify,
    Embedding,
    ContentGenerate,
}

impl JobKind {
    pub const ALL: [JobKind; 5] = [
        JobKind::RssSync,
        JobKind::WebCrawl,
        JobKind::Classify,
        JobKind::Embedding,
        JobKind::ContentGenerate,
    ];

    /// Stable wire name stored in the `jobs.kind` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::RssSync => "rss:sync",
            JobKind::WebCrawl => "web:crawl",
            JobKind::Classify => "content:classify",
            JobKind::Embedding => "embedding:generate",
            JobKind::ContentGenerate => "content:generate",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = JobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| JobError::UnknownJobKind(s.to_string()))
    }
}

// ============================================================================
// Payloads
// ============================================================================

/// Sync one feed (when `feed_url` is set) or every enabled RSS source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RssSyncPayload {
    #[serde(default)]
    pub feed_url: Option<String>,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
}

/// Fetch a single page and store it as an article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebCrawlPayload {
    pub url: String,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub depth: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifyPayload {
    pub article_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingPayload {
    pub article_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentGeneratePayload {
    pub topic: String,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub style: Option<String>,
}

/// A job's parameters, tagged by kind.
///
/// Dispatch matches on this enum exhaustively, so adding a kind is a
/// compile error everywhere it is not handled.
#[derive(Debug, Clone, PartialEq)]
pub enum JobPayload {
    RssSync(RssSyncPayload),
    WebCrawl(WebCrawlPayload),
    Classify(ClassifyPayload),
    Embedding(EmbeddingPayload),
    ContentGenerate(ContentGeneratePayload),
}

/// An encoded payload ready for the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedJob {
    pub kind: JobKind,
    pub payload: Vec<u8>,
}

impl JobPayload {
    pub fn kind(&self) -> JobKind {
        match self {
            JobPayload::RssSync(_) => JobKind::RssSync,
            JobPayload::WebCrawl(_) => JobKind::WebCrawl,
            JobPayload::Classify(_) => JobKind::Classify,
            JobPayload::Embedding(_) => JobKind::Embedding,
            JobPayload::ContentGenerate(_) => JobKind::ContentGenerate,
        }
    }

    /// The field that identifies what this job works on, for logs.
    pub fn subject(&self) -> Option<&str> {
        match self {
            JobPayload::RssSync(p) => p.feed_url.as_deref(),
            JobPayload::WebCrawl(p) => Some(&p.url),
            JobPayload::Classify(p) => Some(&p.article_id),
            JobPayload::Embedding(p) => Some(&p.article_id),
            JobPayload::ContentGenerate(p) => Some(&p.topic),
        }
    }

    /// Check required fields. Returns the reason on failure.
    fn validate(&self) -> Result<(), String> {
        match self {
            JobPayload::RssSync(p) => match p.feed_url.as_deref() {
                Some(url) if url.trim().is_empty() => {
                    Err("feed_url must be omitted or non-empty".to_string())
                }
                _ => Ok(()),
            },
            JobPayload::WebCrawl(p) => {
                if p.url.trim().is_empty() {
                    return Err("url is required".to_string());
                }
                match p.depth {
                    Some(0) => Err("depth must be at least 1".to_string()),
                    _ => Ok(()),
                }
            }
            JobPayload::Classify(ClassifyPayload { article_id })
            | JobPayload::Embedding(EmbeddingPayload { article_id }) => {
                if article_id.trim().is_empty() {
                    Err("article_id is required".to_string())
                } else {
                    Ok(())
                }
            }
            JobPayload::ContentGenerate(p) => {
                if p.topic.trim().is_empty() {
                    Err("topic is required".to_string())
                } else {
                    Ok(())
                }
            }
        }
    }

    /// Serialize the payload for the queue.
    pub fn encode(&self) -> Result<EncodedJob, CodecError> {
        let kind = self.kind();
        let encoding = |reason: String| CodecError::Encoding { kind, reason };

        self.validate().map_err(encoding)?;

        let bytes = match self {
            JobPayload::RssSync(p) => serde_json::to_vec(p),
            JobPayload::WebCrawl(p) => serde_json::to_vec(p),
            JobPayload::Classify(p) => serde_json::to_vec(p),
            JobPayload::Embedding(p) => serde_json::to_vec(p),
            JobPayload::ContentGenerate(p) => serde_json::to_vec(p),
        }
        .map_err(|e| encoding(e.to_string()))?;

        Ok(EncodedJob {
            kind,
            payload: bytes,
        })
    }

    /// Reconstruct a payload from its kind and bytes.
    pub fn decode(kind: JobKind, bytes: &[u8]) -> Result<Self, CodecError> {
        let decoding = |reason: String| CodecError::Decoding { kind, reason };

        let payload = match kind {
            JobKind::RssSync => serde_json::from_slice(bytes).map(JobPayload::RssSync),
            JobKind::WebCrawl => serde_json::from_slice(bytes).map(JobPayload::WebCrawl),
            JobKind::Classify => serde_json::from_slice(bytes).map(JobPayload::Classify),
            JobKind::Embedding => serde_json::from_slice(bytes).map(JobPayload::Embedding),
            JobKind::ContentGenerate => {
                serde_json::from_slice(bytes).map(JobPayload::ContentGenerate)
            }
        }
        .map_err(|e| decoding(e.to_string()))?;

        payload.validate().map_err(decoding)?;
        Ok(payload)
    }
}

impl From<RssSyncPayload> for JobPayload {
    fn from(p: RssSyncPayload) -> Self {
        JobPayload::RssSync(p)
    }
}

impl From<WebCrawlPayload> for JobPayload {
    fn from(p: WebCrawlPayload) -> Self {
        JobPayload::WebCrawl(p)
    }
}

impl From<ClassifyPayload> for JobPayload {
    fn from(p: ClassifyPayload) -> Self {
        JobPayload::Classify(p)
    }
}

impl From<EmbeddingPayload> for JobPayload {
    fn from(p: EmbeddingPayload) -> Self {
        JobPayload::Embedding(p)
    }
}

impl From<ContentGeneratePayload> for JobPayload {
    fn from(p: ContentGeneratePayload) -> Self {
        JobPayload::ContentGenerate(p)
    }
}
