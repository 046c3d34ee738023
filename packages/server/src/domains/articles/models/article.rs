use chrono::{DateTime, Utc};
use pgvector::Vector;
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::common::{ArticleId, CategoryId, DataSourceId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "article_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ArticleStatus {
    #[default]
    Draft,
    Published,
    Archived,
}

/// Article - ingested from a feed or page, or generated from a topic
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Article {
    pub id: ArticleId,

    // Content
    pub title: String,
    pub content: String,
    pub summary: Option<String>,

    // Classification
    pub category_id: Option<CategoryId>,
    pub tags: Vec<String>,

    /// Absent until the embedding job runs. Never a zero vector.
    #[serde(skip)]
    pub embedding: Option<Vector>,

    pub status: ArticleStatus,

    // Provenance
    pub source_url: Option<String>,
    pub source_urls: Vec<String>,
    pub data_source_id: Option<DataSourceId>,

    pub view_count: i64,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Article {
    pub fn has_embedding(&self) -> bool {
        self.embedding.is_some()
    }

    pub fn embedding_slice(&self) -> Option<&[f32]> {
        self.embedding.as_ref().map(|v| v.as_slice())
    }

    /// Text the embedding is computed from.
    pub fn embedding_text(&self) -> String {
        match &self.summary {
            Some(summary) if !summary.trim().is_empty() => {
                format!("{}\n\n{}\n\n{}", self.title, summary, self.content)
            }
            _ => format!("{}\n\n{}", self.title, self.content),
        }
    }
}

/// Input for creating an article
#[derive(Debug, Clone, TypedBuilder)]
#[builder(field_defaults(setter(into)))]
pub struct NewArticle {
    pub title: String,
    pub content: String,
    #[builder(default, setter(strip_option))]
    pub summary: Option<String>,
    #[builder(default, setter(strip_option))]
    pub category_id: Option<CategoryId>,
    #[builder(default)]
    pub tags: Vec<String>,
    #[builder(default)]
    pub status: ArticleStatus,
    #[builder(default, setter(strip_option))]
    pub source_url: Option<String>,
    #[builder(default, setter(strip_option))]
    pub data_source_id: Option<DataSourceId>,
    #[builder(default, setter(strip_option))]
    pub published_at: Option<DateTime<Utc>>,
}

impl NewArticle {
    /// Row for a fresh insert.
    pub fn into_article(self) -> Article {
        let now = Utc::now();
        let source_urls = self.source_url.iter().cloned().collect();
        Article {
            id: ArticleId::new(),
            title: self.title,
            content: self.content,
            summary: self.summary,
            category_id: self.category_id,
            tags: self.tags,
            embedding: None,
            status: self.status,
            source_url: self.source_url,
            source_urls,
            data_source_id: self.data_source_id,
            view_count: 0,
            published_at: self.published_at,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default)]
pub struct ArticleUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub summary: Option<String>,
    pub status: Option<ArticleStatus>,
}

impl ArticleUpdate {
    /// Whether applying this to `article` rewrites its text.
    pub fn changes_text(&self, article: &Article) -> bool {
        self.title.as_deref().is_some_and(|t| t != article.title)
            || self.content.as_deref().is_some_and(|c| c != article.content)
    }
}

/// Snapshot of an article's text before an edit.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ArticleVersion {
    pub id: uuid::Uuid,
    pub article_id: ArticleId,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub description: Option<String>,
}
