//! Test fixtures for creating test data.

use insight_core::domains::articles::{Article, ArticleStatus, ArticleStore, NewArticle};
use insight_core::domains::sources::{DataSource, DataSourceType};

/// A unit-ish vector pointing mostly along `axis`.
pub fn axis_vector(dims: usize, axis: usize, tilt: f32) -> Vec<f32> {
    (0..dims)
        .map(|i| {
            if i == axis {
                1.0
            } else if i == (axis + 1) % dims {
                tilt
            } else {
                0.0
            }
        })
        .collect()
}

/// Create a published article, optionally with an embedding.
pub async fn seed_article(
    store: &dyn ArticleStore,
    title: &str,
    embedding: Option<Vec<f32>>,
) -> Article {
    let article = store
        .create(
            NewArticle::builder()
                .title(title)
                .content(format!("{} body", title))
                .status(ArticleStatus::Published)
                .build(),
        )
        .await
        .expect("create article");

    if let Some(embedding) = embedding {
        assert!(store
            .update_embedding(article.id, &embedding)
            .await
            .expect("store embedding"));
    }

    store
        .get_by_id(article.id)
        .await
        .expect("reload article")
        .expect("article exists")
}

pub fn rss_source(name: &str, url: &str) -> DataSource {
    DataSource::builder()
        .name(name)
        .source_type(DataSourceType::Rss)
        .url(url)
        .build()
}

pub fn crawl_source(name: &str, url: &str) -> DataSource {
    DataSource::builder()
        .name(name)
        .source_type(DataSourceType::Crawl)
        .url(url)
        .build()
}
