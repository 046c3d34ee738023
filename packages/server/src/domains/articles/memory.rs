use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use pgvector::Vector;

use super::models::{
    Article, ArticleUpdate, ArticleVersion, Category, NewArticle, SearchError, SimilarityQuery,
};
use super::store::{check_embedding, ArticleStore};
use crate::common::utils::cosine_distance;
use crate::common::{ArticleId, CategoryId};

#[derive(Default)]
struct State {
    articles: Vec<Article>,
    versions: HashMap<ArticleId, Vec<ArticleVersion>>,
    categories: Vec<Category>,
}

/// In-memory article store with brute-force cosine search.
#[derive(Clone)]
pub struct MemoryArticleStore {
    state: Arc<Mutex<State>>,
    dimensions: usize,
}

impl MemoryArticleStore {
    pub fn new(dimensions: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
            dimensions,
        }
    }

    pub fn insert_category(&self, name: &str) -> Category {
        let category = Category {
            id: CategoryId::new(),
            name: name.to_string(),
            description: None,
        };
        self.lock().categories.push(category.clone());
        category
    }

    /// Snapshot of every stored article.
    pub fn articles(&self) -> Vec<Article> {
        self.lock().articles.clone()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ArticleStore for MemoryArticleStore {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn get_by_id(&self, id: ArticleId) -> Result<Option<Article>> {
        Ok(self.lock().articles.iter().find(|a| a.id == id).cloned())
    }

    async fn create(&self, article: NewArticle) -> Result<Article> {
        let article = article.into_article();
        let mut state = self.lock();
        if let Some(url) = &article.source_url {
            if state
                .articles
                .iter()
                .any(|a| a.source_url.as_ref() == Some(url))
            {
                anyhow::bail!("duplicate source_url {}", url);
            }
        }
        state.articles.push(article.clone());
        Ok(article)
    }

    async fn update(&self, id: ArticleId, update: ArticleUpdate) -> Result<Option<Article>> {
        let mut state = self.lock();
        let State {
            articles, versions, ..
        } = &mut *state;

        let Some(article) = articles.iter_mut().find(|a| a.id == id) else {
            return Ok(None);
        };

        if update.changes_text(article) {
            versions.entry(id).or_default().push(ArticleVersion {
                id: uuid::Uuid::now_v7(),
                article_id: id,
                title: article.title.clone(),
                content: article.content.clone(),
                created_at: Utc::now(),
            });
        }

        if let Some(title) = update.title {
            article.title = title;
        }
        if let Some(content) = update.content {
            article.content = content;
        }
        if let Some(summary) = update.summary {
            article.summary = Some(summary);
        }
        if let Some(status) = update.status {
            article.status = status;
        }
        article.updated_at = Utc::now();

        Ok(Some(article.clone()))
    }

    async fn update_embedding(&self, id: ArticleId, embedding: &[f32]) -> Result<bool> {
        check_embedding(embedding, self.dimensions)?;
        let mut state = self.lock();
        match state.articles.iter_mut().find(|a| a.id == id) {
            Some(article) => {
                article.embedding = Some(Vector::from(embedding.to_vec()));
                article.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_classification(
        &self,
        id: ArticleId,
        category_id: Option<CategoryId>,
        tags: &[String],
    ) -> Result<bool> {
        let mut state = self.lock();
        match state.articles.iter_mut().find(|a| a.id == id) {
            Some(article) => {
                article.category_id = category_id;
                article.tags = tags.to_vec();
                article.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn upsert_by_source_url(&self, article: NewArticle) -> Result<(Article, bool)> {
        let Some(url) = article.source_url.clone() else {
            anyhow::bail!("upsert_by_source_url requires a source_url");
        };

        let mut state = self.lock();
        if let Some(existing) = state
            .articles
            .iter_mut()
            .find(|a| a.source_url.as_deref() == Some(url.as_str()))
        {
            existing.title = article.title;
            existing.content = article.content;
            if article.summary.is_some() {
                existing.summary = article.summary;
            }
            existing.updated_at = Utc::now();
            return Ok((existing.clone(), false));
        }

        let created = article.into_article();
        state.articles.push(created.clone());
        Ok((created, true))
    }

    async fn find_without_embedding(&self, limit: i64) -> Result<Vec<Article>> {
        let limit = usize::try_from(limit).unwrap_or(0);
        let mut missing: Vec<Article> = self
            .lock()
            .articles
            .iter()
            .filter(|a| !a.has_embedding())
            .cloned()
            .collect();
        missing.sort_by_key(|a| a.created_at);
        missing.truncate(limit);
        Ok(missing)
    }

    async fn find_similar(
        &self,
        query: &SimilarityQuery,
    ) -> Result<Vec<(Article, f64)>, SearchError> {
        let limit = query.validate(self.dimensions)?;
        if limit == 0 {
            return Ok(Vec::new());
        }

        let state = self.lock();
        let mut scored: Vec<(Article, f64)> = state
            .articles
            .iter()
            .filter(|a| query.exclude_id != Some(a.id))
            .filter(|a| query.category_id.map_or(true, |c| a.category_id == Some(c)))
            .filter(|a| query.status.map_or(true, |s| a.status == s))
            .filter_map(|a| {
                let embedding = a.embedding_slice()?;
                Some((a.clone(), cosine_distance(&query.embedding, embedding)))
            })
            .collect();

        scored.sort_by(|a, b| a.1.total_cmp(&b.1));
        scored.truncate(limit);
        Ok(scored)
    }

    async fn increment_view_count(&self, id: ArticleId) -> Result<bool> {
        let mut state = self.lock();
        match state.articles.iter_mut().find(|a| a.id == id) {
            Some(article) => {
                article.view_count += 1;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: ArticleId) -> Result<bool> {
        let mut state = self.lock();
        let before = state.articles.len();
        state.articles.retain(|a| a.id != id);
        state.versions.remove(&id);
        Ok(state.articles.len() < before)
    }

    async fn versions(&self, id: ArticleId) -> Result<Vec<ArticleVersion>> {
        Ok(self.lock().versions.get(&id).cloned().unwrap_or_default())
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        let mut categories = self.lock().categories.clone();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }
}
