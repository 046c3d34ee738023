use thiserror::Error;

use super::article::ArticleStatus;
use crate::common::{ArticleId, CategoryId};

/// Largest `k` a single query may ask for.
pub const MAX_SIMILAR_RESULTS: usize = 100;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("article not found: {id}")]
    NotFound { id: ArticleId },

    #[error("invalid similarity query: {0}")]
    InvalidQuery(String),

    #[error("article store error: {0}")]
    Store(#[from] anyhow::Error),
}

/// Nearest-neighbour query over article embeddings.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityQuery {
    pub embedding: Vec<f32>,
    pub k: usize,
    pub exclude_id: Option<ArticleId>,
    pub category_id: Option<CategoryId>,
    pub status: Option<ArticleStatus>,
}

impl SimilarityQuery {
    pub fn new(embedding: Vec<f32>, k: usize) -> Self {
        Self {
            embedding,
            k,
            exclude_id: None,
            category_id: None,
            status: None,
        }
    }

    pub fn excluding(mut self, id: ArticleId) -> Self {
        self.exclude_id = Some(id);
        self
    }

    pub fn in_category(mut self, category_id: CategoryId) -> Self {
        self.category_id = Some(category_id);
        self
    }

    pub fn with_status(mut self, status: ArticleStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Effective result limit, or an error for a malformed query.
    pub fn validate(&self, dimensions: usize) -> Result<usize, SearchError> {
        if self.embedding.len() != dimensions {
            return Err(SearchError::InvalidQuery(format!(
                "embedding has {} dimensions, expected {}",
                self.embedding.len(),
                dimensions
            )));
        }
        if self.embedding.iter().any(|x| !x.is_finite()) {
            return Err(SearchError::InvalidQuery(
                "embedding contains non-finite values".to_string(),
            ));
        }
        Ok(self.k.min(MAX_SIMILAR_RESULTS))
    }
}
