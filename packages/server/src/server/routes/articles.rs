//! Similarity search endpoints.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::common::{ArticleId, CategoryId};
use crate::domains::articles::{Article, ArticleStatus, SimilarityQuery};
use crate::server::app::AppState;
use crate::server::error::ApiError;

const DEFAULT_LIMIT: usize = 10;

/// Query params for related articles.
#[derive(Debug, Deserialize)]
pub struct RelatedQuery {
    pub limit: Option<usize>,
}

/// Similarity search request.
#[derive(Debug, Deserialize)]
pub struct SimilarRequest {
    pub embedding: Vec<f32>,
    pub limit: Option<usize>,
    pub exclude_id: Option<ArticleId>,
    pub category_id: Option<CategoryId>,
    pub status: Option<ArticleStatus>,
}

/// One search hit, nearest first.
#[derive(Debug, Serialize)]
pub struct SimilarArticle {
    #[serde(flatten)]
    pub article: Article,
    pub distance: f64,
}

fn to_response(results: Vec<(Article, f64)>) -> Json<Vec<SimilarArticle>> {
    Json(
        results
            .into_iter()
            .map(|(article, distance)| SimilarArticle { article, distance })
            .collect(),
    )
}

/// Articles nearest to an existing article.
pub async fn related_articles(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<RelatedQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let id = ArticleId::parse(&id)
        .map_err(|e| ApiError::bad_request(format!("invalid article id {:?}: {}", id, e)))?;
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT);

    let results = state.articles.find_related(id, limit).await?;
    Ok(to_response(results))
}

/// Articles nearest to a caller-supplied embedding.
pub async fn find_similar_articles(
    State(state): State<AppState>,
    Json(body): Json<SimilarRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut query = SimilarityQuery::new(body.embedding, body.limit.unwrap_or(DEFAULT_LIMIT));
    if let Some(id) = body.exclude_id {
        query = query.excluding(id);
    }
    if let Some(category_id) = body.category_id {
        query = query.in_category(category_id);
    }
    if let Some(status) = body.status {
        query = query.with_status(status);
    }

    let results = state.articles.find_similar(&query).await?;
    Ok(to_response(results))
}
