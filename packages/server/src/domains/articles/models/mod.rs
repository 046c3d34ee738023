pub mod article;
pub mod search;

pub use article::{Article, ArticleStatus, ArticleUpdate, ArticleVersion, Category, NewArticle};
pub use search::{SearchError, SimilarityQuery, MAX_SIMILAR_RESULTS};
