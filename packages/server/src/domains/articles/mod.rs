//! Articles domain - stored content, classification, embeddings and
//! similarity search

pub mod activities;
mod memory;
pub mod models;
mod postgres;
mod store;

pub use memory::MemoryArticleStore;
pub use models::{
    Article, ArticleStatus, ArticleUpdate, ArticleVersion, Category, NewArticle, SearchError,
    SimilarityQuery,
};
pub use postgres::PostgresArticleStore;
pub use store::ArticleStore;
