// Web3 Insight - Core
//
// Background job layer (payload codec, lane queue, dispatcher, worker,
// cron scheduler) and an article store with pgvector similarity search.
//
// Job handlers are organized per-domain in domains/*/activities/

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;
pub mod server;

pub use config::*;
