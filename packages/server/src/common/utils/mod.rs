pub mod content_hash;
pub mod embeddings;
pub mod vector;

pub use content_hash::*;
pub use embeddings::*;
pub use vector::*;
