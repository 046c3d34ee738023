// HTTP routes
pub mod articles;
pub mod health;
pub mod tasks;

pub use articles::*;
pub use health::*;
pub use tasks::*;
