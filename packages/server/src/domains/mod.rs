// Business domains
pub mod articles;
pub mod sources;
