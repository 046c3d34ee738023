pub mod data_source;

pub use data_source::{DataSource, DataSourceType};
