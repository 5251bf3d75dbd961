pub mod chart;
pub mod error;
pub mod executor;
pub mod explanation;
pub mod generator;
pub mod pipeline;

pub use error::QueryError;
pub use pipeline::QueryPipeline;
