pub mod clean;
pub mod config;
pub mod detail;
pub mod enrich;
pub mod orchestrator;
pub mod resolver;

pub use config::PipelineConfig;
pub use orchestrator::{Pipeline, PipelineError};
