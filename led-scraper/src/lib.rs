//! Main library crate for the LED scraper
//!
//! The pipeline resolves a calendar landing page into candidate events for a
//! target date, fetches and cleans each event's detail page, and enriches the
//! results through a generative text backend.

pub mod infra;
pub mod llm;
pub mod observability;
pub mod pipeline;

// Re-export commonly used types
pub use led_core::domain::{EventEnrichment, EventRecord};
pub use pipeline::{Pipeline, PipelineConfig, PipelineError};
