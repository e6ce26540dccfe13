//! Orchestrator-level failure surfaces, exercised without any live upstream.

use std::sync::Arc;

use async_trait::async_trait;
use led_core::common::error::Result;
use led_core::storage::MemoryJsonCache;
use led_scraper::llm::{ChatBackend, ChatReply};
use led_scraper::pipeline::{Pipeline, PipelineConfig, PipelineError};

struct InertBackend;

#[async_trait]
impl ChatBackend for InertBackend {
    async fn complete(&self, _system: &str, _user: &str) -> Result<ChatReply> {
        Ok(ChatReply::Completed("{}".to_string()))
    }
}

fn pipeline() -> Pipeline {
    Pipeline::new(
        PipelineConfig::default(),
        Arc::new(MemoryJsonCache::new()),
        Arc::new(MemoryJsonCache::new()),
        Arc::new(InertBackend),
    )
}

#[tokio::test]
async fn malformed_dates_are_rejected_as_client_errors() {
    let err = pipeline()
        .collect("https://lu.ma/hongkong", "06/08/2026")
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::InvalidDate(_)));
    assert_eq!(err.status_code(), 400);
}

#[tokio::test]
async fn unreachable_landing_pages_surface_as_no_events() {
    // The resolver degrades an unreachable landing page to an empty candidate
    // set; the orchestrator turns that into the client-visible 400.
    let err = pipeline()
        .collect("sptth://unreachable.invalid/calendar", "2026-08-06")
        .await
        .unwrap_err();
    match &err {
        PipelineError::NoEvents { date, url } => {
            assert_eq!(date, "2026-08-06");
            assert_eq!(url, "sptth://unreachable.invalid/calendar");
        }
        other => panic!("expected NoEvents, got {other:?}"),
    }
    assert_eq!(err.status_code(), 400);
    assert!(err.to_string().contains("No events found for 2026-08-06"));
}
