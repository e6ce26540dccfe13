//! Detail fetcher behavior that doesn't need a live site: cache hits,
//! soft failure with fallback to listing text, and field resolution.

use std::sync::Arc;
use std::time::Duration;

use led_core::domain::CandidateEvent;
use led_core::storage::{JsonCache, MemoryJsonCache};
use led_scraper::infra::http::browser_client;
use led_scraper::pipeline::detail::{DetailFetcher, DEFAULT_LOCATION};
use led_scraper::pipeline::PipelineConfig;
use serde_json::json;
use tokio::sync::Semaphore;

fn fast_config() -> PipelineConfig {
    PipelineConfig {
        detail_max_retries: 1,
        detail_retry_pause: Duration::from_millis(1),
        detail_rate_limit_step: Duration::from_millis(1),
        ..PipelineConfig::default()
    }
}

fn fetcher(cache: Arc<dyn JsonCache>, config: &PipelineConfig) -> DetailFetcher {
    DetailFetcher::new(
        browser_client(),
        cache,
        Arc::new(Semaphore::new(config.detail_concurrency)),
        config,
    )
}

fn candidate(id: &str, detail_url: &str, event: serde_json::Value) -> CandidateEvent {
    CandidateEvent {
        external_id: id.to_string(),
        name: format!("Event {id}"),
        detail_url: detail_url.to_string(),
        event,
        item: json!({}),
    }
}

#[tokio::test]
async fn cached_descriptions_skip_the_network() {
    let cache = Arc::new(MemoryJsonCache::new());
    cache.put(
        "https://lu.ma/cached-evt",
        &json!({ "description": "cached text" }),
    );
    let config = fast_config();
    let fetcher = fetcher(cache, &config);

    let records = fetcher
        .fetch_all(vec![candidate(
            "e1",
            "https://lu.ma/cached-evt",
            json!({ "start_at": "2026-08-06T10:00:00+08:00" }),
        )])
        .await
        .unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].description, "cached text");
}

#[tokio::test]
async fn failed_fetches_fall_back_to_the_listing_description() {
    let cache = Arc::new(MemoryJsonCache::new());
    let config = fast_config();
    let fetcher = fetcher(cache, &config);

    // The scheme is unroutable, so the fetch soft-fails without touching the
    // network and the cleaned listing text is used instead.
    let event = json!({
        "start_at": "2026-08-06T10:00:00+08:00",
        "end_at": "2026-08-06T12:00:00+08:00",
        "description": "Panel on rollups About the venue",
        "guest_count": 88,
        "geo_address_info": { "address": "1 Harbour Rd" }
    });
    let records = fetcher
        .fetch_all(vec![candidate("e1", "sptth://unreachable.invalid/x", event)])
        .await
        .unwrap();

    let record = &records[0];
    assert_eq!(record.description, "Panel on rollups");
    assert_eq!(record.guest_count, 88);
    assert_eq!(record.location, "1 Harbour Rd");
    assert_eq!(record.start_date.as_deref(), Some("2026-08-06T10:00:00+08:00"));
    assert_eq!(record.end_date.as_deref(), Some("2026-08-06T12:00:00+08:00"));
}

#[tokio::test]
async fn missing_fields_resolve_to_defaults() {
    let cache = Arc::new(MemoryJsonCache::new());
    let config = fast_config();
    let fetcher = fetcher(cache, &config);

    let records = fetcher
        .fetch_all(vec![candidate("e1", "sptth://unreachable.invalid/x", json!({}))])
        .await
        .unwrap();

    let record = &records[0];
    assert_eq!(record.description, "");
    assert_eq!(record.guest_count, 0);
    assert_eq!(record.location, DEFAULT_LOCATION);
    assert_eq!(record.start_date, None);
    assert!(record.ai_summary.is_none());
}

#[tokio::test]
async fn guest_count_prefers_the_wrapper_field() {
    let cache = Arc::new(MemoryJsonCache::new());
    let config = fast_config();
    let fetcher = fetcher(cache, &config);

    let mut c = candidate(
        "e1",
        "sptth://unreachable.invalid/x",
        json!({ "ticket_count": 5 }),
    );
    c.item = json!({ "guest_count": 120 });

    let records = fetcher.fetch_all(vec![c]).await.unwrap();
    assert_eq!(records[0].guest_count, 120);
}

#[tokio::test]
async fn results_come_back_in_input_order() {
    let cache = Arc::new(MemoryJsonCache::new());
    for i in 0..6 {
        cache.put(
            &format!("https://lu.ma/evt-{i}"),
            &json!({ "description": format!("desc {i}") }),
        );
    }
    let config = fast_config();
    let fetcher = fetcher(cache, &config);

    let candidates: Vec<CandidateEvent> = (0..6)
        .map(|i| {
            candidate(
                &format!("e{i}"),
                &format!("https://lu.ma/evt-{i}"),
                json!({}),
            )
        })
        .collect();
    let records = fetcher.fetch_all(candidates).await.unwrap();

    let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["e0", "e1", "e2", "e3", "e4", "e5"]);
    assert_eq!(records[3].description, "desc 3");
}
