//! Detail-page fetching: per-candidate concurrent retrieval of the event's
//! own page, extraction of its structured linked-data block, and description
//! cleanup. Every failure mode here is soft; a candidate that cannot be
//! fetched still produces a record from its raw source fields.

use std::sync::Arc;
use std::time::Duration;

use led_core::common::error::{Result, ScraperError};
use led_core::domain::{CandidateEvent, EventRecord};
use led_core::storage::JsonCache;
use reqwest::StatusCode;
use scraper::{Html, Selector};
use serde_json::{json, Value};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::infra::http::SITE_REFERER;
use crate::observability::metrics;
use crate::pipeline::clean::clean_description;
use crate::pipeline::config::PipelineConfig;

/// Site-specific fallback when an event carries no address at all.
pub const DEFAULT_LOCATION: &str = "Hong Kong";

#[derive(Clone)]
pub struct DetailFetcher {
    client: reqwest::Client,
    cache: Arc<dyn JsonCache>,
    semaphore: Arc<Semaphore>,
    max_retries: usize,
    timeout: Duration,
    retry_pause: Duration,
    rate_limit_step: Duration,
}

impl DetailFetcher {
    pub fn new(
        client: reqwest::Client,
        cache: Arc<dyn JsonCache>,
        semaphore: Arc<Semaphore>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            client,
            cache,
            semaphore,
            max_retries: config.detail_max_retries,
            timeout: config.detail_timeout,
            retry_pause: config.detail_retry_pause,
            rate_limit_step: config.detail_rate_limit_step,
        }
    }

    /// Fetch every candidate concurrently (bounded by the injected
    /// semaphore) and return records in input order. Individual candidates
    /// never fail; the only error here is a lost task.
    pub async fn fetch_all(&self, candidates: Vec<CandidateEvent>) -> Result<Vec<EventRecord>> {
        let handles: Vec<_> = candidates
            .into_iter()
            .map(|candidate| {
                let fetcher = self.clone();
                tokio::spawn(async move { fetcher.build_record(candidate).await })
            })
            .collect();

        let mut records = Vec::with_capacity(handles.len());
        for handle in handles {
            let record = handle.await.map_err(|e| ScraperError::Api {
                message: format!("detail fetch task failed: {e}"),
            })?;
            records.push(record);
        }
        Ok(records)
    }

    async fn build_record(&self, candidate: CandidateEvent) -> EventRecord {
        let fetched = self.fetch_description(&candidate.detail_url).await;
        let event = &candidate.event;

        // An empty fetched description falls back to the listing's own text.
        let description = fetched
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| {
                clean_description(event.get("description").and_then(Value::as_str))
            });

        let geo = event.get("geo_address_info");
        let location = geo
            .and_then(|g| g.get("full_address"))
            .and_then(Value::as_str)
            .or_else(|| geo.and_then(|g| g.get("address")).and_then(Value::as_str))
            .unwrap_or(DEFAULT_LOCATION)
            .to_string();

        // First numeric value wins; upstream puts the count on the wrapper or
        // the event depending on source shape.
        let guest_count = [
            candidate.item.get("guest_count"),
            event.get("guest_count"),
            event.get("ticket_count"),
            candidate.item.get("num_tickets_sold"),
        ]
        .into_iter()
        .flatten()
        .find_map(Value::as_u64)
        .unwrap_or(0);

        EventRecord {
            id: candidate.external_id,
            title: candidate.name,
            url: candidate.detail_url,
            start_date: event.get("start_at").and_then(Value::as_str).map(String::from),
            end_date: event.get("end_at").and_then(Value::as_str).map(String::from),
            location,
            description,
            guest_count,
            ai_summary: None,
            top_reasons: None,
            tags: None,
        }
    }

    /// Cache-aware fetch of one detail page. `Some` means the page had a
    /// structured event block (its cleaned description, possibly empty);
    /// `None` is the soft-failure outcome for everything else.
    async fn fetch_description(&self, url: &str) -> Option<String> {
        let _permit = self.semaphore.acquire().await.expect("semaphore closed");

        if let Some(hit) = self.cache.get(url) {
            metrics::detail::cache_hit();
            debug!(url, "detail cache hit");
            return hit.get("description").and_then(Value::as_str).map(String::from);
        }

        for attempt in 0..self.max_retries {
            match self
                .client
                .get(url)
                .header("Referer", SITE_REFERER)
                .timeout(self.timeout)
                .send()
                .await
            {
                Ok(response) if response.status() == StatusCode::OK => {
                    let body = match response.text().await {
                        Ok(body) => body,
                        Err(e) => {
                            warn!(url, error = %e, "detail body could not be read");
                            return None;
                        }
                    };
                    return match extract_structured_event(&body) {
                        Some(event) => {
                            let cleaned = clean_description(
                                event.get("description").and_then(Value::as_str),
                            );
                            self.cache.put(url, &json!({ "description": cleaned }));
                            metrics::detail::fetch_success();
                            Some(cleaned)
                        }
                        None => {
                            debug!(url, "no structured event data on detail page");
                            None
                        }
                    };
                }
                Ok(response) if response.status() == StatusCode::TOO_MANY_REQUESTS => {
                    metrics::detail::rate_limited();
                    let wait = self.rate_limit_step * (attempt as u32 + 1);
                    warn!(url, wait_ms = wait.as_millis() as u64, "detail page rate limited, backing off");
                    tokio::time::sleep(wait).await;
                }
                Ok(response) => {
                    warn!(url, status = %response.status(), "detail page returned an error status");
                    return None;
                }
                Err(e) => {
                    if attempt + 1 == self.max_retries {
                        metrics::detail::fetch_error();
                        warn!(url, error = %e, "detail fetch failed after retries");
                    } else {
                        tokio::time::sleep(self.retry_pause).await;
                    }
                }
            }
        }
        None
    }
}

/// Find the page's structured linked-data block and select the event node:
/// for arrays, the first element typed `Event` or carrying a description;
/// plain objects stand for themselves.
pub fn extract_structured_event(html: &str) -> Option<Value> {
    let document = Html::parse_document(html);
    let selector =
        Selector::parse(r#"script[type="application/ld+json"]"#).expect("linked-data selector");
    let script = document.select(&selector).next()?;
    let data: Value = serde_json::from_str(script.inner_html().trim()).ok()?;

    match data {
        Value::Array(items) => items.into_iter().find(|item| {
            item.is_object()
                && (item.get("@type").and_then(Value::as_str) == Some("Event")
                    || item.get("description").is_some())
        }),
        Value::Object(_) => Some(data),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ld_page(payload: &str) -> String {
        format!(
            r#"<html><head><script type="application/ld+json">{payload}</script></head><body></body></html>"#
        )
    }

    #[test]
    fn selects_event_item_from_linked_data_array() {
        let page = ld_page(
            r#"[{"@type":"Organization","name":"Host"},{"@type":"Event","description":"Foo About Bar"}]"#,
        );
        let event = extract_structured_event(&page).unwrap();
        assert_eq!(event["@type"], "Event");

        let cleaned = clean_description(event.get("description").and_then(Value::as_str));
        assert_eq!(cleaned, "Foo");
    }

    #[test]
    fn array_item_with_description_counts_even_without_event_type() {
        let page = ld_page(r#"[{"@type":"Thing","description":"kept"}]"#);
        let event = extract_structured_event(&page).unwrap();
        assert_eq!(event["description"], "kept");
    }

    #[test]
    fn single_object_stands_for_itself() {
        let page = ld_page(r#"{"@type":"Event","description":"solo"}"#);
        assert_eq!(extract_structured_event(&page).unwrap()["description"], "solo");
    }

    #[test]
    fn missing_script_or_invalid_json_yields_none() {
        assert!(extract_structured_event("<html><body>plain</body></html>").is_none());
        assert!(extract_structured_event(&ld_page("{broken")).is_none());
        assert!(extract_structured_event(&ld_page(r#""just a string""#)).is_none());
    }

    #[test]
    fn array_without_matching_item_yields_none() {
        let page = ld_page(r#"[{"@type":"Organization","name":"A"},{"@type":"WebSite"}]"#);
        assert!(extract_structured_event(&page).is_none());
    }
}
