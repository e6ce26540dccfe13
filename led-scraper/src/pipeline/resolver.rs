//! Source resolution: turn a landing page plus target date into candidate
//! events, either through the calendar items API (when the page advertises a
//! calendar id) or by filtering the page's embedded data blob locally.
//!
//! Expected failures (non-200s, missing tags, malformed blobs) degrade to an
//! empty candidate list. The resolver only errors on genuinely unexpected
//! conditions, which in practice means never.

use std::time::Duration;

use chrono::NaiveDate;
use led_core::common::error::Result;
use led_core::domain::CandidateEvent;
use led_core::storage::content_token;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::StatusCode;
use scraper::{Html, Selector};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::infra::http::SITE_REFERER;
use crate::observability::metrics;
use crate::pipeline::config::PipelineConfig;

pub const SITE_BASE_URL: &str = "https://lu.ma";
pub const CALENDAR_ITEMS_URL: &str = "https://api2.luma.com/calendar/get-items";

/// Items from the calendar API carry a platform tag; anything not from the
/// source platform is dropped.
pub const SOURCE_PLATFORM: &str = "luma";

static CALENDAR_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"luma://calendar/(cal-[a-zA-Z0-9]+)").expect("calendar id regex"));

/// Ordered lookup paths for the items array in a calendar API response; the
/// first non-empty array wins.
const API_ITEM_PATHS: [&[&str]; 4] = [
    &["items"],
    &["entries"],
    &["data", "entries"],
    &["data", "items"],
];

/// Ordered lookup paths for the events array inside the embedded page blob.
const EMBEDDED_EVENT_PATHS: [&[&str]; 2] = [
    &["props", "pageProps", "initialData", "events"],
    &["props", "pageProps", "initialData", "data", "events"],
];

pub struct EventSourceResolver {
    client: reqwest::Client,
    items_api_url: String,
    site_base_url: String,
    timeout: Duration,
}

impl EventSourceResolver {
    pub fn new(client: reqwest::Client, config: &PipelineConfig) -> Self {
        Self::with_endpoints(client, config, CALENDAR_ITEMS_URL, SITE_BASE_URL)
    }

    /// Endpoint override, for pointing at a stand-in server.
    pub fn with_endpoints(
        client: reqwest::Client,
        config: &PipelineConfig,
        items_api_url: &str,
        site_base_url: &str,
    ) -> Self {
        Self {
            client,
            items_api_url: items_api_url.to_string(),
            site_base_url: site_base_url.to_string(),
            timeout: config.resolve_timeout,
        }
    }

    pub async fn resolve(
        &self,
        landing_url: &str,
        target_date: &str,
    ) -> Result<Vec<CandidateEvent>> {
        let response = match self
            .client
            .get(landing_url)
            .header("Referer", SITE_REFERER)
            .timeout(self.timeout)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(url = landing_url, error = %e, "landing page fetch failed");
                return Ok(Vec::new());
            }
        };
        if response.status() != StatusCode::OK {
            warn!(url = landing_url, status = %response.status(), "landing page returned an error status");
            return Ok(Vec::new());
        }
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                warn!(url = landing_url, error = %e, "landing page body could not be read");
                return Ok(Vec::new());
            }
        };

        let calendar_id = find_calendar_id(&body);
        let items = match &calendar_id {
            Some(id) => {
                info!(calendar_id = %id, "calendar id detected, querying items API");
                self.fetch_calendar_items(id, target_date).await
            }
            None => {
                info!("no calendar id on landing page, falling back to embedded data");
                extract_embedded_events(&body)
            }
        };
        debug!(raw_items = items.len(), "pre-filter item count");

        let candidates: Vec<CandidateEvent> = items
            .iter()
            .filter_map(|item| {
                prepare_candidate(
                    item,
                    calendar_id.is_some(),
                    target_date,
                    landing_url,
                    &self.site_base_url,
                )
            })
            .collect();

        metrics::resolver::candidates(candidates.len());
        info!(
            raw = items.len(),
            prepared = candidates.len(),
            "resolved candidate events"
        );
        Ok(candidates)
    }

    async fn fetch_calendar_items(&self, calendar_id: &str, target_date: &str) -> Vec<Value> {
        let Some((after, before)) = date_window(target_date) else {
            warn!(target_date, "target date did not parse, skipping calendar API");
            return Vec::new();
        };
        let params = [
            ("after", after.as_str()),
            ("before", before.as_str()),
            ("calendar_api_id", calendar_id),
            ("period", "specific"),
        ];

        match self
            .client
            .get(&self.items_api_url)
            .query(&params)
            .header("Referer", SITE_REFERER)
            .timeout(self.timeout)
            .send()
            .await
        {
            Ok(response) if response.status() == StatusCode::OK => {
                match response.json::<Value>().await {
                    Ok(body) => extract_api_items(&body),
                    Err(e) => {
                        warn!(error = %e, "calendar API body was not valid JSON");
                        Vec::new()
                    }
                }
            }
            Ok(response) => {
                warn!(status = %response.status(), "calendar API returned an error status");
                Vec::new()
            }
            Err(e) => {
                warn!(error = %e, "calendar API request failed");
                Vec::new()
            }
        }
    }
}

/// 24-hour window around the target date, in the site's UTC+8 convention.
pub fn date_window(target_date: &str) -> Option<(String, String)> {
    let day = NaiveDate::parse_from_str(target_date, "%Y-%m-%d").ok()?;
    let next = day + chrono::Duration::days(1);
    Some((
        format!("{}T00:00:00.000+08:00", day.format("%Y-%m-%d")),
        format!("{}T00:00:00.000+08:00", next.format("%Y-%m-%d")),
    ))
}

/// Look for the app-link meta tag advertising a calendar id.
pub fn find_calendar_id(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(r#"meta[name="apple-itunes-app"]"#).expect("meta selector");
    let content = document.select(&selector).next()?.value().attr("content")?;
    CALENDAR_ID
        .captures(content)
        .map(|caps| caps[1].to_string())
}

/// Pull the events array out of the page's embedded JSON blob.
pub fn extract_embedded_events(html: &str) -> Vec<Value> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("script#__NEXT_DATA__").expect("embedded data selector");
    let Some(script) = document.select(&selector).next() else {
        debug!("no embedded data script on landing page");
        return Vec::new();
    };
    let data: Value = match serde_json::from_str(&script.inner_html()) {
        Ok(data) => data,
        Err(e) => {
            warn!(error = %e, "embedded data blob was not valid JSON");
            return Vec::new();
        }
    };
    first_non_empty_array(&data, &EMBEDDED_EVENT_PATHS)
}

pub fn extract_api_items(body: &Value) -> Vec<Value> {
    first_non_empty_array(body, &API_ITEM_PATHS)
}

fn lookup<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |node, key| node.get(key))
}

fn first_non_empty_array(value: &Value, paths: &[&[&str]]) -> Vec<Value> {
    paths
        .iter()
        .filter_map(|path| lookup(value, path))
        .filter_map(Value::as_array)
        .find(|array| !array.is_empty())
        .map(|array| array.to_vec())
        .unwrap_or_default()
}

/// Normalize one raw item into a candidate, applying the platform filter (API
/// mode) or the date substring filter (embedded mode). Dates are ISO-prefixed
/// strings upstream, so substring matching on `YYYY-MM-DD` is sound.
pub fn prepare_candidate(
    item: &Value,
    api_mode: bool,
    target_date: &str,
    landing_url: &str,
    site_base_url: &str,
) -> Option<CandidateEvent> {
    let wrapper = item.as_object()?;

    if api_mode {
        let platform = wrapper.get("platform").and_then(Value::as_str).unwrap_or("");
        if !platform.eq_ignore_ascii_case(SOURCE_PLATFORM) {
            return None;
        }
    }

    let event = wrapper
        .get("event")
        .filter(|v| v.is_object())
        .or_else(|| wrapper.get("api_event").filter(|v| v.is_object()))
        .unwrap_or(item);
    let event_obj = event.as_object()?;

    let start_at = event_obj
        .get("start_at")
        .or_else(|| event_obj.get("start_date"))
        .and_then(Value::as_str)
        .unwrap_or("");
    if !api_mode && !start_at.contains(target_date) {
        return None;
    }

    let external_id = field_string(event_obj, "api_id")
        .or_else(|| field_string(event_obj, "id"))
        .unwrap_or_else(|| fallback_event_id(start_at));
    let name = field_string(event_obj, "name")
        .or_else(|| field_string(event_obj, "title"))
        .unwrap_or_else(|| "Untitled Event".to_string());
    let path = field_string(event_obj, "url")
        .or_else(|| field_string(event_obj, "url_path"))
        .unwrap_or_default();
    let detail_url = if path.is_empty() {
        landing_url.to_string()
    } else {
        format!(
            "{}/{}",
            site_base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    };

    Some(CandidateEvent {
        external_id,
        name,
        detail_url,
        event: event.clone(),
        item: item.clone(),
    })
}

fn field_string(obj: &Map<String, Value>, key: &str) -> Option<String> {
    match obj.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Weak fallback for events missing an upstream id: a token over the raw
/// start string. Distinct events sharing a start time collide here; the id
/// is best-effort only.
pub fn fallback_event_id(start_at: &str) -> String {
    format!("evt-{}", &content_token(start_at)[..16])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const LANDING: &str = "https://lu.ma/hongkong";

    #[test]
    fn finds_calendar_id_in_app_meta_tag() {
        let html = r#"<html><head>
            <meta name="apple-itunes-app" content="app-id=1546150895, app-argument=luma://calendar/cal-abc123XYZ">
        </head><body></body></html>"#;
        assert_eq!(find_calendar_id(html), Some("cal-abc123XYZ".to_string()));
    }

    #[test]
    fn missing_meta_tag_or_pattern_yields_none() {
        assert_eq!(find_calendar_id("<html><head></head></html>"), None);
        let no_pattern = r#"<meta name="apple-itunes-app" content="app-id=1546150895">"#;
        assert_eq!(find_calendar_id(no_pattern), None);
    }

    #[test]
    fn api_items_are_found_at_any_of_the_known_paths() {
        let item = json!({ "platform": "luma" });
        for body in [
            json!({ "items": [item] }),
            json!({ "entries": [item] }),
            json!({ "data": { "entries": [item] } }),
            json!({ "data": { "items": [item] } }),
        ] {
            assert_eq!(extract_api_items(&body).len(), 1, "body: {body}");
        }
        assert!(extract_api_items(&json!({ "unrelated": 1 })).is_empty());
    }

    #[test]
    fn empty_arrays_defer_to_later_paths() {
        let body = json!({ "items": [], "entries": [{ "platform": "luma" }] });
        assert_eq!(extract_api_items(&body).len(), 1);
    }

    #[test]
    fn embedded_events_come_from_either_nested_location() {
        let html_direct = format!(
            r#"<script id="__NEXT_DATA__" type="application/json">{}</script>"#,
            json!({ "props": { "pageProps": { "initialData": { "events": [{ "name": "A" }] } } } })
        );
        assert_eq!(extract_embedded_events(&html_direct).len(), 1);

        let html_nested = format!(
            r#"<script id="__NEXT_DATA__" type="application/json">{}</script>"#,
            json!({ "props": { "pageProps": { "initialData": { "data": { "events": [{ "name": "B" }] } } } } })
        );
        assert_eq!(extract_embedded_events(&html_nested).len(), 1);
    }

    #[test]
    fn malformed_embedded_blob_contributes_nothing() {
        let html = r#"<script id="__NEXT_DATA__">{"props": oops}</script>"#;
        assert!(extract_embedded_events(html).is_empty());
    }

    #[test]
    fn api_mode_filters_on_platform_case_insensitively() {
        let event = json!({ "api_id": "evt-1", "name": "Summit", "start_at": "2026-08-06T10:00:00Z" });
        let ours = json!({ "platform": "Luma", "event": event });
        let theirs = json!({ "platform": "other", "event": event });

        assert!(prepare_candidate(&ours, true, "2026-08-06", LANDING, SITE_BASE_URL).is_some());
        assert!(prepare_candidate(&theirs, true, "2026-08-06", LANDING, SITE_BASE_URL).is_none());
    }

    #[test]
    fn embedded_mode_filters_on_date_substring() {
        let in_window = json!({ "event": { "api_id": "e1", "name": "A", "start_at": "2026-08-06T18:00:00+08:00" } });
        let out_of_window = json!({ "event": { "api_id": "e2", "name": "B", "start_at": "2026-08-07T18:00:00+08:00" } });

        assert!(prepare_candidate(&in_window, false, "2026-08-06", LANDING, SITE_BASE_URL).is_some());
        assert!(prepare_candidate(&out_of_window, false, "2026-08-06", LANDING, SITE_BASE_URL).is_none());
    }

    #[test]
    fn event_record_may_be_nested_or_flat() {
        let nested = json!({ "api_event": { "id": "n1", "title": "Nested", "start_at": "2026-08-06" } });
        let flat = json!({ "id": "f1", "name": "Flat", "start_at": "2026-08-06" });

        let a = prepare_candidate(&nested, false, "2026-08-06", LANDING, SITE_BASE_URL).unwrap();
        assert_eq!(a.external_id, "n1");
        assert_eq!(a.name, "Nested");

        let b = prepare_candidate(&flat, false, "2026-08-06", LANDING, SITE_BASE_URL).unwrap();
        assert_eq!(b.external_id, "f1");
    }

    #[test]
    fn missing_id_falls_back_to_start_hash_and_missing_name_to_untitled() {
        let item = json!({ "event": { "start_at": "2026-08-06T09:00:00Z" } });
        let candidate = prepare_candidate(&item, false, "2026-08-06", LANDING, SITE_BASE_URL).unwrap();
        assert!(candidate.external_id.starts_with("evt-"));
        assert_eq!(candidate.name, "Untitled Event");
        assert_eq!(
            candidate.external_id,
            fallback_event_id("2026-08-06T09:00:00Z")
        );
    }

    #[test]
    fn detail_url_is_built_from_path_or_falls_back_to_landing() {
        let with_path = json!({ "event": { "id": "1", "name": "A", "start_at": "2026-08-06", "url": "abc123" } });
        let candidate = prepare_candidate(&with_path, false, "2026-08-06", LANDING, SITE_BASE_URL).unwrap();
        assert_eq!(candidate.detail_url, "https://lu.ma/abc123");

        let without_path = json!({ "event": { "id": "2", "name": "B", "start_at": "2026-08-06" } });
        let candidate = prepare_candidate(&without_path, false, "2026-08-06", LANDING, SITE_BASE_URL).unwrap();
        assert_eq!(candidate.detail_url, LANDING);
    }

    #[test]
    fn numeric_ids_are_stringified() {
        let item = json!({ "event": { "id": 42, "name": "N", "start_at": "2026-08-06" } });
        let candidate = prepare_candidate(&item, false, "2026-08-06", LANDING, SITE_BASE_URL).unwrap();
        assert_eq!(candidate.external_id, "42");
    }

    #[test]
    fn non_object_items_are_skipped() {
        assert!(prepare_candidate(&json!("just a string"), false, "2026-08-06", LANDING, SITE_BASE_URL).is_none());
        assert!(prepare_candidate(&json!({ "event": 3 }), false, "2026-08-06", LANDING, SITE_BASE_URL).is_none());
    }

    #[test]
    fn date_window_brackets_the_day_in_utc_plus_8() {
        let (after, before) = date_window("2026-08-06").unwrap();
        assert_eq!(after, "2026-08-06T00:00:00.000+08:00");
        assert_eq!(before, "2026-08-07T00:00:00.000+08:00");
        assert!(date_window("not-a-date").is_none());
    }

    #[test]
    fn month_end_rolls_over() {
        let (_, before) = date_window("2026-12-31").unwrap();
        assert_eq!(before, "2027-01-01T00:00:00.000+08:00");
    }
}
