//! AI enrichment: batch events missing a cached enrichment, send each batch
//! to the chat backend with a strict output-schema prompt, and merge the
//! per-id results back onto the records.
//!
//! Failure handling is deliberately asymmetric to the detail stage: a batch
//! that exhausts its retries fails the whole enrichment call. A batch that
//! errored must not masquerade as a successful empty result. Unparseable
//! responses, by contrast, degrade to placeholders.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use led_core::common::error::{Result, ScraperError};
use led_core::domain::{EventEnrichment, EventRecord};
use led_core::storage::JsonCache;
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::llm::{ChatBackend, ChatReply};
use crate::observability::metrics;
use crate::pipeline::config::PipelineConfig;

pub const SYSTEM_MESSAGE: &str = "Expert Web3 event summarizer. Output ONLY clean JSON.";

static FENCED_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json)?\n?(.*?)\n?```").expect("fence regex"));

#[derive(Clone)]
pub struct EnrichmentEngine {
    backend: Arc<dyn ChatBackend>,
    cache: Arc<dyn JsonCache>,
    semaphore: Arc<Semaphore>,
    batch_size: usize,
    max_retries: usize,
    backoff_base: Duration,
    backoff_factor: f64,
}

/// The slice of an event the backend sees.
#[derive(Debug, Clone)]
struct BatchItem {
    id: String,
    title: String,
    description: String,
}

impl From<&EventRecord> for BatchItem {
    fn from(event: &EventRecord) -> Self {
        Self {
            id: event.id.clone(),
            title: event.title.clone(),
            description: event.description.clone(),
        }
    }
}

impl EnrichmentEngine {
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        cache: Arc<dyn JsonCache>,
        semaphore: Arc<Semaphore>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            backend,
            cache,
            semaphore,
            batch_size: config.enrich_batch_size,
            max_retries: config.enrich_max_retries,
            backoff_base: config.enrich_backoff_base,
            backoff_factor: config.enrich_backoff_factor,
        }
    }

    /// Enrich every record in place. Cache hits never touch the network; a
    /// fully cached set returns immediately.
    pub async fn enrich(&self, events: &mut [EventRecord]) -> Result<()> {
        let mut pending: Vec<usize> = Vec::new();
        for (index, event) in events.iter_mut().enumerate() {
            let cached = self
                .cache
                .get(&event.enrichment_key())
                .and_then(|value| serde_json::from_value::<EventEnrichment>(value).ok());
            match cached {
                Some(enrichment) => {
                    metrics::enrich::cache_hit();
                    event.apply_enrichment(&enrichment);
                }
                // Stale or incompatible cache entries count as misses.
                None => pending.push(index),
            }
        }

        if pending.is_empty() {
            debug!("all events served from the enrichment cache");
            return Ok(());
        }

        let items: Vec<BatchItem> = pending.iter().map(|&i| BatchItem::from(&events[i])).collect();
        let batches: Vec<Vec<BatchItem>> = items
            .chunks(self.batch_size)
            .map(|chunk| chunk.to_vec())
            .collect();
        let total = batches.len();
        info!(events = pending.len(), batches = total, "dispatching enrichment batches");

        let handles: Vec<_> = batches
            .into_iter()
            .enumerate()
            .map(|(index, batch)| {
                let engine = self.clone();
                tokio::spawn(async move { engine.process_batch(batch, index, total).await })
            })
            .collect();

        // Wait for every batch's terminal outcome before deciding the call's
        // fate; a slow sibling is never cancelled by a failed one.
        let mut merged: HashMap<String, EventEnrichment> = HashMap::new();
        let mut failure: Option<ScraperError> = None;
        for handle in handles {
            match handle.await {
                Ok(Ok(map)) => merged.extend(map),
                Ok(Err(e)) => {
                    error!(error = %e, "enrichment batch failed");
                    failure.get_or_insert(e);
                }
                Err(e) => {
                    failure.get_or_insert(ScraperError::Enrichment {
                        message: format!("enrichment task failed: {e}"),
                    });
                }
            }
        }
        if let Some(e) = failure {
            return Err(e);
        }

        for &index in &pending {
            let event = &mut events[index];
            match merged.get(&event.id) {
                Some(enrichment) => {
                    event.apply_enrichment(enrichment);
                    match serde_json::to_value(enrichment) {
                        Ok(value) => self.cache.put(&event.enrichment_key(), &value),
                        Err(e) => debug!(error = %e, "enrichment value not serializable"),
                    }
                }
                None => {
                    metrics::enrich::placeholder();
                    warn!(id = %event.id, "event missing from batch results, applying placeholder");
                    event.apply_placeholder();
                }
            }
        }
        Ok(())
    }

    /// One batch round-trip: prompt, retry loop, tolerant parse. Errors out
    /// only after the retry budget is spent.
    async fn process_batch(
        &self,
        batch: Vec<BatchItem>,
        index: usize,
        total: usize,
    ) -> Result<HashMap<String, EventEnrichment>> {
        let _permit = self.semaphore.acquire().await.expect("semaphore closed");
        metrics::enrich::batch_dispatched();
        debug!(batch = index + 1, total, size = batch.len(), "processing enrichment batch");

        let prompt = build_batch_prompt(&batch);
        let mut delay = self.backoff_base;
        let mut content: Option<String> = None;

        for attempt in 0..self.max_retries {
            match self.backend.complete(SYSTEM_MESSAGE, &prompt).await {
                Ok(ChatReply::Completed(text)) => {
                    content = Some(text);
                    break;
                }
                Ok(ChatReply::RateLimited) => {
                    metrics::enrich::rate_limited();
                    warn!(
                        batch = index + 1,
                        attempt = attempt + 1,
                        wait_ms = delay.as_millis() as u64,
                        "enrichment backend rate limited, backing off"
                    );
                }
                Err(e) => {
                    if attempt + 1 == self.max_retries {
                        return Err(ScraperError::Enrichment {
                            message: format!(
                                "batch {}/{} failed after {} attempts: {e}",
                                index + 1,
                                total,
                                self.max_retries
                            ),
                        });
                    }
                    warn!(batch = index + 1, error = %e, "enrichment request failed, retrying");
                }
            }
            tokio::time::sleep(delay).await;
            delay = delay.mul_f64(self.backoff_factor);
        }

        let Some(content) = content else {
            return Err(ScraperError::Enrichment {
                message: format!(
                    "batch {}/{} rate limited through all {} attempts",
                    index + 1,
                    total,
                    self.max_retries
                ),
            });
        };

        Ok(parse_enrichment_map(&content))
    }
}

fn build_batch_prompt(batch: &[BatchItem]) -> String {
    let sections: Vec<String> = batch
        .iter()
        .map(|item| {
            let description = if item.description.is_empty() {
                "No description provided."
            } else {
                item.description.as_str()
            };
            format!("### ID: {}\n**T:** {}\n**D:** {}", item.id, item.title, description)
        })
        .collect();
    let input_markdown = sections.join("\n\n---\n\n");

    format!(
        r#"Summarize {count} events into ONE JSON object.
Format:
{{
  "ID": {{
    "s": ["Summary: ...", "Topics: ...", "Speakers: ..."],
    "r": ["Reason1", "Reason2", "Reason3"],
    "t": ["Tag1", "Tag2", "Tag3", "Tag4", "Tag5"]
  }}
}}
Rules:
1. 's': 3 bullets (Detailed Event Summary, Key Topics and Technologies, Key Speakers).
2. 'r': 3 strategic reasons to attend.
3. 't': Distinct single words. NO compound words or camelCase.
4. Maximize density with professional tech/finance terms.
INPUT:
{input_markdown}
"#,
        count = batch.len(),
    )
}

/// Strip a fenced code block wrapper if present, then slice to the outermost
/// JSON object.
pub fn extract_json(text: &str) -> String {
    let mut text = text.trim().to_string();
    if text.contains("```") {
        if let Some(caps) = FENCED_BLOCK.captures(&text) {
            text = caps[1].trim().to_string();
        } else {
            text = text
                .trim_start_matches("```json")
                .trim_start_matches("```")
                .trim_end_matches("```")
                .trim()
                .to_string();
        }
    }
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => text[start..=end].to_string(),
        _ => text,
    }
}

/// Parse the batch response into an id → enrichment map. Generated JSON
/// commonly embeds literal newlines inside string values; one reparse with
/// newlines collapsed recovers those. Anything still unparseable yields an
/// empty map — the dispatched events then get placeholders.
pub fn parse_enrichment_map(content: &str) -> HashMap<String, EventEnrichment> {
    let json_str = extract_json(content);
    if let Some(map) = parse_map(&json_str) {
        return map;
    }

    metrics::enrich::parse_retry();
    let collapsed = json_str.replace('\n', " ");
    match parse_map(&collapsed) {
        Some(map) => map,
        None => {
            warn!("enrichment response was not parseable JSON, dropping batch result");
            HashMap::new()
        }
    }
}

fn parse_map(json_str: &str) -> Option<HashMap<String, EventEnrichment>> {
    let value: serde_json::Value = serde_json::from_str(json_str).ok()?;
    let object = value.as_object()?;
    Some(
        object
            .iter()
            .filter_map(|(id, entry)| {
                serde_json::from_value::<EventEnrichment>(entry.clone())
                    .ok()
                    .map(|enrichment| (id.clone(), enrichment))
            })
            .collect(),
    )
}
