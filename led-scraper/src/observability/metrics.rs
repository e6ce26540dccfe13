//! Metric catalog for the pipeline, following Prometheus naming conventions.
//!
//! The enum keeps metric names out of call sites; the helper modules below
//! are what the pipeline stages actually invoke. Recording is a no-op until
//! a recorder is installed (the server binary installs the Prometheus
//! exporter).

use once_cell::sync::Lazy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    ResolverCandidates,
    DetailCacheHits,
    DetailFetchesSuccess,
    DetailFetchesError,
    DetailRateLimited,
    EnrichCacheHits,
    EnrichBatchesDispatched,
    EnrichRateLimited,
    EnrichParseRetries,
    EnrichPlaceholders,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::ResolverCandidates => "led_resolver_candidates_total",
            MetricName::DetailCacheHits => "led_detail_cache_hits_total",
            MetricName::DetailFetchesSuccess => "led_detail_fetches_success_total",
            MetricName::DetailFetchesError => "led_detail_fetches_error_total",
            MetricName::DetailRateLimited => "led_detail_rate_limited_total",
            MetricName::EnrichCacheHits => "led_enrich_cache_hits_total",
            MetricName::EnrichBatchesDispatched => "led_enrich_batches_dispatched_total",
            MetricName::EnrichRateLimited => "led_enrich_rate_limited_total",
            MetricName::EnrichParseRetries => "led_enrich_parse_retries_total",
            MetricName::EnrichPlaceholders => "led_enrich_placeholders_total",
        }
    }
}

static CATALOG: Lazy<Vec<(MetricName, &'static str)>> = Lazy::new(|| {
    vec![
        (MetricName::ResolverCandidates, "Candidate events produced by source resolution"),
        (MetricName::DetailCacheHits, "Detail fetches served from the URL cache"),
        (MetricName::DetailFetchesSuccess, "Detail pages fetched and parsed"),
        (MetricName::DetailFetchesError, "Detail fetches exhausted without a response"),
        (MetricName::DetailRateLimited, "429 responses seen while fetching detail pages"),
        (MetricName::EnrichCacheHits, "Events served from the enrichment cache"),
        (MetricName::EnrichBatchesDispatched, "Enrichment batches sent to the backend"),
        (MetricName::EnrichRateLimited, "429 responses seen from the enrichment backend"),
        (MetricName::EnrichParseRetries, "Enrichment responses needing the newline-collapse reparse"),
        (MetricName::EnrichPlaceholders, "Dispatched events that fell back to placeholder output"),
    ]
});

/// Register descriptions with the installed recorder.
pub fn describe_all() {
    for (name, description) in CATALOG.iter() {
        ::metrics::describe_counter!(name.as_str(), *description);
    }
}

fn increment(name: MetricName) {
    ::metrics::counter!(name.as_str()).increment(1);
}

pub mod resolver {
    use super::MetricName;

    pub fn candidates(count: usize) {
        ::metrics::counter!(MetricName::ResolverCandidates.as_str()).increment(count as u64);
    }
}

pub mod detail {
    use super::{increment, MetricName};

    pub fn cache_hit() {
        increment(MetricName::DetailCacheHits);
    }

    pub fn fetch_success() {
        increment(MetricName::DetailFetchesSuccess);
    }

    pub fn fetch_error() {
        increment(MetricName::DetailFetchesError);
    }

    pub fn rate_limited() {
        increment(MetricName::DetailRateLimited);
    }
}

pub mod enrich {
    use super::{increment, MetricName};

    pub fn cache_hit() {
        increment(MetricName::EnrichCacheHits);
    }

    pub fn batch_dispatched() {
        increment(MetricName::EnrichBatchesDispatched);
    }

    pub fn rate_limited() {
        increment(MetricName::EnrichRateLimited);
    }

    pub fn parse_retry() {
        increment(MetricName::EnrichParseRetries);
    }

    pub fn placeholder() {
        increment(MetricName::EnrichPlaceholders);
    }
}
