//! Pipeline assembly and the single inbound operation: resolve candidates,
//! fetch details, enrich, return the full record set.

use std::sync::Arc;

use chrono::NaiveDate;
use led_core::common::error::ScraperError;
use led_core::domain::EventRecord;
use led_core::storage::{FileJsonCache, JsonCache, MemoryJsonCache};
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::info;

use crate::infra::{http, paths};
use crate::llm::{ChatBackend, ReqwestChatBackend};
use crate::pipeline::config::PipelineConfig;
use crate::pipeline::detail::DetailFetcher;
use crate::pipeline::enrich::EnrichmentEngine;
use crate::pipeline::resolver::EventSourceResolver;

/// Caller-visible failure, tagged with an HTTP-equivalent status code.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("No events found for {date} at {url}.")]
    NoEvents { date: String, url: String },

    #[error("invalid target date '{0}': expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error(transparent)]
    Internal(#[from] ScraperError),
}

impl PipelineError {
    pub fn status_code(&self) -> u16 {
        match self {
            PipelineError::NoEvents { .. } | PipelineError::InvalidDate(_) => 400,
            PipelineError::Internal(_) => 500,
        }
    }
}

/// One pipeline instance: owns its HTTP client, both caches, and both
/// concurrency bounds. Nothing here is process-global, so parallel instances
/// (and tests) tune and isolate their own resources.
pub struct Pipeline {
    resolver: EventSourceResolver,
    fetcher: DetailFetcher,
    engine: EnrichmentEngine,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        detail_cache: Arc<dyn JsonCache>,
        enrichment_cache: Arc<dyn JsonCache>,
        backend: Arc<dyn ChatBackend>,
    ) -> Self {
        let client = http::browser_client();
        let detail_semaphore = Arc::new(Semaphore::new(config.detail_concurrency));
        let enrich_semaphore = Arc::new(Semaphore::new(config.enrich_concurrency));

        Self {
            resolver: EventSourceResolver::new(client.clone(), &config),
            fetcher: DetailFetcher::new(client, detail_cache, detail_semaphore, &config),
            engine: EnrichmentEngine::new(backend, enrichment_cache, enrich_semaphore, &config),
        }
    }

    /// Production wiring: file caches under the data root, chat backend from
    /// the environment.
    pub fn from_env() -> led_core::common::error::Result<Self> {
        let config = PipelineConfig::default();
        let (detail_cache, enrichment_cache): (Arc<dyn JsonCache>, Arc<dyn JsonCache>) =
            if paths::cache_enabled() {
                (
                    Arc::new(FileJsonCache::new(paths::detail_cache_dir())),
                    Arc::new(FileJsonCache::new(paths::enrichment_cache_dir())),
                )
            } else {
                info!("caching disabled, using in-memory stand-ins");
                (
                    Arc::new(MemoryJsonCache::new()),
                    Arc::new(MemoryJsonCache::new()),
                )
            };
        let backend = Arc::new(ReqwestChatBackend::from_env()?);
        Ok(Self::new(config, detail_cache, enrichment_cache, backend))
    }

    /// Resolution + detail fetching. Fails with a client-class error when
    /// the date is malformed or the source yields nothing.
    pub async fn collect(
        &self,
        landing_url: &str,
        target_date: &str,
    ) -> Result<Vec<EventRecord>, PipelineError> {
        if NaiveDate::parse_from_str(target_date, "%Y-%m-%d").is_err() {
            return Err(PipelineError::InvalidDate(target_date.to_string()));
        }

        let candidates = self.resolver.resolve(landing_url, target_date).await?;
        if candidates.is_empty() {
            return Err(PipelineError::NoEvents {
                date: target_date.to_string(),
                url: landing_url.to_string(),
            });
        }

        let records = self.fetcher.fetch_all(candidates).await?;
        info!(events = records.len(), "detail fetching complete");
        Ok(records)
    }

    /// Enrichment stage; mutates the records in place.
    pub async fn enrich_all(&self, events: &mut [EventRecord]) -> Result<(), PipelineError> {
        self.engine.enrich(events).await.map_err(PipelineError::from)
    }

    /// The full run: collect then enrich.
    pub async fn run(
        &self,
        landing_url: &str,
        target_date: &str,
    ) -> Result<Vec<EventRecord>, PipelineError> {
        let mut events = self.collect(landing_url, target_date).await?;
        info!(events = events.len(), "starting enrichment");
        self.enrich_all(&mut events).await?;
        Ok(events)
    }
}
