use std::time::Duration;

/// Tuning knobs for one pipeline instance. Everything that used to be an
/// ambient constant (concurrency limits, retry counts, backoff schedule) is
/// injected through this struct so tests can shrink the waits and each run
/// can tune its own limits.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Landing page and calendar API request timeout.
    pub resolve_timeout: Duration,

    /// Simultaneous in-flight detail page fetches.
    pub detail_concurrency: usize,
    pub detail_max_retries: usize,
    pub detail_timeout: Duration,
    /// Pause between attempts after a transport error.
    pub detail_retry_pause: Duration,
    /// 429 wait is `(attempt + 1) * detail_rate_limit_step`.
    pub detail_rate_limit_step: Duration,

    /// Simultaneous in-flight enrichment requests. Tighter than the detail
    /// bound: the text backend tolerates far less load.
    pub enrich_concurrency: usize,
    pub enrich_batch_size: usize,
    pub enrich_max_retries: usize,
    pub enrich_backoff_base: Duration,
    pub enrich_backoff_factor: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            resolve_timeout: Duration::from_secs(12),
            detail_concurrency: 10,
            detail_max_retries: 3,
            detail_timeout: Duration::from_secs(15),
            detail_retry_pause: Duration::from_secs(1),
            detail_rate_limit_step: Duration::from_secs(2),
            enrich_concurrency: 3,
            enrich_batch_size: 15,
            enrich_max_retries: 5,
            enrich_backoff_base: Duration::from_secs(10),
            enrich_backoff_factor: 1.5,
        }
    }
}
