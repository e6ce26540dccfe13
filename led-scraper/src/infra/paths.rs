use std::path::PathBuf;

/// Environment-aware data root: `LED_DATA_DIR` wins, serverless deployments
/// (`VERCEL=1`) only get `/tmp`, everything else uses the working directory.
pub fn data_root() -> PathBuf {
    if let Ok(dir) = std::env::var("LED_DATA_DIR") {
        return PathBuf::from(dir);
    }
    if std::env::var("VERCEL").map(|v| v == "1").unwrap_or(false) {
        return PathBuf::from("/tmp");
    }
    PathBuf::from(".")
}

pub fn outputs_dir() -> PathBuf {
    data_root().join("outputs")
}

pub fn detail_cache_dir() -> PathBuf {
    outputs_dir().join("cache")
}

pub fn enrichment_cache_dir() -> PathBuf {
    outputs_dir().join("llm_cache")
}

/// Caching is on unless `LED_USE_CACHE` disables it.
pub fn cache_enabled() -> bool {
    match std::env::var("LED_USE_CACHE") {
        Ok(v) => !(v == "0" || v.eq_ignore_ascii_case("false")),
        Err(_) => true,
    }
}
