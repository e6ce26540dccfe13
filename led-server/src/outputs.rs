//! Per-date output artifacts and the janitor that keeps the outputs
//! directory from growing without bound. All writes are best-effort; a full
//! disk never fails a scrape that already succeeded.

use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};

use led_core::domain::EventRecord;
use led_scraper::infra::paths;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, warn};

/// Write the pre-enrichment artifacts: the full collected records and the
/// id/description slice that feeds the text backend.
pub fn save_collected(date: &str, events: &[EventRecord]) {
    let dir = paths::outputs_dir();
    save_json(&dir.join(format!("raw_{date}.json")), &events);

    let cleaned: Vec<serde_json::Value> = events
        .iter()
        .map(|e| json!({ "id": e.id, "desc": e.description }))
        .collect();
    save_json(&dir.join(format!("cleaned_{date}.json")), &cleaned);
}

pub fn save_final(date: &str, events: &[EventRecord]) {
    save_json(&paths::outputs_dir().join(format!("final_{date}.json")), &events);
}

fn save_json<T: Serialize>(path: &Path, value: &T) {
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    let serialized = match serde_json::to_string_pretty(value) {
        Ok(s) => s,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "output not serializable");
            return;
        }
    };
    match fs::write(path, serialized) {
        Ok(()) => debug!(path = %path.display(), "output artifact written"),
        Err(e) => warn!(path = %path.display(), error = %e, "output write failed"),
    }
}

/// Delete files in `dir` older than `max_age_days`. Subdirectories (the
/// caches) are left alone.
pub fn cleanup_old_files(dir: &Path, max_age_days: u64) {
    let cutoff = Duration::from_secs(max_age_days * 86_400);
    let now = SystemTime::now();

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!(dir = %dir.display(), error = %e, "outputs directory not readable");
            return;
        }
    };

    let mut removed = 0usize;
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Ok(modified) = entry.metadata().and_then(|m| m.modified()) else {
            continue;
        };
        let aged_out = now
            .duration_since(modified)
            .map(|age| age > cutoff)
            .unwrap_or(false);
        if aged_out && fs::remove_file(&path).is_ok() {
            removed += 1;
        }
    }
    if removed > 0 {
        info!(removed, dir = %dir.display(), "cleaned up aged output files");
    }
}
