use std::fs;
use std::path::PathBuf;

use serde_json::Value;
use tracing::debug;

use super::{content_token, JsonCache};

/// File-backed cache: one JSON file per key, named by the key's content
/// token, inside an instance-specific directory. Entries have no TTL and are
/// only replaced wholesale by a later `put` for the same key.
pub struct FileJsonCache {
    dir: PathBuf,
}

impl FileJsonCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        if let Err(e) = fs::create_dir_all(&dir) {
            debug!(dir = %dir.display(), error = %e, "could not create cache directory");
        }
        Self { dir }
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", content_token(key)))
    }
}

impl JsonCache for FileJsonCache {
    fn get(&self, key: &str) -> Option<Value> {
        let contents = fs::read_to_string(self.entry_path(key)).ok()?;
        match serde_json::from_str(&contents) {
            Ok(value) => Some(value),
            Err(e) => {
                // Corrupt entries are misses; a later put overwrites them.
                debug!(key, error = %e, "discarding unparseable cache entry");
                None
            }
        }
    }

    fn put(&self, key: &str, value: &Value) {
        let path = self.entry_path(key);
        let serialized = match serde_json::to_string(value) {
            Ok(s) => s,
            Err(e) => {
                debug!(key, error = %e, "could not serialize cache value");
                return;
            }
        };
        if let Err(e) = fs::write(&path, serialized) {
            debug!(path = %path.display(), error = %e, "cache write failed");
        }
    }
}
