use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;

use super::JsonCache;

/// In-memory stand-in for [`FileJsonCache`], used in tests and when caching
/// is disabled. Honors the same never-throw contract.
#[derive(Default)]
pub struct MemoryJsonCache {
    entries: Mutex<HashMap<String, Value>>,
}

impl MemoryJsonCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl JsonCache for MemoryJsonCache {
    fn get(&self, key: &str) -> Option<Value> {
        let entries = self.entries.lock().ok()?;
        entries.get(key).cloned()
    }

    fn put(&self, key: &str, value: &Value) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), value.clone());
        }
    }
}
