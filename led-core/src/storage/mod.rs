mod file;
mod memory;

pub use file::FileJsonCache;
pub use memory::MemoryJsonCache;

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Best-effort keyed JSON store. Implementations must be total: `get`
/// resolves any failure (missing entry, unreadable file, corrupt JSON) to a
/// miss and `put` swallows write errors. The pipeline never aborts because
/// of its caches.
pub trait JsonCache: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;
    fn put(&self, key: &str, value: &Value);
}

/// Filename-safe content token for a semantic cache key.
pub fn content_token(key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    hex::encode(digest)
}
