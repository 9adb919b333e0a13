//! In-memory TTL cache for repeated queries and embeddings.

use std::time::Duration;

use moka::sync::Cache;
use sha2::{Digest, Sha256};

/// Stable 16-hex-char key over a normalized query plus its parameters.
pub fn query_key(query: &str, params: &[(&str, String)]) -> String {
    let mut sorted: Vec<&(&str, String)> = params.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let mut hasher = Sha256::new();
    hasher.update(query.trim().to_lowercase().as_bytes());
    for (name, value) in sorted {
        hasher.update(b"|");
        hasher.update(name.as_bytes());
        hasher.update(b"=");
        hasher.update(value.as_bytes());
    }
    let digest = hex::encode(hasher.finalize());
    digest[..16].to_string()
}

/// Size-bound cache whose entries expire `ttl` after insertion.
/// A zero `ttl` disables caching.
pub struct QueryCache<V> {
    cache: Option<Cache<String, V>>,
}

impl<V> QueryCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        let cache = (!ttl.is_zero()).then(|| {
            Cache::builder()
                .max_capacity(max_entries.max(1) as u64)
                .time_to_live(ttl)
                .build()
        });
        Self { cache }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        self.cache.as_ref()?.get(key)
    }

    pub fn insert(&self, key: String, value: V) {
        if let Some(cache) = &self.cache {
            cache.insert(key, value);
        }
    }
}
