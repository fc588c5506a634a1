//! Bounded LRU cache for embedding vectors, keyed by normalized text.
//! Correctness over throughput: a single mutex around the whole map.

use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;

use assistant_config::constants::rag::EMBEDDING_CACHE_CAPACITY;

pub struct EmbeddingCache {
    inner: Mutex<LruCache<String, Vec<f32>>>,
}

impl EmbeddingCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap();
        Self { inner: Mutex::new(LruCache::new(capacity)) }
    }

    pub fn get(&self, text: &str) -> Option<Vec<f32>> {
        self.inner.lock().get(&normalize(text)).cloned()
    }

    pub fn put(&self, text: &str, vector: Vec<f32>) {
        self.inner.lock().put(normalize(text), vector);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for EmbeddingCache {
    fn default() -> Self {
        Self::new(EMBEDDING_CACHE_CAPACITY)
    }
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_least_recently_used() {
        let cache = EmbeddingCache::new(2);
        cache.put("a", vec![1.0]);
        cache.put("b", vec![2.0]);
        cache.get("a"); // touch a, making b the LRU entry
        cache.put("c", vec![3.0]);

        assert!(cache.get("a").is_some());
        assert!(cache.get("b").is_none());
        assert!(cache.get("c").is_some());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn normalizes_key_case_and_whitespace() {
        let cache = EmbeddingCache::new(10);
        cache.put("  Horaires Portails  ", vec![0.5]);
        assert_eq!(cache.get("horaires portails"), Some(vec![0.5]));
    }
}
