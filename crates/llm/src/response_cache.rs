//! Fingerprint-keyed response cache. Two backings: an in-process DashMap
//! for tests and single-node deployments, and a Redis-backed one for
//! multi-instance deployments, both behind `assistant_core::ResponseCache`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use assistant_core::traits::ResponseCache;

/// `blake3(user_id + "\0" + message)`, hex-encoded. Stable across process
/// restarts so a cache hit survives a redeploy.
pub fn fingerprint(user_id: &str, message: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(user_id.as_bytes());
    hasher.update(b"\0");
    hasher.update(message.as_bytes());
    hasher.finalize().to_hex().to_string()
}

struct Entry {
    payload: String,
    expires_at: Instant,
}

#[derive(Default)]
pub struct InMemoryResponseCache {
    entries: DashMap<String, Entry>,
}

impl InMemoryResponseCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResponseCache for InMemoryResponseCache {
    async fn get(&self, fingerprint: &str) -> Option<String> {
        let entry = self.entries.get(fingerprint)?;
        if entry.expires_at < Instant::now() {
            drop(entry);
            self.entries.remove(fingerprint);
            return None;
        }
        Some(entry.payload.clone())
    }

    async fn set(&self, fingerprint: &str, payload: &str, ttl_secs: u64) {
        self.entries.insert(
            fingerprint.to_string(),
            Entry { payload: payload.to_string(), expires_at: Instant::now() + Duration::from_secs(ttl_secs) },
        );
    }
}

/// Redis-backed response cache using native key TTLs for eviction.
pub struct RedisResponseCache {
    manager: Arc<redis::aio::ConnectionManager>,
}

impl RedisResponseCache {
    pub async fn connect(url: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(url)?;
        let manager = client.get_connection_manager().await?;
        Ok(Self { manager: Arc::new(manager) })
    }
}

#[async_trait]
impl ResponseCache for RedisResponseCache {
    async fn get(&self, fingerprint: &str) -> Option<String> {
        use redis::AsyncCommands;
        let mut conn = (*self.manager).clone();
        conn.get(fingerprint).await.ok()
    }

    async fn set(&self, fingerprint: &str, payload: &str, ttl_secs: u64) {
        use redis::AsyncCommands;
        let mut conn = (*self.manager).clone();
        let _: Result<(), _> = conn.set_ex(fingerprint, payload, ttl_secs).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_stable_and_sensitive_to_inputs() {
        let a = fingerprint("u1", "bonjour");
        let b = fingerprint("u1", "bonjour");
        let c = fingerprint("u2", "bonjour");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[tokio::test]
    async fn in_memory_cache_expires_entries_after_ttl() {
        let cache = InMemoryResponseCache::new();
        cache.set("k", "v", 0).await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(cache.get("k").await.is_none());
    }

    #[tokio::test]
    async fn in_memory_cache_returns_value_within_ttl() {
        let cache = InMemoryResponseCache::new();
        cache.set("k", "v", 60).await;
        assert_eq!(cache.get("k").await.as_deref(), Some("v"));
    }
}
