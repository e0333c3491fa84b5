//! Cache gateway backed by Redis, with an in-process LRU fallback.
//!
//! ## Configuration
//!
//! Environment variables:
//! - `REDIS_ENABLED`: Set to "false" to skip Redis (default: true)
//! - `REDIS_URL`: Redis connection URL (default: redis://localhost:6379)
//! - `CACHE_LRU_CAPACITY`: Entries kept in process when Redis is not
//!   connected (default: 2048)
//!
//! Backend failures are logged and absorbed: a failed read is a miss and
//! a failed write is a no-op.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use lru::LruCache;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use mapier_core::{defaults, CacheGateway};

struct Entry {
    value: String,
    expires_at: Instant,
}

/// Cache gateway shared by the orchestrator and the identity services.
#[derive(Clone)]
pub struct PlaceCache {
    inner: Arc<PlaceCacheInner>,
}

struct PlaceCacheInner {
    /// Redis connection manager (None if disabled or unreachable).
    redis: Option<ConnectionManager>,
    /// Used only when `redis` is None.
    local: Mutex<LruCache<String, Entry>>,
}

impl PlaceCache {
    /// Connect according to the environment. Never fails: an unreachable
    /// Redis leaves the in-process cache in charge.
    pub async fn from_env() -> Self {
        let enabled = std::env::var("REDIS_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);
        let redis_url = std::env::var("REDIS_URL").unwrap_or_else(|_| defaults::REDIS_URL.to_string());
        let capacity = std::env::var("CACHE_LRU_CAPACITY")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults::CACHE_LRU_CAPACITY);

        let redis = if enabled {
            match redis::Client::open(redis_url.as_str()) {
                Ok(client) => match ConnectionManager::new(client).await {
                    Ok(conn) => {
                        info!(
                            subsystem = "cache",
                            component = "redis",
                            "Redis cache enabled"
                        );
                        Some(conn)
                    }
                    Err(e) => {
                        warn!(
                            subsystem = "cache",
                            error = %e,
                            "Failed to connect to Redis, using in-process cache"
                        );
                        None
                    }
                },
                Err(e) => {
                    warn!(
                        subsystem = "cache",
                        error = %e,
                        "Invalid Redis URL, using in-process cache"
                    );
                    None
                }
            }
        } else {
            info!(subsystem = "cache", "Redis disabled via REDIS_ENABLED, using in-process cache");
            None
        };

        Self::build(redis, capacity)
    }

    /// In-process cache holding at most `capacity` entries.
    pub fn in_memory(capacity: usize) -> Self {
        Self::build(None, capacity)
    }

    fn build(redis: Option<ConnectionManager>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Arc::new(PlaceCacheInner {
                redis,
                local: Mutex::new(LruCache::new(capacity)),
            }),
        }
    }

    /// True when entries go to Redis.
    pub fn is_redis(&self) -> bool {
        self.inner.redis.is_some()
    }

    fn local_get(&self, key: &str) -> Option<String> {
        let mut local = self.inner.local.lock().ok()?;
        let expired = match local.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            local.pop(key);
        }
        None
    }

    fn local_set(&self, key: &str, value: &str, ttl: Duration) {
        if let Ok(mut local) = self.inner.local.lock() {
            local.put(
                key.to_string(),
                Entry {
                    value: value.to_string(),
                    expires_at: Instant::now() + ttl,
                },
            );
        }
    }

    fn local_invalidate(&self, key: &str) {
        if let Ok(mut local) = self.inner.local.lock() {
            local.pop(key);
        }
    }
}

#[async_trait]
impl CacheGateway for PlaceCache {
    async fn get(&self, key: &str) -> Option<String> {
        let Some(mut conn) = self.inner.redis.clone() else {
            return self.local_get(key);
        };
        match conn.get::<_, Option<String>>(key).await {
            Ok(value) => value,
            Err(e) => {
                warn!(subsystem = "cache", cache_key = key, error = %e, "Redis GET failed, treating as miss");
                None
            }
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) {
        let Some(mut conn) = self.inner.redis.clone() else {
            self.local_set(key, value, ttl);
            return;
        };
        let seconds = ttl.as_secs().max(1);
        match conn.set_ex::<_, _, ()>(key, value, seconds).await {
            Ok(()) => debug!(subsystem = "cache", cache_key = key, ttl_secs = seconds, "Cache SET"),
            Err(e) => warn!(subsystem = "cache", cache_key = key, error = %e, "Redis SET failed"),
        }
    }

    async fn invalidate(&self, key: &str) {
        let Some(mut conn) = self.inner.redis.clone() else {
            self.local_invalidate(key);
            return;
        };
        if let Err(e) = conn.del::<_, ()>(key).await {
            warn!(subsystem = "cache", cache_key = key, error = %e, "Redis DEL failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_round_trip_and_invalidate() {
        let cache = PlaceCache::in_memory(16);
        assert!(!cache.is_redis());
        cache.set("place:p1", "{}", Duration::from_secs(60)).await;
        assert_eq!(cache.get("place:p1").await.as_deref(), Some("{}"));
        cache.invalidate("place:p1").await;
        assert_eq!(cache.get("place:p1").await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire() {
        let cache = PlaceCache::in_memory(16);
        cache.set("search:abc", "[]", Duration::from_secs(300)).await;
        tokio::time::advance(Duration::from_secs(299)).await;
        assert!(cache.get("search:abc").await.is_some());
        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(cache.get("search:abc").await.is_none());
    }

    #[tokio::test]
    async fn test_capacity_evicts_least_recently_used() {
        let cache = PlaceCache::in_memory(2);
        cache.set("a", "1", Duration::from_secs(60)).await;
        cache.set("b", "2", Duration::from_secs(60)).await;
        cache.get("a").await;
        cache.set("c", "3", Duration::from_secs(60)).await;
        assert!(cache.get("a").await.is_some());
        assert!(cache.get("b").await.is_none());
        assert!(cache.get("c").await.is_some());
    }

    #[tokio::test]
    async fn test_zero_capacity_still_usable() {
        let cache = PlaceCache::in_memory(0);
        cache.set("a", "1", Duration::from_secs(60)).await;
        assert_eq!(cache.get("a").await.as_deref(), Some("1"));
    }
}
