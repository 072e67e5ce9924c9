//! Best-effort key/value cache with TTL.
//!
//! Caching is an optimization only: every operation degrades to a safe default
//! (`None` / `false`) when the backend is missing, unreachable or returns
//! corrupted data. Nothing in here returns an error to the caller.

mod key;
mod store;

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};

pub use key::{build_cache_key, canonical_json};
#[cfg(feature = "redis-cache")]
pub use store::redis_store::RedisBackend;
pub use store::{CacheBackend, MemoryBackend};

#[derive(Clone, Default)]
pub struct Cache {
    backend: Option<Arc<dyn CacheBackend>>,
}

impl Cache {
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self {
            backend: Some(backend),
        }
    }

    /// No backend: `get` always misses, `set`/`delete` always report `false`.
    pub fn disabled() -> Self {
        Self { backend: None }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    /// Builds the cache for the configured backend. Connection failures are
    /// logged once and leave the cache disabled; there is no retry loop.
    pub async fn connect(redis_url: Option<&str>, op_timeout: Duration) -> Self {
        match redis_url {
            Some(url) => Self::connect_redis(url, op_timeout).await,
            None if cfg!(feature = "memory-cache") => {
                info!("no REDIS_URL configured, using in-process cache");
                Self::in_memory()
            }
            None => {
                info!("no cache backend configured, caching disabled");
                Self::disabled()
            }
        }
    }

    #[cfg(feature = "redis-cache")]
    async fn connect_redis(url: &str, op_timeout: Duration) -> Self {
        match RedisBackend::connect(url, op_timeout).await {
            Ok(backend) => {
                info!("redis cache initialized");
                Self::new(Arc::new(backend))
            }
            Err(err) => {
                warn!(error = %err, "redis connection failed, cache disabled");
                Self::disabled()
            }
        }
    }

    #[cfg(not(feature = "redis-cache"))]
    async fn connect_redis(_url: &str, _op_timeout: Duration) -> Self {
        warn!("REDIS_URL is set but the `redis-cache` feature is not enabled, cache disabled");
        Self::disabled()
    }

    pub fn is_available(&self) -> bool {
        self.backend.is_some()
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.as_ref().map_or("disabled", |b| b.name())
    }

    pub async fn get(&self, key: &str) -> Option<Value> {
        let backend = self.backend.as_ref()?;
        let raw = match backend.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                error!(cache_key = key, error = %err, "cache get failed");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                error!(cache_key = key, error = %err, "corrupted cache entry, deleting");
                let backend = Arc::clone(backend);
                let key = key.to_string();
                tokio::spawn(async move {
                    if let Err(err) = backend.delete(&key).await {
                        debug!(cache_key = %key, error = %err, "failed to delete corrupted entry");
                    }
                });
                None
            }
        }
    }

    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Option<Duration>) -> bool {
        let Some(backend) = self.backend.as_ref() else {
            return false;
        };
        let serialized = match serde_json::to_string(value) {
            Ok(serialized) => serialized,
            Err(err) => {
                error!(cache_key = key, error = %err, "failed to serialize cache value");
                return false;
            }
        };
        match backend.set(key, serialized, ttl).await {
            Ok(()) => true,
            Err(err) => {
                error!(cache_key = key, error = %err, "cache set failed");
                false
            }
        }
    }

    pub async fn delete(&self, key: &str) -> bool {
        let Some(backend) = self.backend.as_ref() else {
            return false;
        };
        match backend.delete(key).await {
            Ok(()) => true,
            Err(err) => {
                error!(cache_key = key, error = %err, "cache delete failed");
                false
            }
        }
    }
}
