use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::future::Cache as MokaCache;
use moka::Expiry;

use crate::error::Result;

/// Upper bound on in-process entries; least recently used go first.
pub const MEMORY_CACHE_CAPACITY: u64 = 10_000;

/// Storage behind [`crate::Cache`].
///
/// Backends may fail; `Cache` turns every failure into a safe default.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<()>;
    fn name(&self) -> &'static str;
}

#[derive(Clone)]
struct MemoryEntry {
    value: String,
    ttl: Option<Duration>,
}

/// Each entry expires after its own TTL; `None` never expires.
struct EntryTtl;

impl Expiry<String, MemoryEntry> for EntryTtl {
    fn expire_after_create(&self, _key: &String, entry: &MemoryEntry, _created_at: Instant) -> Option<Duration> {
        entry.ttl
    }

    fn expire_after_update(
        &self,
        _key: &String,
        entry: &MemoryEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        entry.ttl
    }
}

/// In-process cache. Expired entries are evicted by moka's housekeeping,
/// whether or not they are ever read again.
#[derive(Clone)]
pub struct MemoryBackend {
    inner: MokaCache<String, MemoryEntry>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::with_capacity(MEMORY_CACHE_CAPACITY)
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(max_capacity: u64) -> Self {
        let inner = MokaCache::builder()
            .max_capacity(max_capacity)
            .expire_after(EntryTtl)
            .build();
        Self { inner }
    }

    /// Entry count after pending evictions have run.
    pub async fn len(&self) -> u64 {
        self.inner.run_pending_tasks().await;
        self.inner.entry_count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Writes a raw string, bypassing serialization.
    pub async fn insert_raw(&self, key: &str, value: impl Into<String>) {
        let entry = MemoryEntry {
            value: value.into(),
            ttl: None,
        };
        self.inner.insert(key.to_string(), entry).await;
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.inner.get(key).await.map(|entry| entry.value))
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<()> {
        self.inner.insert(key.to_string(), MemoryEntry { value, ttl }).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.inner.invalidate(key).await;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(feature = "redis-cache")]
pub mod redis_store {
    use super::*;
    use crate::error::OsintError;
    use ::redis::aio::MultiplexedConnection;
    use ::redis::AsyncCommands;
    use tokio::time::timeout;

    /// Redis backend; every command runs under `op_timeout`.
    pub struct RedisBackend {
        conn: MultiplexedConnection,
        op_timeout: Duration,
    }

    impl RedisBackend {
        /// Connects and PINGs once. The caller decides how to degrade on failure.
        pub async fn connect(url: &str, op_timeout: Duration) -> Result<Self> {
            let client = ::redis::Client::open(url)
                .map_err(|e| OsintError::Unavailable(format!("invalid redis url: {e}")))?;
            let mut conn = timeout(op_timeout, client.get_multiplexed_async_connection())
                .await
                .map_err(|_| OsintError::Unavailable("redis connect timed out".into()))?
                .map_err(|e| OsintError::Unavailable(e.to_string()))?;
            timeout(op_timeout, ::redis::cmd("PING").query_async::<String>(&mut conn))
                .await
                .map_err(|_| OsintError::Unavailable("redis ping timed out".into()))?
                .map_err(|e| OsintError::Unavailable(e.to_string()))?;
            Ok(Self { conn, op_timeout })
        }

        async fn bounded<T, F>(&self, op: &'static str, fut: F) -> Result<T>
        where
            F: std::future::Future<Output = ::redis::RedisResult<T>>,
        {
            timeout(self.op_timeout, fut)
                .await
                .map_err(|_| OsintError::Unavailable(format!("redis {op} timed out")))?
                .map_err(|e| OsintError::Unavailable(format!("redis {op} failed: {e}")))
        }
    }

    #[async_trait]
    impl CacheBackend for RedisBackend {
        async fn get(&self, key: &str) -> Result<Option<String>> {
            let mut conn = self.conn.clone();
            self.bounded("GET", async move { conn.get::<_, Option<String>>(key).await })
                .await
        }

        async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<()> {
            let mut conn = self.conn.clone();
            match ttl {
                Some(ttl) => {
                    let secs = ttl.as_secs().max(1);
                    self.bounded("SETEX", async move {
                        conn.set_ex::<_, _, ()>(key, value, secs).await
                    })
                    .await
                }
                None => {
                    self.bounded("SET", async move { conn.set::<_, _, ()>(key, value).await })
                        .await
                }
            }
        }

        async fn delete(&self, key: &str) -> Result<()> {
            let mut conn = self.conn.clone();
            self.bounded("DEL", async move { conn.del::<_, ()>(key).await })
                .await
        }

        fn name(&self) -> &'static str {
            "redis"
        }
    }
}
