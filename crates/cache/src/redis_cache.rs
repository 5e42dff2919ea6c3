use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::{Config, Pool, Runtime};
use redis::AsyncCommands;

use crate::config::RedisConfig;
use crate::error::CacheError;
use crate::store::{SessionCache, Ttl};

/// Keys fetched per `SCAN` round trip.
const SCAN_BATCH: usize = 200;

/// Redis-backed [`SessionCache`] over a `deadpool-redis` pool.
///
/// Every key is stored under the configured prefix; keys returned from
/// [`scan_prefix`](SessionCache::scan_prefix) have it stripped again.
pub struct RedisCache {
    pool: Pool,
    prefix: String,
}

impl RedisCache {
    /// Create a pooled client. No connection is opened until first use.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Connection`] if the pool cannot be created.
    pub fn new(config: &RedisConfig) -> Result<Self, CacheError> {
        let pool = Config::from_url(&config.url)
            .builder()
            .map(|b| {
                b.max_size(config.pool_size)
                    .wait_timeout(Some(config.connection_timeout))
                    .runtime(Runtime::Tokio1)
                    .build()
            })
            .map_err(|e| CacheError::Connection(e.to_string()))?
            .map_err(|e| CacheError::Connection(e.to_string()))?;

        Ok(Self {
            pool,
            prefix: config.prefix.clone(),
        })
    }

    fn key(&self, key: &str) -> String {
        format!("{}{key}", self.prefix)
    }

    async fn conn(&self) -> Result<deadpool_redis::Connection, CacheError> {
        self.pool
            .get()
            .await
            .map_err(|e| CacheError::Connection(e.to_string()))
    }
}

fn backend(e: redis::RedisError) -> CacheError {
    CacheError::Backend(e.to_string())
}

/// Escape `SCAN MATCH` glob metacharacters.
fn escape_glob(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[async_trait]
impl SessionCache for RedisCache {
    async fn hset_multiple(&self, key: &str, fields: &[(String, String)]) -> Result<(), CacheError> {
        if fields.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn().await?;
        let () = conn
            .hset_multiple(self.key(key), fields)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<(), CacheError> {
        let mut conn = self.conn().await?;
        let _: i64 = conn.hset(self.key(key), field, value).await.map_err(backend)?;
        Ok(())
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn().await?;
        conn.hget(self.key(key), field).await.map_err(backend)
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, CacheError> {
        let mut conn = self.conn().await?;
        conn.hgetall(self.key(key)).await.map_err(backend)
    }

    async fn hdel(&self, key: &str, field: &str) -> Result<bool, CacheError> {
        let mut conn = self.conn().await?;
        let removed: i64 = conn.hdel(self.key(key), field).await.map_err(backend)?;
        Ok(removed > 0)
    }

    async fn hincr_by(&self, key: &str, field: &str, delta: i64) -> Result<i64, CacheError> {
        let mut conn = self.conn().await?;
        conn.hincr(self.key(key), field, delta)
            .await
            .map_err(backend)
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        let mut conn = self.conn().await?;
        conn.exists(self.key(key)).await.map_err(backend)
    }

    async fn del(&self, key: &str) -> Result<bool, CacheError> {
        let mut conn = self.conn().await?;
        let removed: i64 = conn.del(self.key(key)).await.map_err(backend)?;
        Ok(removed > 0)
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, CacheError> {
        let pattern = format!("{}*", escape_glob(&self.key(prefix)));
        let mut conn = self.conn().await?;
        let mut results = Vec::new();
        let mut cursor = 0u64;

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await
                .map_err(backend)?;

            results.extend(
                keys.into_iter()
                    .filter_map(|k| k.strip_prefix(&self.prefix).map(str::to_string)),
            );

            cursor = next;
            if cursor == 0 {
                break;
            }
        }

        // SCAN may return a key more than once.
        results.sort();
        results.dedup();
        Ok(results)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, CacheError> {
        let secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        let mut conn = self.conn().await?;
        conn.expire(self.key(key), secs).await.map_err(backend)
    }

    async fn persist(&self, key: &str) -> Result<bool, CacheError> {
        let mut conn = self.conn().await?;
        conn.persist(self.key(key)).await.map_err(backend)
    }

    async fn ttl(&self, key: &str) -> Result<Ttl, CacheError> {
        let mut conn = self.conn().await?;
        let secs: i64 = conn.ttl(self.key(key)).await.map_err(backend)?;
        Ok(match secs {
            -2 => Ttl::Missing,
            -1 => Ttl::Persistent,
            s => Ttl::Expires(Duration::from_secs(s.max(0).unsigned_abs())),
        })
    }

    async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.conn().await?;
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(backend)?;
        Ok(())
    }
}
