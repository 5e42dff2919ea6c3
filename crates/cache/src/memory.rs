use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::error::CacheError;
use crate::store::{SessionCache, Ttl};

#[derive(Debug, Default)]
struct Entry {
    fields: HashMap<String, String>,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// In-process [`SessionCache`] backed by a [`DashMap`].
///
/// Expired keys are dropped when touched, on every prefix scan, and by the
/// optional [`MemoryCache::spawn_sweeper`] task. Time comes from
/// [`tokio::time::Instant`], so paused-clock tests can advance it.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: DashMap<String, Entry>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys, expired ones included until swept.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every expired key. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, e| !e.is_expired(now));
        before.saturating_sub(self.entries.len())
    }

    /// Purge expired keys every `period` until the cache is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(cache) = weak.upgrade() else {
                    break;
                };
                let purged = cache.purge_expired();
                if purged > 0 {
                    tracing::debug!(purged, "Expired cache keys swept");
                }
            }
        })
    }

    /// Remove `key` if it has expired. Returns `true` when a live entry remains.
    fn evict_if_expired(&self, key: &str) -> bool {
        let now = Instant::now();
        self.entries.remove_if(key, |_, e| e.is_expired(now));
        self.entries.contains_key(key)
    }

    /// Run `f` against the live entry for `key`, creating it if needed.
    fn with_entry<R>(&self, key: &str, f: impl FnOnce(&mut Entry) -> R) -> R {
        let now = Instant::now();
        match self.entries.entry(key.to_string()) {
            MapEntry::Occupied(mut occupied) => {
                if occupied.get().is_expired(now) {
                    *occupied.get_mut() = Entry::default();
                }
                f(occupied.get_mut())
            }
            MapEntry::Vacant(vacant) => {
                let mut entry = Entry::default();
                let result = f(&mut entry);
                vacant.insert(entry);
                result
            }
        }
    }
}

#[async_trait]
impl SessionCache for MemoryCache {
    async fn hset_multiple(&self, key: &str, fields: &[(String, String)]) -> Result<(), CacheError> {
        if fields.is_empty() {
            return Ok(());
        }
        self.with_entry(key, |e| {
            for (field, value) in fields {
                e.fields.insert(field.clone(), value.clone());
            }
        });
        Ok(())
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<(), CacheError> {
        self.with_entry(key, |e| {
            e.fields.insert(field.to_string(), value.to_string());
        });
        Ok(())
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, CacheError> {
        if !self.evict_if_expired(key) {
            return Ok(None);
        }
        Ok(self
            .entries
            .get(key)
            .and_then(|e| e.fields.get(field).cloned()))
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, CacheError> {
        if !self.evict_if_expired(key) {
            return Ok(HashMap::new());
        }
        Ok(self
            .entries
            .get(key)
            .map(|e| e.fields.clone())
            .unwrap_or_default())
    }

    async fn hdel(&self, key: &str, field: &str) -> Result<bool, CacheError> {
        if !self.evict_if_expired(key) {
            return Ok(false);
        }
        let removed = self
            .entries
            .get_mut(key)
            .is_some_and(|mut e| e.fields.remove(field).is_some());
        // Redis drops a hash once its last field is gone.
        self.entries.remove_if(key, |_, e| e.fields.is_empty());
        Ok(removed)
    }

    async fn hincr_by(&self, key: &str, field: &str, delta: i64) -> Result<i64, CacheError> {
        self.with_entry(key, |e| {
            let current = match e.fields.get(field) {
                Some(v) => v.parse::<i64>().map_err(|_| {
                    CacheError::Backend(format!("hash field {field} is not an integer"))
                })?,
                None => 0,
            };
            let next = current + delta;
            e.fields.insert(field.to_string(), next.to_string());
            Ok(next)
        })
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.evict_if_expired(key))
    }

    async fn del(&self, key: &str) -> Result<bool, CacheError> {
        let live = self.evict_if_expired(key);
        Ok(live && self.entries.remove(key).is_some())
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, CacheError> {
        self.purge_expired();
        Ok(self
            .entries
            .iter()
            .filter(|e| e.key().starts_with(prefix))
            .map(|e| e.key().clone())
            .collect())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, CacheError> {
        if !self.evict_if_expired(key) {
            return Ok(false);
        }
        Ok(self
            .entries
            .get_mut(key)
            .map(|mut e| e.expires_at = Some(Instant::now() + ttl))
            .is_some())
    }

    async fn persist(&self, key: &str) -> Result<bool, CacheError> {
        if !self.evict_if_expired(key) {
            return Ok(false);
        }
        Ok(self
            .entries
            .get_mut(key)
            .is_some_and(|mut e| e.expires_at.take().is_some()))
    }

    async fn ttl(&self, key: &str) -> Result<Ttl, CacheError> {
        if !self.evict_if_expired(key) {
            return Ok(Ttl::Missing);
        }
        let now = Instant::now();
        Ok(match self.entries.get(key).map(|e| e.expires_at) {
            None => Ttl::Missing,
            Some(None) => Ttl::Persistent,
            Some(Some(at)) => Ttl::Expires(at.saturating_duration_since(now)),
        })
    }

    async fn ping(&self) -> Result<(), CacheError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::run_cache_conformance_tests;

    #[tokio::test]
    async fn conformance() {
        let cache = MemoryCache::new();
        run_cache_conformance_tests(&cache).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn keys_expire_after_ttl() {
        let cache = MemoryCache::new();
        cache.hset("k", "f", "v").await.unwrap();
        assert!(cache.expire("k", Duration::from_secs(10)).await.unwrap());

        tokio::time::advance(Duration::from_secs(9)).await;
        assert_eq!(cache.hget("k", "f").await.unwrap().as_deref(), Some("v"));
        assert_eq!(
            cache.ttl("k").await.unwrap(),
            Ttl::Expires(Duration::from_secs(1))
        );

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(!cache.exists("k").await.unwrap());
        assert_eq!(cache.ttl("k").await.unwrap(), Ttl::Missing);
        assert!(cache.scan_prefix("k").await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn writing_into_expired_key_starts_fresh() {
        let cache = MemoryCache::new();
        cache.hset("k", "old", "1").await.unwrap();
        cache.expire("k", Duration::from_secs(1)).await.unwrap();
        tokio::time::advance(Duration::from_secs(2)).await;

        assert_eq!(cache.hincr_by("k", "n", 1).await.unwrap(), 1);
        assert_eq!(cache.hget("k", "old").await.unwrap(), None);
        assert_eq!(cache.ttl("k").await.unwrap(), Ttl::Persistent);
    }

    #[tokio::test(start_paused = true)]
    async fn persist_removes_expiry() {
        let cache = MemoryCache::new();
        cache.hset("k", "f", "v").await.unwrap();
        cache.expire("k", Duration::from_secs(5)).await.unwrap();
        assert!(cache.persist("k").await.unwrap());
        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(cache.exists("k").await.unwrap());
        assert!(!cache.persist("k").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn expired_keys_are_removed_by_scan_and_sweep() {
        let cache = Arc::new(MemoryCache::new());
        for key in ["login:a", "login:b", "other"] {
            cache.hset(key, "f", "v").await.unwrap();
            cache.expire(key, Duration::from_secs(5)).await.unwrap();
        }
        cache.hset("login:c", "f", "v").await.unwrap();

        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(cache.len(), 4);
        assert_eq!(cache.scan_prefix("login:").await.unwrap(), vec!["login:c"]);
        assert_eq!(cache.len(), 1);

        cache.hset("other", "f", "v").await.unwrap();
        cache.expire("other", Duration::from_secs(5)).await.unwrap();
        let sweeper = cache.spawn_sweeper(Duration::from_secs(10));
        tokio::time::advance(Duration::from_secs(11)).await;
        tokio::task::yield_now().await;
        assert_eq!(cache.len(), 1);
        assert!(cache.exists("login:c").await.unwrap());
        sweeper.abort();
    }

    #[tokio::test]
    async fn hincr_rejects_non_integer() {
        let cache = MemoryCache::new();
        cache.hset("k", "f", "abc").await.unwrap();
        assert!(matches!(
            cache.hincr_by("k", "f", 1).await,
            Err(CacheError::Backend(_))
        ));
    }
}
