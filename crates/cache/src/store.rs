use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::CacheError;

/// Remaining lifetime of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    /// The key does not exist.
    Missing,
    /// The key exists and never expires.
    Persistent,
    /// The key expires after this long.
    Expires(Duration),
}

/// Hash-oriented key-value store with per-key expiry.
///
/// Every value is a hash of string fields. Writing fields into an existing key
/// keeps its expiry; writing into a missing key creates it without one.
/// Implementations must be safe for concurrent use. Individual operations are
/// atomic; sequences of operations are not.
#[async_trait]
pub trait SessionCache: Send + Sync {
    /// Set several fields at once. A no-op for an empty slice.
    async fn hset_multiple(&self, key: &str, fields: &[(String, String)]) -> Result<(), CacheError>;

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<(), CacheError>;

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, CacheError>;

    /// All fields of a hash; empty when the key is missing.
    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, CacheError>;

    /// Remove one field. Returns `true` if it existed.
    async fn hdel(&self, key: &str, field: &str) -> Result<bool, CacheError>;

    /// Atomically add `delta` to an integer field (missing counts as 0).
    async fn hincr_by(&self, key: &str, field: &str, delta: i64) -> Result<i64, CacheError>;

    async fn exists(&self, key: &str) -> Result<bool, CacheError>;

    /// Delete a key. Returns `true` if it existed.
    async fn del(&self, key: &str) -> Result<bool, CacheError>;

    /// Every live key starting with `prefix`.
    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, CacheError>;

    /// Set a key's expiry. Returns `false` when the key is missing.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, CacheError>;

    /// Drop a key's expiry. Returns `true` if an expiry was removed.
    async fn persist(&self, key: &str) -> Result<bool, CacheError>;

    async fn ttl(&self, key: &str) -> Result<Ttl, CacheError>;

    /// Round-trip to the backend.
    async fn ping(&self) -> Result<(), CacheError>;
}
