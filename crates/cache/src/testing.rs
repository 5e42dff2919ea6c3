use std::time::Duration;

use crate::error::CacheError;
use crate::store::{SessionCache, Ttl};

fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
    items
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Run the shared backend conformance suite.
///
/// Call this from a backend's test module with a fresh cache. Keys are
/// namespaced under `conformance:` so a shared Redis is not disturbed.
///
/// # Errors
///
/// Returns an error if the backend fails a command.
pub async fn run_cache_conformance_tests(cache: &dyn SessionCache) -> Result<(), CacheError> {
    test_missing_key(cache).await?;
    test_hash_fields(cache).await?;
    test_hincr(cache).await?;
    test_hdel(cache).await?;
    test_delete(cache).await?;
    test_scan_prefix(cache).await?;
    test_expiry_controls(cache).await?;
    cache.ping().await?;
    Ok(())
}

async fn test_missing_key(cache: &dyn SessionCache) -> Result<(), CacheError> {
    let key = "conformance:missing";
    assert!(!cache.exists(key).await?);
    assert!(cache.hget(key, "f").await?.is_none());
    assert!(cache.hgetall(key).await?.is_empty());
    assert_eq!(cache.ttl(key).await?, Ttl::Missing);
    assert!(!cache.expire(key, Duration::from_secs(5)).await?);
    Ok(())
}

async fn test_hash_fields(cache: &dyn SessionCache) -> Result<(), CacheError> {
    let key = "conformance:hash";
    cache
        .hset_multiple(key, &pairs(&[("a", "1"), ("b", "2")]))
        .await?;
    cache.hset(key, "c", "3").await?;
    cache.hset_multiple(key, &[]).await?;

    assert!(cache.exists(key).await?);
    assert_eq!(cache.hget(key, "a").await?.as_deref(), Some("1"));
    let all = cache.hgetall(key).await?;
    assert_eq!(all.len(), 3);
    assert_eq!(all.get("c").map(String::as_str), Some("3"));
    cache.del(key).await?;
    Ok(())
}

async fn test_hincr(cache: &dyn SessionCache) -> Result<(), CacheError> {
    let key = "conformance:counter";
    assert_eq!(cache.hincr_by(key, "n", 1).await?, 1);
    assert_eq!(cache.hincr_by(key, "n", 2).await?, 3);
    assert_eq!(cache.hget(key, "n").await?.as_deref(), Some("3"));
    cache.del(key).await?;
    Ok(())
}

async fn test_hdel(cache: &dyn SessionCache) -> Result<(), CacheError> {
    let key = "conformance:hdel";
    cache.hset_multiple(key, &pairs(&[("a", "1"), ("b", "2")])).await?;
    assert!(cache.hdel(key, "a").await?);
    assert!(!cache.hdel(key, "a").await?);
    assert!(cache.exists(key).await?);
    assert!(cache.hdel(key, "b").await?);
    assert!(!cache.exists(key).await?, "empty hash should disappear");
    Ok(())
}

async fn test_delete(cache: &dyn SessionCache) -> Result<(), CacheError> {
    let key = "conformance:delete";
    cache.hset(key, "f", "v").await?;
    assert!(cache.del(key).await?);
    assert!(!cache.exists(key).await?);
    assert!(!cache.del(key).await?, "second delete should report missing");
    Ok(())
}

async fn test_scan_prefix(cache: &dyn SessionCache) -> Result<(), CacheError> {
    for key in [
        "conformance:scan:abc1",
        "conformance:scan:abc2",
        "conformance:scan:xyz",
    ] {
        cache.hset(key, "f", "v").await?;
    }
    let mut found = cache.scan_prefix("conformance:scan:abc").await?;
    found.sort();
    assert_eq!(found, ["conformance:scan:abc1", "conformance:scan:abc2"]);

    // Glob metacharacters in the prefix are literal.
    assert!(cache.scan_prefix("conformance:scan:*").await?.is_empty());

    for key in found {
        cache.del(&key).await?;
    }
    cache.del("conformance:scan:xyz").await?;
    Ok(())
}

async fn test_expiry_controls(cache: &dyn SessionCache) -> Result<(), CacheError> {
    let key = "conformance:ttl";
    cache.hset(key, "f", "v").await?;
    assert_eq!(cache.ttl(key).await?, Ttl::Persistent);

    assert!(cache.expire(key, Duration::from_secs(100)).await?);
    match cache.ttl(key).await? {
        Ttl::Expires(left) => assert!(left <= Duration::from_secs(100)),
        other => panic!("expected an expiry, got {other:?}"),
    }

    // Writing a field keeps the expiry.
    cache.hset(key, "g", "w").await?;
    assert!(matches!(cache.ttl(key).await?, Ttl::Expires(_)));

    assert!(cache.persist(key).await?);
    assert_eq!(cache.ttl(key).await?, Ttl::Persistent);
    assert!(!cache.persist(key).await?);
    cache.del(key).await?;
    Ok(())
}
