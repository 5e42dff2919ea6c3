//! Brute-force lockout over failure counters in the session cache.
//!
//! One counter exists per username and one per client IP, each under
//! `errorCount:<subject>`. The arithmetic lives in
//! [`keystone_core::lockout`]; this engine performs the cache reads and writes.
//! Sequences of operations are not atomic: concurrent failures for the same
//! subject may undercount or lock twice.

use std::sync::Arc;

use keystone_cache::{CacheError, SessionCache};
use keystone_core::lockout::{
    lock_target, CounterStep, FailureCounter, FailureOutcome, LockPolicy, LockTarget,
    FIELD_ERROR_NUM, FIELD_IS_LOCKED, FIELD_LOGIN_TIME,
};

pub const ERROR_COUNT_PREFIX: &str = "errorCount:";

#[derive(Clone)]
pub struct LockoutEngine {
    cache: Arc<dyn SessionCache>,
}

impl LockoutEngine {
    pub fn new(cache: Arc<dyn SessionCache>) -> Self {
        Self { cache }
    }

    fn key(subject: &str) -> String {
        format!("{ERROR_COUNT_PREFIX}{subject}")
    }

    /// Seconds left in `subject`'s lock window, or `None` when it may log in.
    ///
    /// A lock whose deadline has passed is cleared here; the failure count is
    /// kept until the next failed attempt re-arms it.
    pub async fn check_locked(&self, subject: &str, now: i64) -> Result<Option<i64>, CacheError> {
        let key = Self::key(subject);
        let Some(counter) = FailureCounter::from_fields(&self.cache.hgetall(&key).await?) else {
            return Ok(None);
        };
        if let Some(remaining) = counter.lock_remaining(now) {
            return Ok(Some(remaining));
        }
        if counter.is_locked {
            self.cache.hset(&key, FIELD_IS_LOCKED, "false").await?;
            tracing::info!(subject = %subject, "Lock window elapsed");
        }
        Ok(None)
    }

    /// Charge a failed attempt to the IP and, when known, the username.
    ///
    /// When a count reaches the threshold the larger counter is locked (both on
    /// a tie) for the policy's duration.
    pub async fn record_failure(
        &self,
        identity: Option<&str>,
        ip: &str,
        policy: &LockPolicy,
        now: i64,
    ) -> Result<FailureOutcome, CacheError> {
        let deadline = now + policy.lock_secs;

        let identity_count = match identity {
            Some(name) => self.advance(name, policy, now, deadline).await?,
            None => None,
        };
        let ip_count = self.advance(ip, policy, now, deadline).await?;

        let Some(target) = lock_target(identity_count, ip_count, policy.threshold) else {
            let current = identity_count.unwrap_or(0).max(ip_count.unwrap_or(0));
            return Ok(FailureOutcome::Remaining {
                remaining: (policy.threshold - current).max(0),
                threshold: policy.threshold,
            });
        };

        let lock_fields = vec![
            (FIELD_IS_LOCKED.to_string(), "true".to_string()),
            (FIELD_LOGIN_TIME.to_string(), deadline.to_string()),
        ];
        if let (Some(name), LockTarget::Identity | LockTarget::Both) = (identity, target) {
            self.cache.hset_multiple(&Self::key(name), &lock_fields).await?;
            tracing::warn!(user = %name, minutes = policy.lock_minutes(), "Account locked");
        }
        if matches!(target, LockTarget::Ip | LockTarget::Both) {
            self.cache.hset_multiple(&Self::key(ip), &lock_fields).await?;
            tracing::warn!(ip = %ip, minutes = policy.lock_minutes(), "IP locked");
        }

        Ok(FailureOutcome::Locked {
            threshold: policy.threshold,
            minutes: policy.lock_minutes(),
        })
    }

    /// Delete both counters after a successful login.
    pub async fn clear(&self, identity: &str, ip: &str) -> Result<(), CacheError> {
        self.cache.del(&Self::key(identity)).await?;
        self.cache.del(&Self::key(ip)).await?;
        Ok(())
    }

    /// Apply one failure to a counter. Returns the new count, or `None` when
    /// the counter is inside a lock window and was left alone.
    async fn advance(
        &self,
        subject: &str,
        policy: &LockPolicy,
        now: i64,
        deadline: i64,
    ) -> Result<Option<i64>, CacheError> {
        let key = Self::key(subject);
        let Some(counter) = FailureCounter::from_fields(&self.cache.hgetall(&key).await?) else {
            self.cache
                .hset_multiple(&key, &FailureCounter::first_failure_fields(deadline))
                .await?;
            return Ok(Some(1));
        };

        let count = match counter.step(now, policy) {
            CounterStep::Hold => return Ok(None),
            CounterStep::Rearm => {
                self.cache
                    .hset_multiple(
                        &key,
                        &[
                            (FIELD_ERROR_NUM.to_string(), "1".to_string()),
                            (FIELD_IS_LOCKED.to_string(), "false".to_string()),
                        ],
                    )
                    .await?;
                1
            }
            CounterStep::Increment => self.cache.hincr_by(&key, FIELD_ERROR_NUM, 1).await?,
        };
        self.cache
            .hset(&key, FIELD_LOGIN_TIME, &deadline.to_string())
            .await?;
        Ok(Some(count))
    }
}

#[cfg(test)]
mod tests {
    use keystone_cache::MemoryCache;

    use super::*;

    const NOW: i64 = 1_700_000_000;

    fn engine() -> (LockoutEngine, Arc<MemoryCache>) {
        let cache = Arc::new(MemoryCache::new());
        (LockoutEngine::new(cache.clone()), cache)
    }

    #[tokio::test]
    async fn locks_at_threshold_for_policy_duration() {
        let (engine, _) = engine();
        let policy = LockPolicy::STRICT;

        let first = engine.record_failure(Some("alice"), "10.0.0.5", &policy, NOW).await.unwrap();
        assert_eq!(first, FailureOutcome::Remaining { remaining: 2, threshold: 3 });

        let second = engine.record_failure(Some("alice"), "10.0.0.5", &policy, NOW).await.unwrap();
        assert_eq!(second, FailureOutcome::Remaining { remaining: 1, threshold: 3 });

        let third = engine.record_failure(Some("alice"), "10.0.0.5", &policy, NOW).await.unwrap();
        assert_eq!(third, FailureOutcome::Locked { threshold: 3, minutes: 15 });

        assert_eq!(engine.check_locked("alice", NOW).await.unwrap(), Some(900));
        assert_eq!(engine.check_locked("10.0.0.5", NOW).await.unwrap(), Some(900));
    }

    #[tokio::test]
    async fn relaxed_policy_allows_five_attempts() {
        let (engine, _) = engine();
        let policy = LockPolicy::RELAXED;
        for _ in 0..4 {
            let outcome = engine.record_failure(Some("bob"), "1.1.1.1", &policy, NOW).await.unwrap();
            assert!(matches!(outcome, FailureOutcome::Remaining { .. }));
        }
        let outcome = engine.record_failure(Some("bob"), "1.1.1.1", &policy, NOW).await.unwrap();
        assert_eq!(outcome, FailureOutcome::Locked { threshold: 5, minutes: 30 });
        assert_eq!(engine.check_locked("bob", NOW + 60).await.unwrap(), Some(1740));
    }

    #[tokio::test]
    async fn elapsed_lock_is_cleared_but_count_kept() {
        let (engine, cache) = engine();
        let policy = LockPolicy::STRICT;
        for _ in 0..3 {
            engine.record_failure(Some("carol"), "2.2.2.2", &policy, NOW).await.unwrap();
        }

        let later = NOW + policy.lock_secs;
        assert_eq!(engine.check_locked("carol", later).await.unwrap(), None);

        let fields = cache.hgetall("errorCount:carol").await.unwrap();
        assert_eq!(fields.get(FIELD_IS_LOCKED).map(String::as_str), Some("false"));
        assert_eq!(fields.get(FIELD_ERROR_NUM).map(String::as_str), Some("3"));
    }

    #[tokio::test]
    async fn failure_after_elapsed_lock_rearms_at_one() {
        let (engine, cache) = engine();
        let policy = LockPolicy::STRICT;
        for _ in 0..3 {
            engine.record_failure(Some("dave"), "3.3.3.3", &policy, NOW).await.unwrap();
        }

        let later = NOW + policy.lock_secs + 1;
        assert_eq!(engine.check_locked("dave", later).await.unwrap(), None);
        let outcome = engine.record_failure(Some("dave"), "3.3.3.3", &policy, later).await.unwrap();
        assert_eq!(outcome, FailureOutcome::Remaining { remaining: 2, threshold: 3 });

        let fields = cache.hgetall("errorCount:dave").await.unwrap();
        assert_eq!(fields.get(FIELD_ERROR_NUM).map(String::as_str), Some("1"));
    }

    #[tokio::test]
    async fn unknown_user_only_charges_the_ip() {
        let (engine, cache) = engine();
        let policy = LockPolicy::STRICT;
        engine.record_failure(None, "4.4.4.4", &policy, NOW).await.unwrap();
        assert!(!cache.exists("errorCount:").await.unwrap());
        assert!(cache.exists("errorCount:4.4.4.4").await.unwrap());
    }

    #[tokio::test]
    async fn larger_counter_is_the_one_locked() {
        let (engine, _) = engine();
        let policy = LockPolicy::STRICT;
        // The IP has already failed twice for unknown usernames.
        engine.record_failure(None, "5.5.5.5", &policy, NOW).await.unwrap();
        engine.record_failure(None, "5.5.5.5", &policy, NOW).await.unwrap();

        let outcome = engine.record_failure(Some("erin"), "5.5.5.5", &policy, NOW).await.unwrap();
        assert!(matches!(outcome, FailureOutcome::Locked { .. }));
        assert!(engine.check_locked("5.5.5.5", NOW).await.unwrap().is_some());
        assert_eq!(engine.check_locked("erin", NOW).await.unwrap(), None);
    }

    #[tokio::test]
    async fn clear_removes_both_counters() {
        let (engine, cache) = engine();
        engine
            .record_failure(Some("frank"), "6.6.6.6", &LockPolicy::STRICT, NOW)
            .await
            .unwrap();
        engine.clear("frank", "6.6.6.6").await.unwrap();
        assert!(!cache.exists("errorCount:frank").await.unwrap());
        assert!(!cache.exists("errorCount:6.6.6.6").await.unwrap());
    }
}
