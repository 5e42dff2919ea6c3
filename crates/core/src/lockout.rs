//! Failed-login counter arithmetic.
//!
//! A counter is stored as a cache hash with three fields (`errorNum`,
//! `loginTime`, `isLocked`). This module only decides what should happen to a
//! counter; the API layer reads and writes the hash.

use std::collections::HashMap;

use crate::error::CoreError;

pub const FIELD_ERROR_NUM: &str = "errorNum";
pub const FIELD_LOGIN_TIME: &str = "loginTime";
pub const FIELD_IS_LOCKED: &str = "isLocked";

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// How many failures trigger a lock, and for how long.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockPolicy {
    pub threshold: i64,
    pub lock_secs: i64,
}

impl LockPolicy {
    /// 3 failures, locked for 15 minutes.
    pub const STRICT: Self = Self {
        threshold: 3,
        lock_secs: 15 * 60,
    };

    /// 5 failures, locked for 30 minutes.
    pub const RELAXED: Self = Self {
        threshold: 5,
        lock_secs: 30 * 60,
    };

    /// Map the safety record's `pwd_login_limit` (0 or 1) to a policy.
    pub fn from_login_limit(limit: i32) -> Self {
        if limit == 1 {
            Self::RELAXED
        } else {
            Self::STRICT
        }
    }

    pub fn lock_minutes(&self) -> i64 {
        self.lock_secs / 60
    }
}

// ---------------------------------------------------------------------------
// Counter
// ---------------------------------------------------------------------------

/// A decoded failure counter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailureCounter {
    pub error_num: i64,
    /// Unix-seconds deadline; only meaningful while `is_locked`.
    pub login_time: i64,
    pub is_locked: bool,
}

/// What a failed attempt does to one existing counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterStep {
    /// The counter is inside an active lock window and is left untouched.
    Hold,
    /// A previous lock has elapsed; restart counting at 1.
    Rearm,
    /// Count one more failure.
    Increment,
}

impl FailureCounter {
    /// Decode a counter from its hash fields. Returns `None` for an empty hash.
    pub fn from_fields(fields: &HashMap<String, String>) -> Option<Self> {
        if fields.is_empty() {
            return None;
        }
        let int = |name: &str| {
            fields
                .get(name)
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(0)
        };
        Some(Self {
            error_num: int(FIELD_ERROR_NUM),
            login_time: int(FIELD_LOGIN_TIME),
            is_locked: fields.get(FIELD_IS_LOCKED).map(String::as_str) == Some("true"),
        })
    }

    /// Fields of a counter that has just seen its first failure.
    pub fn first_failure_fields(deadline: i64) -> Vec<(String, String)> {
        vec![
            (FIELD_ERROR_NUM.to_string(), "1".to_string()),
            (FIELD_LOGIN_TIME.to_string(), deadline.to_string()),
            (FIELD_IS_LOCKED.to_string(), "false".to_string()),
        ]
    }

    /// Seconds left in the lock window, or `None` when not locked at `now`.
    pub fn lock_remaining(&self, now: i64) -> Option<i64> {
        (self.is_locked && now < self.login_time).then(|| self.login_time - now)
    }

    /// Decide how a failed attempt at `now` advances this counter.
    ///
    /// A counter that already reached the threshold but is no longer inside
    /// its lock window restarts at 1 rather than counting past the threshold.
    pub fn step(&self, now: i64, policy: &LockPolicy) -> CounterStep {
        if self.lock_remaining(now).is_some() {
            CounterStep::Hold
        } else if self.error_num >= policy.threshold {
            CounterStep::Rearm
        } else {
            CounterStep::Increment
        }
    }
}

/// Whole minutes left in a lock window, rounded up so a live lock never reads as 0.
pub fn minutes_remaining(secs: i64) -> i64 {
    (secs.max(0) + 59) / 60
}

// ---------------------------------------------------------------------------
// Lock target selection
// ---------------------------------------------------------------------------

/// Which counter(s) a threshold hit locks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockTarget {
    Identity,
    Ip,
    Both,
}

/// Pick the counter to lock after a failure.
///
/// Returns `None` while neither count has reached the threshold. When one has,
/// the larger count is locked; equal counts lock both. `None` counts are
/// counters that were not advanced by this attempt.
pub fn lock_target(identity: Option<i64>, ip: Option<i64>, threshold: i64) -> Option<LockTarget> {
    let hit = |c: Option<i64>| c.is_some_and(|c| c >= threshold);
    if !hit(identity) && !hit(ip) {
        return None;
    }
    let (a, b) = (identity.unwrap_or(0), ip.unwrap_or(0));
    Some(match a.cmp(&b) {
        std::cmp::Ordering::Greater => LockTarget::Identity,
        std::cmp::Ordering::Less => LockTarget::Ip,
        std::cmp::Ordering::Equal => LockTarget::Both,
    })
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// The user-facing result of recording a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    Remaining { remaining: i64, threshold: i64 },
    Locked { threshold: i64, minutes: i64 },
}

impl FailureOutcome {
    pub fn into_error(self) -> CoreError {
        match self {
            FailureOutcome::Remaining {
                remaining,
                threshold,
            } => CoreError::InvalidCredentials {
                message: format!(
                    "Invalid username or password; {remaining} of {threshold} attempts remaining"
                ),
                remaining,
            },
            FailureOutcome::Locked { threshold, minutes } => CoreError::AccountLocked {
                message: format!(
                    "Invalid username or password {threshold} times; locked for {minutes} minutes"
                ),
                minutes,
            },
        }
    }
}

/// Error for an attempt made while `subject` ("Account" or "IP") is locked.
pub fn locked_error(subject: &str, secs_remaining: i64) -> CoreError {
    let minutes = minutes_remaining(secs_remaining);
    CoreError::AccountLocked {
        message: format!("{subject} is locked; try again in {minutes} minutes"),
        minutes,
    }
}
