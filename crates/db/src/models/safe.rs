use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use super::base::BaseFields;

/// The single `sys_safe` row.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SafetyPolicy {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub base: BaseFields,
    /// Days between forced password changes (0 = never).
    pub pwd_cycle: i32,
    /// 0: lock after 3 failures for 15 minutes. 1: after 5 for 30 minutes.
    pub pwd_login_limit: i32,
    /// 0: sessions never expire. Otherwise idle sessions expire.
    pub idle_time_setting: i32,
}

impl SafetyPolicy {
    pub fn sessions_expire(&self) -> bool {
        self.idle_time_setting != 0
    }
}

impl Default for SafetyPolicy {
    fn default() -> Self {
        Self {
            base: BaseFields::default(),
            pwd_cycle: 0,
            pwd_login_limit: 0,
            idle_time_setting: 1,
        }
    }
}

/// Body of a policy update.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SaveSafetyPolicy {
    #[validate(range(min = 0, max = 365, message = "Password cycle must be 0-365 days"))]
    pub pwd_cycle: i32,
    #[validate(range(min = 0, max = 1, message = "Login limit must be 0 or 1"))]
    pub pwd_login_limit: i32,
    #[validate(range(min = 0, max = 1, message = "Idle time setting must be 0 or 1"))]
    pub idle_time_setting: i32,
}
