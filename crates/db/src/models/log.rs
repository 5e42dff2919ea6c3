use keystone_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from `sys_log`.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLog {
    pub id: DbId,
    pub ip: String,
    pub title: String,
    pub log_type: String,
    pub method: String,
    pub url: String,
    pub info: String,
    pub state: String,
    pub creator_id: Option<DbId>,
    pub create_time: Timestamp,
}

/// Values for a new audit entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewAuditLog {
    pub ip: String,
    pub title: String,
    pub log_type: String,
    pub method: String,
    pub url: String,
    pub info: String,
    pub state: String,
    pub creator_id: Option<DbId>,
}

pub const LOG_TYPE_LOGIN: &str = "login";
pub const LOG_STATE_SUCCESS: &str = "success";
pub const LOG_STATE_FAILURE: &str = "failure";
