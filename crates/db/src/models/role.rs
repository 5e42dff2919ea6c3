//! Roles and their menu links.

use keystone_core::types::DbId;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use super::base::BaseFields;

/// A row from `sys_role`.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub base: BaseFields,
    pub role_key: String,
    pub role_name: String,
    /// Whether the UI expands the menu tree when editing this role.
    pub is_open: bool,
    pub state: i32,
    pub remark: String,
}

/// A role plus the ids of its linked menus.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleDetail {
    #[serde(flatten)]
    pub role: Role,
    pub menu_ids: Vec<DbId>,
}

/// List filters for the role page.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleQuery {
    pub role_name: Option<String>,
    pub role_key: Option<String>,
}

/// Body of a role insert or update.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SaveRole {
    #[validate(length(min = 1, max = 64, message = "Role key must be between 1-64 characters"))]
    pub role_key: String,
    #[validate(length(min = 1, max = 100, message = "Role name must be between 1-100 characters"))]
    pub role_name: String,
    #[serde(default = "default_true")]
    pub is_open: bool,
    #[serde(default = "default_state")]
    pub state: i32,
    #[serde(default)]
    pub remark: String,
    #[serde(default)]
    pub menu_ids: Vec<DbId>,
}

/// Body of a role state change.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RoleState {
    #[validate(length(min = 1, message = "Id is required"))]
    pub id: DbId,
    #[validate(range(min = 1, max = 2, message = "State must be 1 (enabled) or 2 (disabled)"))]
    pub state: i32,
}

fn default_true() -> bool {
    true
}

fn default_state() -> i32 {
    keystone_core::roles::STATE_ENABLED
}

/// One `(role, permission)` pair from the role-menu join.
#[derive(Debug, Clone, FromRow)]
pub struct RolePermission {
    pub role_id: DbId,
    pub perms: String,
}
