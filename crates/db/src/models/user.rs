//! User accounts.

use keystone_core::types::DbId;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use super::base::BaseFields;

/// A `sys_user` row joined with its department and role names.
///
/// Carries no password hash and is safe to serialize.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub base: BaseFields,
    pub user_name: String,
    pub real_name: String,
    pub dept_id: DbId,
    pub dept_name: Option<String>,
    pub role_id: DbId,
    pub role_key: Option<String>,
    pub role_name: Option<String>,
    pub phone: Option<String>,
    pub state: i32,
    pub picture: Option<String>,
}

impl UserView {
    /// Copy with the phone number masked for list views.
    pub fn masked(mut self) -> Self {
        self.phone = self.phone.as_deref().map(mask_phone);
        self
    }
}

/// A user together with the stored password hash. Never serialized.
#[derive(Debug, Clone, FromRow)]
pub struct UserCredentials {
    #[sqlx(flatten)]
    pub user: UserView,
    pub password: String,
}

/// Keep the first three characters of a phone number and star the rest.
pub fn mask_phone(phone: &str) -> String {
    let visible: String = phone.chars().take(3).collect();
    let hidden = phone.chars().count().saturating_sub(3);
    format!("{visible}{}", "*".repeat(hidden))
}

/// List filters for the user page.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserQuery {
    pub user_name: Option<String>,
    pub real_name: Option<String>,
    /// Restrict to this department and its descendants.
    pub dept_id: Option<DbId>,
}

/// Body of a user insert or update.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SaveUser {
    #[validate(length(min = 1, max = 64, message = "Username must be between 1-64 characters"))]
    pub user_name: String,
    #[validate(length(max = 100, message = "Real name too long"))]
    #[serde(default)]
    pub real_name: String,
    #[validate(length(min = 1, message = "Department is required"))]
    pub dept_id: DbId,
    #[validate(length(min = 1, message = "Role is required"))]
    pub role_id: DbId,
    #[validate(length(min = 5, max = 32, message = "Phone must be between 5-32 characters"))]
    pub phone: Option<String>,
    pub state: Option<i32>,
}

/// Body of a password change.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangePassword {
    #[validate(length(min = 1, message = "Old password is required"))]
    pub old_password: String,
    #[validate(length(min = 6, max = 128, message = "New password must be between 6-128 characters"))]
    pub new_password: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phone_masking() {
        assert_eq!(mask_phone("13812345678"), "138********");
        assert_eq!(mask_phone("12"), "12");
    }
}
