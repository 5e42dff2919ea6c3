use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use keystone_core::types::{new_id, DbId, Timestamp};

/// Audit columns shared by every managed table.
///
/// Entities embed this by value (`#[sqlx(flatten)]` / `#[serde(flatten)]`).
#[derive(Debug, Clone, Default, PartialEq, Eq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseFields {
    pub id: DbId,
    pub creator_id: Option<DbId>,
    pub create_time: Option<Timestamp>,
    pub update_id: Option<DbId>,
    pub update_time: Option<Timestamp>,
}

impl BaseFields {
    /// Fresh audit columns for a row about to be inserted by `creator`.
    pub fn created_by(creator: Option<&str>) -> Self {
        Self {
            id: new_id(),
            creator_id: creator.map(str::to_string),
            create_time: Some(chrono::Utc::now()),
            update_id: None,
            update_time: None,
        }
    }
}
