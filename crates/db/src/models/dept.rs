//! Department tree.

use keystone_core::tree::TreeNode;
use keystone_core::types::DbId;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use super::base::BaseFields;

/// A row from `sys_dept`.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dept {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub base: BaseFields,
    pub name: String,
    pub parent_id: DbId,
    /// Depth in the tree; top-level departments are 1.
    pub level: i32,
    pub sort: i32,
    #[sqlx(skip)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Dept>,
}

impl TreeNode for Dept {
    fn node_id(&self) -> &str {
        &self.base.id
    }

    fn parent_id(&self) -> &str {
        &self.parent_id
    }

    fn set_children(&mut self, children: Vec<Self>) {
        self.children = children;
    }
}

/// Id and name of a department, as returned by the closure queries.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct DeptRef {
    pub id: DbId,
    pub name: String,
}

impl From<DeptRef> for (String, String) {
    fn from(d: DeptRef) -> Self {
        (d.id, d.name)
    }
}

/// Body of a department insert or update.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SaveDept {
    #[validate(length(min = 1, max = 100, message = "Name must be between 1-100 characters"))]
    pub name: String,
    #[validate(length(min = 1, message = "Parent is required"))]
    pub parent_id: DbId,
    #[serde(default)]
    pub sort: i32,
}
