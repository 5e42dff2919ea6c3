//! Request handlers for the `/sys` resources.
//!
//! Each submodule holds the handlers of one resource. Handlers delegate to
//! the repositories in `keystone_db` and the session core in [`crate::auth`],
//! and map errors via [`AppError`](crate::error::AppError).

pub mod dept;
pub mod menu;
pub mod role;
pub mod safe;
pub mod session;
pub mod user;

use keystone_core::types::DbId;
use serde::Deserialize;
use validator::Validate;

/// Request body naming a single row.
#[derive(Debug, Deserialize, Validate)]
pub struct IdBody {
    #[validate(length(min = 1, message = "Id is required"))]
    pub id: DbId,
}

/// Request body naming several rows.
#[derive(Debug, Deserialize, Validate)]
pub struct IdList {
    #[validate(length(min = 1, message = "At least one id is required"))]
    pub ids: Vec<DbId>,
}
