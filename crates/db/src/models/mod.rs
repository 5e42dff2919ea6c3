//! Row structs and request DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` + `Serialize` entity struct matching the database row
//! - `Deserialize` + `Validate` DTOs for inserts and updates

pub mod base;
pub mod dept;
pub mod log;
pub mod menu;
pub mod role;
pub mod safe;
pub mod user;
