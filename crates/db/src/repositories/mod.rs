//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods
//! that accept `&PgPool` as the first argument.

pub mod dept_repo;
pub mod log_repo;
pub mod menu_repo;
pub mod role_menu_repo;
pub mod role_repo;
pub mod safe_repo;
pub mod user_repo;

pub use dept_repo::DeptRepo;
pub use log_repo::LogRepo;
pub use menu_repo::MenuRepo;
pub use role_menu_repo::RoleMenuRepo;
pub use role_repo::RoleRepo;
pub use safe_repo::SafeRepo;
pub use user_repo::UserRepo;
