//! Domain logic shared by every Keystone crate.
//!
//! Nothing in here performs I/O: the cache, database and HTTP layers call
//! into these modules with values they have already loaded.

pub mod error;
pub mod ip_allow;
pub mod lockout;
pub mod paging;
pub mod roles;
pub mod scope;
pub mod token;
pub mod tree;
pub mod types;
