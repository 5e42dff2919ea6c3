//! Session and authorization core.
//!
//! - [`lockout`] -- failed-login counters and lock windows.
//! - [`authenticator`] -- credential checks with lockout accounting.
//! - [`session`] -- token issue, resolve, sliding refresh and data scopes.
//! - [`permission`] -- role to permission-string cache.
//! - [`scope`] -- per-caller data-scope filters and checks.
//! - [`store`] -- the credential store seam.

pub mod authenticator;
pub mod lockout;
pub mod password;
pub mod permission;
pub mod scope;
pub mod session;
pub mod store;
pub mod token;
