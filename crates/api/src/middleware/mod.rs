//! Request middleware and the extractors it feeds.
//!
//! - [`authorize::authorize`] -- IP, token and permission gate plus sliding refresh.
//! - [`auth::CurrentUser`] -- the caller established by the gate.
//! - [`auth::ClientIp`] -- the connected client address.

pub mod auth;
pub mod authorize;
