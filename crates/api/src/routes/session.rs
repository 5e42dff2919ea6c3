//! Session entry points.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::session;
use crate::state::AppState;

/// ```text
/// GET  /sys/getKey               -> get_key   (no token)
/// GET  /sys/getCode              -> get_code  (no token)
/// POST /sys/login                -> login     (no token)
/// POST /sys/logout               -> logout
/// GET  /sys/user/getLoginUser    -> get_login_user
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sys/getKey", get(session::get_key))
        .route("/sys/getCode", get(session::get_code))
        .route("/sys/login", post(session::login))
        .route("/sys/logout", post(session::logout))
        .route("/sys/user/getLoginUser", get(session::get_login_user))
}

pub const PERMISSIONS: &[(&str, &str)] = &[
    ("/sys/logout", ""),
    ("/sys/user/getLoginUser", ""),
];
