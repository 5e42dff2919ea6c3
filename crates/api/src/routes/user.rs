use axum::routing::{delete, get, post, put};
use axum::Router;

use crate::handlers::user;
use crate::state::AppState;

/// ```text
/// GET    /sys/user/list              -> list
/// GET    /sys/user/getById/{id}      -> get_by_id
/// POST   /sys/user/insert            -> insert
/// PUT    /sys/user/update            -> update
/// DELETE /sys/user/delete            -> delete
/// PUT    /sys/user/updatePassword    -> update_password
/// PUT    /sys/user/resetPassword     -> reset_password
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sys/user/list", get(user::list))
        .route("/sys/user/getById/{id}", get(user::get_by_id))
        .route("/sys/user/insert", post(user::insert))
        .route("/sys/user/update", put(user::update))
        .route("/sys/user/delete", delete(user::delete))
        .route("/sys/user/updatePassword", put(user::update_password))
        .route("/sys/user/resetPassword", put(user::reset_password))
}

pub const PERMISSIONS: &[(&str, &str)] = &[
    ("/sys/user/list", "system:user:view"),
    ("/sys/user/getById/{id}", "system:user:view"),
    ("/sys/user/insert", "system:user:add"),
    ("/sys/user/update", "system:user:update"),
    ("/sys/user/delete", "system:user:delete"),
    ("/sys/user/updatePassword", "system:user:updatePassword"),
    ("/sys/user/resetPassword", "system:user:updatePassword"),
];
