use axum::routing::{delete, get, post, put};
use axum::Router;

use crate::handlers::role;
use crate::state::AppState;

/// ```text
/// GET    /sys/role/list              -> list
/// GET    /sys/role/roleSelect        -> select
/// GET    /sys/role/getById/{id}      -> get_by_id
/// POST   /sys/role/insert            -> insert
/// PUT    /sys/role/update            -> update
/// PUT    /sys/role/updateState       -> update_state
/// DELETE /sys/role/delete            -> delete
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sys/role/list", get(role::list))
        .route("/sys/role/roleSelect", get(role::select))
        .route("/sys/role/getById/{id}", get(role::get_by_id))
        .route("/sys/role/insert", post(role::insert))
        .route("/sys/role/update", put(role::update))
        .route("/sys/role/updateState", put(role::update_state))
        .route("/sys/role/delete", delete(role::delete))
}

pub const PERMISSIONS: &[(&str, &str)] = &[
    ("/sys/role/list", "system:role:view"),
    ("/sys/role/roleSelect", ""),
    ("/sys/role/getById/{id}", "system:role:view"),
    ("/sys/role/insert", "system:role:add"),
    ("/sys/role/update", "system:role:update"),
    ("/sys/role/updateState", "system:role:update"),
    ("/sys/role/delete", "system:role:delete"),
];
