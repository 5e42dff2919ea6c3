use axum::routing::{delete, get, post, put};
use axum::Router;

use crate::handlers::dept;
use crate::state::AppState;

/// ```text
/// GET    /sys/dept/list              -> list
/// GET    /sys/dept/deptSelect        -> select
/// GET    /sys/dept/getById/{id}      -> get_by_id
/// POST   /sys/dept/insert            -> insert
/// PUT    /sys/dept/update            -> update
/// DELETE /sys/dept/delete/{id}       -> delete
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sys/dept/list", get(dept::list))
        .route("/sys/dept/deptSelect", get(dept::select))
        .route("/sys/dept/getById/{id}", get(dept::get_by_id))
        .route("/sys/dept/insert", post(dept::insert))
        .route("/sys/dept/update", put(dept::update))
        .route("/sys/dept/delete/{id}", delete(dept::delete))
}

/// Department screens live inside user management, so either permission
/// opens them.
pub const PERMISSIONS: &[(&str, &str)] = &[
    ("/sys/dept/list", "system:user:view;system:dept:view"),
    ("/sys/dept/deptSelect", ""),
    ("/sys/dept/getById/{id}", "system:user:view;system:dept:view"),
    ("/sys/dept/insert", "system:user:add;system:dept:add"),
    ("/sys/dept/update", "system:user:update;system:dept:update"),
    ("/sys/dept/delete/{id}", "system:user:delete;system:dept:delete"),
];
