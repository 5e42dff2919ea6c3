use axum::routing::{get, put};
use axum::Router;

use crate::handlers::safe;
use crate::state::AppState;

/// ```text
/// GET /sys/safe/getSafeSet   -> get
/// PUT /sys/safe/update       -> update
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sys/safe/getSafeSet", get(safe::get))
        .route("/sys/safe/update", put(safe::update))
}

pub const PERMISSIONS: &[(&str, &str)] = &[
    ("/sys/safe/getSafeSet", "system:userLog:view"),
    ("/sys/safe/update", "system:safe:update"),
];
