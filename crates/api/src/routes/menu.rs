use axum::routing::{delete, get, post, put};
use axum::Router;

use crate::handlers::menu;
use crate::state::AppState;

/// ```text
/// GET    /sys/menu/list                    -> list
/// GET    /sys/menu/getRouters              -> get_routers
/// GET    /sys/menu/getById/{id}            -> get_by_id
/// GET    /sys/menu/roleMenuTree/{roleId}   -> role_menu_tree
/// POST   /sys/menu/insert                  -> insert
/// PUT    /sys/menu/update                  -> update
/// DELETE /sys/menu/delete/{id}             -> delete
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sys/menu/list", get(menu::list))
        .route("/sys/menu/getRouters", get(menu::get_routers))
        .route("/sys/menu/getById/{id}", get(menu::get_by_id))
        .route("/sys/menu/roleMenuTree/{roleId}", get(menu::role_menu_tree))
        .route("/sys/menu/insert", post(menu::insert))
        .route("/sys/menu/update", put(menu::update))
        .route("/sys/menu/delete/{id}", delete(menu::delete))
}

pub const PERMISSIONS: &[(&str, &str)] = &[
    ("/sys/menu/list", "system:menu:view"),
    ("/sys/menu/getRouters", ""),
    ("/sys/menu/getById/{id}", "system:menu:view"),
    ("/sys/menu/roleMenuTree/{roleId}", ""),
    ("/sys/menu/insert", "system:menu:add"),
    ("/sys/menu/update", "system:menu:update"),
    ("/sys/menu/delete/{id}", "system:menu:delete"),
];
