pub mod dept;
pub mod health;
pub mod menu;
pub mod role;
pub mod safe;
pub mod session;
pub mod user;

use std::collections::HashMap;

use axum::middleware::from_fn_with_state;
use axum::Router;

use crate::middleware::authorize::authorize;
use crate::state::AppState;

/// Build the `/sys` route tree behind the authorization filter.
///
/// Routes are merged with their full paths so the filter sees each route's
/// matched path:
///
/// ```text
/// /sys/getKey, /sys/getCode, /sys/login     public key, captcha, login (no token)
/// /sys/logout, /sys/user/getLoginUser       session
/// /sys/user/*                               users
/// /sys/dept/*                               departments
/// /sys/role/*                               roles
/// /sys/menu/*                               menus and routers
/// /sys/safe/*                               safety policy
/// ```
pub fn sys_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .merge(session::router())
        .merge(user::router())
        .merge(dept::router())
        .merge(role::router())
        .merge(menu::router())
        .merge(safe::router())
        .route_layer(from_fn_with_state(state, authorize))
}

/// Required permission of every protected route, keyed by route path.
///
/// A requirement lists alternatives separated by `;`; an empty one only
/// needs a valid session.
#[derive(Debug, Clone)]
pub struct RoutePermissions {
    table: HashMap<&'static str, &'static str>,
}

impl RoutePermissions {
    pub fn requirement(&self, path: &str) -> Option<&'static str> {
        self.table.get(path).copied()
    }
}

impl Default for RoutePermissions {
    fn default() -> Self {
        let table = [
            session::PERMISSIONS,
            user::PERMISSIONS,
            dept::PERMISSIONS,
            role::PERMISSIONS,
            menu::PERMISSIONS,
            safe::PERMISSIONS,
        ]
        .into_iter()
        .flatten()
        .copied()
        .collect();
        Self { table }
    }
}
