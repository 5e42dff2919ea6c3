//! Handlers for the `/sys/menu` resource.
//!
//! Menus carry the permission strings checked by the authorization filter,
//! so renaming a menu's permission rewrites it in every cached role.

use axum::extract::{Path, Query, State};
use axum::Json;
use keystone_core::error::CoreError;
use keystone_core::roles::STATE_ENABLED;
use keystone_core::tree::{build_tree, ensure_acyclic_parent};
use keystone_core::types::{DbId, ROOT_PARENT_ID};
use keystone_db::models::base::BaseFields;
use keystone_db::models::menu::{
    build_routers, Menu, MenuQuery, Router, SaveMenu, MENU_TYPE_BUTTON,
};
use keystone_db::repositories::{MenuRepo, RoleMenuRepo};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::AppResult;
use crate::middleware::auth::CurrentUser;
use crate::response::ApiResponse;
use crate::state::AppState;

/// Request body for `PUT /sys/menu/update`.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMenu {
    #[validate(length(min = 1, message = "Id is required"))]
    pub id: DbId,
    #[serde(flatten)]
    #[validate(nested)]
    pub menu: SaveMenu,
}

/// The full menu tree with one role's links marked.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleMenuTree {
    pub menus: Vec<Menu>,
    pub checked_keys: Vec<DbId>,
}

/// GET /sys/menu/list
///
/// A tree, or a flat list when filtering by name (matches may not include
/// their parents).
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<MenuQuery>,
) -> AppResult<Json<ApiResponse<Vec<Menu>>>> {
    let menus = MenuRepo::list(&state.pool, &query).await?;
    let filtered = query.name.as_deref().is_some_and(|n| !n.trim().is_empty());
    let menus = if filtered {
        menus
    } else {
        build_tree(&menus, ROOT_PARENT_ID)
    };
    Ok(Json(ApiResponse::ok(menus)))
}

/// GET /sys/menu/getRouters
///
/// Front-end routes of the caller's role. Super admins get every enabled
/// directory and page.
pub async fn get_routers(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<ApiResponse<Vec<Router>>>> {
    let menus = if user.is_super_admin {
        let query = MenuQuery {
            state: Some(STATE_ENABLED),
            ..MenuQuery::default()
        };
        MenuRepo::list(&state.pool, &query)
            .await?
            .into_iter()
            .filter(|m| m.menu_type != MENU_TYPE_BUTTON)
            .collect()
    } else {
        MenuRepo::routable_for_role(&state.pool, user.role_id()).await?
    };
    let routers = build_routers(&build_tree(&menus, ROOT_PARENT_ID));
    Ok(Json(ApiResponse::ok(routers)))
}

/// GET /sys/menu/getById/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<ApiResponse<Menu>>> {
    Ok(Json(ApiResponse::ok(find(&state, &id).await?)))
}

/// GET /sys/menu/roleMenuTree/{roleId}
pub async fn role_menu_tree(
    State(state): State<AppState>,
    Path(role_id): Path<DbId>,
) -> AppResult<Json<ApiResponse<RoleMenuTree>>> {
    let all = MenuRepo::list(&state.pool, &MenuQuery::default()).await?;
    let checked_keys = RoleMenuRepo::menu_ids_for_role(&state.pool, &role_id).await?;
    Ok(Json(ApiResponse::ok(RoleMenuTree {
        menus: build_tree(&all, ROOT_PARENT_ID),
        checked_keys,
    })))
}

/// POST /sys/menu/insert
pub async fn insert(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(input): Json<SaveMenu>,
) -> AppResult<Json<ApiResponse<Menu>>> {
    input.validate()?;
    let parent_id = input.normalized_parent();
    if MenuRepo::name_taken(&state.pool, &input.name, parent_id, None).await? {
        return Err(CoreError::Conflict(format!("Menu '{}' already exists", input.name)).into());
    }

    let base = BaseFields::created_by(Some(user.id()));
    let menu = MenuRepo::create(&state.pool, &base, parent_id, &input).await?;
    tracing::info!(menu_id = %menu.base.id, name = %menu.name, "Menu created");
    Ok(Json(ApiResponse::ok(menu)))
}

/// PUT /sys/menu/update
///
/// A menu cannot become its own parent or move under a descendant. A changed
/// permission string is renamed in the permission cache, or loaded into the
/// linked roles when the menu had none.
pub async fn update(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(input): Json<UpdateMenu>,
) -> AppResult<Json<ApiResponse<Menu>>> {
    input.validate()?;
    let UpdateMenu { id, menu: changes } = input;
    let current = find(&state, &id).await?;
    let parent_id = changes.normalized_parent();

    if parent_id != current.parent_id {
        let subtree = MenuRepo::subtree_ids(&state.pool, &id).await?;
        ensure_acyclic_parent(&id, parent_id, &subtree)?;
    }
    if MenuRepo::name_taken(&state.pool, &changes.name, parent_id, Some(&id)).await? {
        return Err(CoreError::Conflict(format!("Menu '{}' already exists", changes.name)).into());
    }

    let updated = MenuRepo::update(&state.pool, &id, parent_id, &changes, Some(user.id()))
        .await?
        .ok_or_else(|| not_found(&id))?;
    if current.perms != updated.perms {
        let linked = RoleMenuRepo::roles_for_menu(&state.pool, &id).await?;
        state
            .permissions
            .menu_changed(&current.perms, &updated.perms, &linked)
            .await?;
    }

    tracing::info!(menu_id = %id, "Menu updated");
    Ok(Json(ApiResponse::ok(updated)))
}

/// DELETE /sys/menu/delete/{id}
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<ApiResponse<()>>> {
    if MenuRepo::has_children(&state.pool, &id).await? {
        return Err(CoreError::IntegrityConflict("Menu has sub-menus".into()).into());
    }
    if RoleMenuRepo::menu_assigned(&state.pool, &id).await? {
        return Err(CoreError::IntegrityConflict("Menu is assigned to a role".into()).into());
    }
    if !MenuRepo::delete(&state.pool, &id).await? {
        return Err(not_found(&id).into());
    }
    tracing::info!(menu_id = %id, "Menu deleted");
    Ok(Json(ApiResponse::done()))
}

async fn find(state: &AppState, id: &str) -> AppResult<Menu> {
    MenuRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| not_found(id).into())
}

fn not_found(id: &str) -> CoreError {
    CoreError::NotFound {
        entity: "Menu",
        id: id.to_string(),
    }
}
