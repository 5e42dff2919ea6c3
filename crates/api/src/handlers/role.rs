//! Handlers for the `/sys/role` resource.
//!
//! Relinking a role's menus recomputes that role's cached permissions;
//! deleting roles drops their cache entries.

use axum::extract::{Path, Query, State};
use axum::Json;
use keystone_core::error::CoreError;
use keystone_core::paging::{Page, PageParams};
use keystone_core::types::DbId;
use keystone_db::models::base::BaseFields;
use keystone_db::models::role::{Role, RoleDetail, RoleQuery, RoleState, SaveRole};
use keystone_db::repositories::{RoleMenuRepo, RoleRepo, UserRepo};
use serde::Deserialize;
use validator::Validate;

use super::IdList;
use crate::error::AppResult;
use crate::middleware::auth::CurrentUser;
use crate::response::ApiResponse;
use crate::state::AppState;

/// Query string of `GET /sys/role/list`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleListParams {
    pub role_name: Option<String>,
    pub role_key: Option<String>,
    pub page_num: Option<i64>,
    pub page_size: Option<i64>,
}

/// Request body for `PUT /sys/role/update`.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRole {
    #[validate(length(min = 1, message = "Id is required"))]
    pub id: DbId,
    #[serde(flatten)]
    #[validate(nested)]
    pub role: SaveRole,
}

/// GET /sys/role/list
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<RoleListParams>,
) -> AppResult<Json<ApiResponse<Page<Role>>>> {
    let query = RoleQuery {
        role_name: params.role_name,
        role_key: params.role_key,
    };
    let paging = PageParams {
        page_num: params.page_num,
        page_size: params.page_size,
    };
    let page = RoleRepo::page(&state.pool, &query, paging).await?;
    Ok(Json(ApiResponse::ok(page)))
}

/// GET /sys/role/roleSelect
pub async fn select(State(state): State<AppState>) -> AppResult<Json<ApiResponse<Vec<Role>>>> {
    let roles = RoleRepo::list_all(&state.pool).await?;
    Ok(Json(ApiResponse::ok(roles)))
}

/// GET /sys/role/getById/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<ApiResponse<RoleDetail>>> {
    let role = RoleRepo::find_by_id(&state.pool, &id)
        .await?
        .ok_or_else(|| not_found(&id))?;
    let menu_ids = RoleMenuRepo::menu_ids_for_role(&state.pool, &id).await?;
    Ok(Json(ApiResponse::ok(RoleDetail { role, menu_ids })))
}

/// POST /sys/role/insert
pub async fn insert(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(input): Json<SaveRole>,
) -> AppResult<Json<ApiResponse<Role>>> {
    input.validate()?;
    ensure_unique(&state, &input, None).await?;

    let base = BaseFields::created_by(Some(user.id()));
    let role = RoleRepo::create(&state.pool, &base, &input).await?;
    RoleMenuRepo::relink(&state.pool, &role.base.id, &input.menu_ids).await?;
    state.permissions.reload_role(&role.base.id).await?;

    tracing::info!(role_id = %role.base.id, role_key = %role.role_key, "Role created");
    Ok(Json(ApiResponse::ok(role)))
}

/// PUT /sys/role/update
pub async fn update(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(input): Json<UpdateRole>,
) -> AppResult<Json<ApiResponse<Role>>> {
    input.validate()?;
    let UpdateRole { id, role: changes } = input;
    ensure_unique(&state, &changes, Some(&id)).await?;

    let role = RoleRepo::update(&state.pool, &id, &changes, Some(user.id()))
        .await?
        .ok_or_else(|| not_found(&id))?;
    RoleMenuRepo::relink(&state.pool, &id, &changes.menu_ids).await?;
    state.permissions.reload_role(&id).await?;

    tracing::info!(role_id = %id, "Role updated");
    Ok(Json(ApiResponse::ok(role)))
}

/// PUT /sys/role/updateState
pub async fn update_state(
    State(state): State<AppState>,
    Json(input): Json<RoleState>,
) -> AppResult<Json<ApiResponse<()>>> {
    input.validate()?;
    if !RoleRepo::update_state(&state.pool, &input.id, input.state).await? {
        return Err(not_found(&input.id).into());
    }
    tracing::info!(role_id = %input.id, state = input.state, "Role state changed");
    Ok(Json(ApiResponse::done()))
}

/// DELETE /sys/role/delete
///
/// Refused while any user still holds one of the roles, and for the
/// super-admin role.
pub async fn delete(
    State(state): State<AppState>,
    Json(input): Json<IdList>,
) -> AppResult<Json<ApiResponse<()>>> {
    input.validate()?;
    for id in &input.ids {
        if let Some(role) = RoleRepo::find_by_id(&state.pool, id).await? {
            if role.role_key == state.config.security.super_admin_role {
                return Err(CoreError::IntegrityConflict(
                    "The super administrator role cannot be deleted".into(),
                )
                .into());
            }
        }
    }
    if let Some(name) = UserRepo::first_assigned_role(&state.pool, &input.ids).await? {
        return Err(
            CoreError::IntegrityConflict(format!("Role '{name}' is assigned to users")).into(),
        );
    }

    let deleted = RoleRepo::delete_many(&state.pool, &input.ids).await?;
    state.permissions.remove_roles(&input.ids).await?;
    tracing::info!(count = deleted, "Roles deleted");
    Ok(Json(ApiResponse::done()))
}

async fn ensure_unique(state: &AppState, input: &SaveRole, exclude: Option<&str>) -> AppResult<()> {
    if RoleRepo::name_taken(&state.pool, &input.role_name, exclude).await? {
        return Err(CoreError::Conflict(format!("Role name '{}' is taken", input.role_name)).into());
    }
    if RoleRepo::key_taken(&state.pool, &input.role_key, exclude).await? {
        return Err(CoreError::Conflict(format!("Role key '{}' is taken", input.role_key)).into());
    }
    Ok(())
}

fn not_found(id: &str) -> CoreError {
    CoreError::NotFound {
        entity: "Role",
        id: id.to_string(),
    }
}
