//! Handlers for the `/sys/dept` resource.
//!
//! Every read is confined to the caller's data scope and every write is
//! gated on it. Structural changes drop all cached department scopes.

use axum::extract::{Path, State};
use axum::Json;
use keystone_core::error::CoreError;
use keystone_core::scope::ScopeMode;
use keystone_core::tree::{build_tree, ensure_acyclic_parent, level_under};
use keystone_core::types::{DbId, ROOT_PARENT_ID};
use keystone_db::models::base::BaseFields;
use keystone_db::models::dept::{Dept, SaveDept};
use keystone_db::repositories::{DeptRepo, UserRepo};
use serde::Deserialize;
use validator::Validate;

use crate::error::AppResult;
use crate::middleware::auth::CurrentUser;
use crate::response::ApiResponse;
use crate::state::AppState;

/// Request body for `PUT /sys/dept/update`.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDept {
    #[validate(length(min = 1, message = "Id is required"))]
    pub id: DbId,
    #[serde(flatten)]
    #[validate(nested)]
    pub dept: SaveDept,
}

/// GET /sys/dept/list
///
/// The caller's department subtree, with the path from the root down to the
/// caller's department so the tree stays connected.
pub async fn list(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<ApiResponse<Vec<Dept>>>> {
    Ok(Json(ApiResponse::ok(scoped_tree(&state, &user).await?)))
}

/// GET /sys/dept/deptSelect
pub async fn select(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<ApiResponse<Vec<Dept>>>> {
    Ok(Json(ApiResponse::ok(scoped_tree(&state, &user).await?)))
}

/// GET /sys/dept/getById/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<DbId>,
) -> AppResult<Json<ApiResponse<Dept>>> {
    user.require_dept(&id)?;
    let dept = find(&state, &id).await?;
    Ok(Json(ApiResponse::ok(dept)))
}

/// POST /sys/dept/insert
pub async fn insert(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(input): Json<SaveDept>,
) -> AppResult<Json<ApiResponse<Dept>>> {
    input.validate()?;
    user.require_dept(&input.parent_id)?;
    if DeptRepo::name_taken(&state.pool, &input.name, &input.parent_id, None).await? {
        return Err(CoreError::Conflict(format!("Department '{}' already exists", input.name)).into());
    }

    let level = level_of_parent(&state, &input.parent_id).await?;
    let base = BaseFields::created_by(Some(user.id()));
    let dept = DeptRepo::create(&state.pool, &base, &input, level).await?;
    state.sessions.invalidate_data_scopes().await?;

    tracing::info!(dept_id = %dept.base.id, name = %dept.name, "Department created");
    Ok(Json(ApiResponse::ok(dept)))
}

/// PUT /sys/dept/update
///
/// Moving a department re-levels its whole subtree. A department cannot be
/// moved under itself or one of its descendants.
pub async fn update(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(input): Json<UpdateDept>,
) -> AppResult<Json<ApiResponse<Dept>>> {
    input.validate()?;
    let UpdateDept { id, dept: changes } = input;
    user.require_dept(&id)?;
    let current = find(&state, &id).await?;

    if changes.parent_id != current.parent_id {
        user.require_dept(&changes.parent_id)?;
        let subtree: Vec<String> = DeptRepo::descendants(&state.pool, &id)
            .await?
            .into_iter()
            .map(|d| d.id)
            .collect();
        ensure_acyclic_parent(&id, &changes.parent_id, &subtree)?;
    }
    if DeptRepo::name_taken(&state.pool, &changes.name, &changes.parent_id, Some(&id)).await? {
        return Err(CoreError::Conflict(format!("Department '{}' already exists", changes.name)).into());
    }

    let level = level_of_parent(&state, &changes.parent_id).await?;
    let updated = DeptRepo::move_to(
        &state.pool,
        &id,
        &changes,
        level,
        level - current.level,
        Some(user.id()),
    )
    .await?
    .ok_or_else(|| not_found(&id))?;
    state.sessions.invalidate_data_scopes().await?;

    tracing::info!(dept_id = %id, "Department updated");
    Ok(Json(ApiResponse::ok(updated)))
}

/// DELETE /sys/dept/delete/{id}
pub async fn delete(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<DbId>,
) -> AppResult<Json<ApiResponse<()>>> {
    user.require_dept(&id)?;
    if DeptRepo::has_children(&state.pool, &id).await? {
        return Err(CoreError::IntegrityConflict("Department has sub-departments".into()).into());
    }
    if UserRepo::exists_in_dept(&state.pool, &id).await? {
        return Err(CoreError::IntegrityConflict("Department still has users".into()).into());
    }
    if !DeptRepo::delete(&state.pool, &id).await? {
        return Err(not_found(&id).into());
    }
    state.sessions.invalidate_data_scopes().await?;

    tracing::info!(dept_id = %id, "Department deleted");
    Ok(Json(ApiResponse::done()))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn scoped_tree(state: &AppState, user: &CurrentUser) -> AppResult<Vec<Dept>> {
    let filter = user.scope_filter("id", ScopeMode::DeptAndChildren, false, true);
    let mut rows = Vec::new();
    if !filter.is_none() {
        rows.extend(DeptRepo::ancestor_rows(&state.pool, user.dept_id()).await?);
    }
    rows.extend(DeptRepo::list(&state.pool, &filter).await?);
    Ok(build_tree(&rows, ROOT_PARENT_ID))
}

async fn find(state: &AppState, id: &str) -> AppResult<Dept> {
    DeptRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| not_found(id).into())
}

async fn level_of_parent(state: &AppState, parent_id: &str) -> AppResult<i32> {
    if parent_id == ROOT_PARENT_ID {
        return Ok(level_under(None));
    }
    let parent = find(state, parent_id).await?;
    Ok(level_under(Some(parent.level)))
}

fn not_found(id: &str) -> CoreError {
    CoreError::NotFound {
        entity: "Department",
        id: id.to_string(),
    }
}
