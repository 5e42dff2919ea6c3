//! Handlers for the `/sys/user` resource.
//!
//! Users are scoped by department: callers can only list, read, create,
//! move, delete or reset users inside their data scope.

use axum::extract::{Path, Query, State};
use axum::Json;
use keystone_core::error::CoreError;
use keystone_core::paging::{Page, PageParams};
use keystone_core::scope::{ScopeFilter, ScopeMode};
use keystone_core::types::DbId;
use keystone_db::models::base::BaseFields;
use keystone_db::models::user::{ChangePassword, SaveUser, UserCredentials, UserQuery, UserView};
use keystone_db::repositories::user_repo::USER_DEPT_COLUMN;
use keystone_db::repositories::{DeptRepo, UserRepo};
use serde::Deserialize;
use validator::Validate;

use super::{IdBody, IdList};
use crate::auth::password::{check_new_password, hash_password, verify_password};
use crate::error::AppResult;
use crate::middleware::auth::CurrentUser;
use crate::response::ApiResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Query string of `GET /sys/user/list`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserListParams {
    pub user_name: Option<String>,
    pub real_name: Option<String>,
    /// Restrict to this department and its descendants.
    pub dept_id: Option<DbId>,
    pub page_num: Option<i64>,
    pub page_size: Option<i64>,
}

/// Request body for `PUT /sys/user/update`.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUser {
    #[validate(length(min = 1, message = "Id is required"))]
    pub id: DbId,
    #[serde(flatten)]
    #[validate(nested)]
    pub user: SaveUser,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /sys/user/list
pub async fn list(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(params): Query<UserListParams>,
) -> AppResult<Json<ApiResponse<Page<UserView>>>> {
    let subtree = match params.dept_id.as_deref().filter(|d| !d.is_empty()) {
        Some(dept_id) => Some(
            DeptRepo::descendants(&state.pool, dept_id)
                .await?
                .into_iter()
                .map(|d| d.id)
                .collect(),
        ),
        None => None,
    };
    let query = UserQuery {
        user_name: params.user_name,
        real_name: params.real_name,
        dept_id: params.dept_id,
    };
    let paging = PageParams {
        page_num: params.page_num,
        page_size: params.page_size,
    };
    let filter = user.scope_filter(USER_DEPT_COLUMN, ScopeMode::DeptAndChildren, false, true);
    let page = UserRepo::page(&state.pool, &query, subtree, &filter, paging).await?;
    Ok(Json(ApiResponse::ok(page)))
}

/// GET /sys/user/getById/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<DbId>,
) -> AppResult<Json<ApiResponse<UserView>>> {
    let filter = user.scope_filter(USER_DEPT_COLUMN, ScopeMode::DeptAndChildren, false, true);
    let found = UserRepo::find_by_id(&state.pool, &id, &filter)
        .await?
        .ok_or_else(|| not_found(&id))?;
    Ok(Json(ApiResponse::ok(found.masked())))
}

/// POST /sys/user/insert
///
/// New users start with the configured initial password.
pub async fn insert(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(input): Json<SaveUser>,
) -> AppResult<Json<ApiResponse<()>>> {
    input.validate()?;
    user.require_dept(&input.dept_id)?;
    ensure_unique(&state, &input, None).await?;

    let hash = hash_password(&state.config.security.init_password)?;
    let base = BaseFields::created_by(Some(user.id()));
    UserRepo::create(&state.pool, &base, &input, &hash).await?;

    tracing::info!(user_id = %base.id, user_name = %input.user_name, "User created");
    Ok(Json(ApiResponse::done()))
}

/// PUT /sys/user/update
///
/// Both the current and the target department must be in scope. Editing
/// yourself refreshes the snapshot held by your session.
pub async fn update(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(input): Json<UpdateUser>,
) -> AppResult<Json<ApiResponse<()>>> {
    input.validate()?;
    let UpdateUser { id, user: changes } = input;
    let existing = find_credentials(&state, &id).await?;
    user.require_dept(&existing.user.dept_id)?;
    user.require_dept(&changes.dept_id)?;
    ensure_unique(&state, &changes, Some(&id)).await?;

    if !UserRepo::update(&state.pool, &id, &changes, Some(user.id())).await? {
        return Err(not_found(&id).into());
    }

    if id == user.id() {
        if let Some(fresh) = UserRepo::find_by_id(&state.pool, &id, &ScopeFilter::None).await? {
            state.sessions.update_user(&user.token, &fresh).await?;
        }
    }
    tracing::info!(user_id = %id, "User updated");
    Ok(Json(ApiResponse::done()))
}

/// DELETE /sys/user/delete
pub async fn delete(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(input): Json<IdList>,
) -> AppResult<Json<ApiResponse<()>>> {
    input.validate()?;
    if input.ids.iter().any(|id| id.as_str() == user.id()) {
        return Err(CoreError::Validation("You cannot delete your own account".into()).into());
    }
    for (_, dept_id) in UserRepo::dept_ids_of(&state.pool, &input.ids).await? {
        user.require_dept(&dept_id)?;
    }
    let deleted = UserRepo::delete_many(&state.pool, &input.ids).await?;
    tracing::info!(count = deleted, "Users deleted");
    Ok(Json(ApiResponse::done()))
}

/// PUT /sys/user/updatePassword
///
/// Change the caller's own password.
pub async fn update_password(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(input): Json<ChangePassword>,
) -> AppResult<Json<ApiResponse<()>>> {
    input.validate()?;
    let existing = find_credentials(&state, user.id()).await?;
    if !verify_password(&input.old_password, &existing.password)? {
        return Err(CoreError::Validation("The old password is incorrect".into()).into());
    }
    check_new_password(
        &input.old_password,
        &input.new_password,
        &state.config.security.init_password,
    )?;

    let hash = hash_password(&input.new_password)?;
    UserRepo::update_password(&state.pool, user.id(), &hash).await?;
    tracing::info!(user = %user.user_name(), "Password changed");
    Ok(Json(ApiResponse::done()))
}

/// PUT /sys/user/resetPassword
///
/// Put a user back on the initial password.
pub async fn reset_password(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(input): Json<IdBody>,
) -> AppResult<Json<ApiResponse<()>>> {
    input.validate()?;
    let existing = find_credentials(&state, &input.id).await?;
    user.require_dept(&existing.user.dept_id)?;

    let hash = hash_password(&state.config.security.init_password)?;
    UserRepo::update_password(&state.pool, &input.id, &hash).await?;
    tracing::info!(user_id = %input.id, by = %user.user_name(), "Password reset");
    Ok(Json(ApiResponse::done()))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn find_credentials(state: &AppState, id: &str) -> AppResult<UserCredentials> {
    UserRepo::find_credentials_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| not_found(id).into())
}

async fn ensure_unique(state: &AppState, input: &SaveUser, exclude: Option<&str>) -> AppResult<()> {
    if UserRepo::username_taken(&state.pool, &input.user_name, exclude).await? {
        return Err(CoreError::Conflict(format!("Username '{}' is taken", input.user_name)).into());
    }
    if let Some(phone) = input.phone.as_deref().filter(|p| !p.is_empty()) {
        if UserRepo::phone_taken(&state.pool, phone, exclude).await? {
            return Err(CoreError::Conflict("Phone number is already registered".into()).into());
        }
    }
    Ok(())
}

fn not_found(id: &str) -> CoreError {
    CoreError::NotFound {
        entity: "User",
        id: id.to_string(),
    }
}
