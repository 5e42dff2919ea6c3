//! Handlers for the safety policy under `/sys/safe`.

use axum::extract::State;
use axum::Json;
use keystone_db::models::safe::{SafetyPolicy, SaveSafetyPolicy};
use keystone_db::repositories::SafeRepo;
use validator::Validate;

use crate::error::AppResult;
use crate::middleware::auth::CurrentUser;
use crate::response::ApiResponse;
use crate::state::AppState;

/// GET /sys/safe/getSafeSet
pub async fn get(State(state): State<AppState>) -> AppResult<Json<ApiResponse<SafetyPolicy>>> {
    let policy = state.store.safety_policy().await?;
    Ok(Json(ApiResponse::ok(policy)))
}

/// PUT /sys/safe/update
///
/// The caller's own session switches to the new idle setting at once; other
/// sessions pick it up on their next login.
pub async fn update(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(input): Json<SaveSafetyPolicy>,
) -> AppResult<Json<ApiResponse<SafetyPolicy>>> {
    input.validate()?;
    let policy = SafeRepo::save(&state.pool, &input, Some(user.id())).await?;
    state
        .sessions
        .set_expiring(&user.token, policy.sessions_expire())
        .await?;

    tracing::info!(
        login_limit = policy.pwd_login_limit,
        idle = policy.idle_time_setting,
        "Safety policy updated"
    );
    Ok(Json(ApiResponse::ok(policy)))
}
