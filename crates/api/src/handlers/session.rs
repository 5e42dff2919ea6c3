//! Handlers for the session entry points under `/sys`.
//!
//! `getKey`, `getCode` and `login` are reachable without a token; `logout`
//! and `getLoginUser` run behind the authorization filter.

use std::time::Duration;

use axum::extract::State;
use axum::Json;
use keystone_core::lockout::locked_error;
use keystone_core::token::is_valid_login_type;
use keystone_core::types::{new_id, unix_now};
use rand::Rng;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::session::{SessionUser, NEVER_EXPIRES};
use crate::error::AppResult;
use crate::middleware::auth::{ClientIp, CurrentUser};
use crate::response::ApiResponse;
use crate::state::AppState;

/// Characters that cannot be confused with one another when rendered.
pub const CAPTCHA_ALPHABET: &[u8] = b"23456789ABCDEFGHJKLMNPQRSTUVWXYZ";
pub const CAPTCHA_LENGTH: usize = 4;
pub const CAPTCHA_PREFIX: &str = "captcha:";
const CAPTCHA_TTL: Duration = Duration::from_secs(60);

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for `POST /sys/login`.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Username is required"))]
    pub user_name: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
    /// Client kind; empty for the web console.
    #[serde(default)]
    #[validate(custom(function = "validate_login_type"))]
    pub login_type: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Captcha {
    pub code_id: String,
    pub code: String,
}

/// The caller plus the permission strings of their role.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginUser {
    #[serde(flatten)]
    pub user: SessionUser,
    pub permissions: Vec<String>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /sys/getKey
///
/// The public key used by the console to encrypt credentials. Refused while
/// the caller's IP is locked.
pub async fn get_key(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
) -> AppResult<Json<ApiResponse<String>>> {
    if let Some(secs) = state.lockout.check_locked(&ip, unix_now()).await? {
        return Err(locked_error("IP", secs).into());
    }
    Ok(Json(ApiResponse::ok(state.config.security.public_key.clone())))
}

/// GET /sys/getCode
///
/// Issue a captcha challenge valid for one minute.
pub async fn get_code(State(state): State<AppState>) -> AppResult<Json<ApiResponse<Captcha>>> {
    let captcha = Captcha {
        code_id: new_id(),
        code: random_code(CAPTCHA_LENGTH),
    };
    let key = format!("{CAPTCHA_PREFIX}{}", captcha.code_id);
    state.cache.hset(&key, "code", &captcha.code).await?;
    state.cache.expire(&key, CAPTCHA_TTL).await?;
    Ok(Json(ApiResponse::ok(captcha)))
}

/// POST /sys/login
///
/// Returns the new session token. Sessions expire after the idle TTL unless
/// the safety policy disables idle expiry.
pub async fn login(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Json(input): Json<LoginRequest>,
) -> AppResult<Json<ApiResponse<String>>> {
    input.validate()?;
    let user = state
        .authenticator
        .authenticate(&ip, &input.user_name, &input.password)
        .await?;

    let policy = state.store.safety_policy().await?;
    let ttl = if policy.sessions_expire() {
        state.config.session.ttl_secs as i64
    } else {
        NEVER_EXPIRES
    };
    let token = state.sessions.login(&user, &input.login_type, ttl).await?;
    Ok(Json(ApiResponse::ok(token)))
}

/// POST /sys/logout
pub async fn logout(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<ApiResponse<()>>> {
    state.sessions.logout(&user.token).await?;
    tracing::info!(user = %user.user_name(), "Logged out");
    Ok(Json(ApiResponse::done()))
}

/// GET /sys/user/getLoginUser
pub async fn get_login_user(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<ApiResponse<LoginUser>>> {
    let permissions = state.permissions.permissions(user.role_id()).await?;
    Ok(Json(ApiResponse::ok(LoginUser {
        user: user.user,
        permissions,
    })))
}

fn validate_login_type(value: &str) -> Result<(), validator::ValidationError> {
    if is_valid_login_type(value) {
        Ok(())
    } else {
        Err(validator::ValidationError::new("login_type")
            .with_message("Login type must be alphanumeric".into()))
    }
}

fn random_code(len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| CAPTCHA_ALPHABET[rng.random_range(0..CAPTCHA_ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captcha_uses_unambiguous_characters() {
        for _ in 0..50 {
            let code = random_code(CAPTCHA_LENGTH);
            assert_eq!(code.len(), CAPTCHA_LENGTH);
            assert!(code.bytes().all(|b| CAPTCHA_ALPHABET.contains(&b)));
            assert!(!code.contains('0') && !code.contains('O') && !code.contains('I'));
        }
    }

    #[test]
    fn login_type_is_checked_with_the_credentials() {
        let request = |login_type: &str| LoginRequest {
            user_name: "alice".into(),
            password: "pw".into(),
            login_type: login_type.into(),
        };
        assert!(request("").validate().is_ok());
        assert!(request("app").validate().is_ok());
        assert!(request("we_b").validate().is_err());
        assert!(request("a:b").validate().is_err());
    }
}
