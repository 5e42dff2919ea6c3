use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use keystone_cache::CacheError;
use keystone_core::error::CoreError;

use crate::response::ApiResponse;

/// Numeric codes carried in the response envelope.
pub mod codes {
    pub const SUCCESS: i32 = 0;
    pub const FAILURE: i32 = -1;
    pub const INVALID_CREDENTIALS: i32 = 1000;
    pub const ACCESS_DENIED: i32 = 1001;
    pub const PERMISSION_DENIED: i32 = 1002;
    pub const NOT_LOGGED_IN: i32 = 1003;
    pub const LOCKED: i32 = 1004;
    pub const VALIDATION: i32 = 1005;
    pub const CONFLICT: i32 = 1006;
    pub const INTEGRITY_CONFLICT: i32 = 1007;
    pub const NOT_FOUND: i32 = 1008;
}

const INTERNAL_MESSAGE: &str = "An internal error occurred";

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and adds store, cache and
/// HTTP-specific variants. Every variant renders as the uniform
/// `{ code, message, data }` envelope.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let messages: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |error| match &error.message {
                    Some(message) => message.to_string(),
                    None => format!("{field}: invalid value"),
                })
            })
            .collect();
        AppError::Core(CoreError::Validation(messages.join(", ")))
    }
}

impl AppError {
    /// HTTP status, envelope code and client-facing message.
    pub fn classify(&self) -> (StatusCode, i32, String) {
        match self {
            AppError::Core(core) => classify_core(core),
            AppError::Database(err) => classify_sqlx_error(err),
            AppError::Cache(err) => {
                tracing::error!(error = %err, "Cache error");
                internal()
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, codes::VALIDATION, msg.clone()),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                internal()
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.classify();
        (status, axum::Json(ApiResponse::<()>::error(code, message))).into_response()
    }
}

fn classify_core(core: &CoreError) -> (StatusCode, i32, String) {
    let message = core.to_string();
    match core {
        CoreError::AccessDenied => (StatusCode::FORBIDDEN, codes::ACCESS_DENIED, message),
        CoreError::NotAuthenticated => (StatusCode::UNAUTHORIZED, codes::NOT_LOGGED_IN, message),
        CoreError::PermissionDenied(_) => {
            (StatusCode::FORBIDDEN, codes::PERMISSION_DENIED, message)
        }
        CoreError::AccountLocked { .. } => (StatusCode::FORBIDDEN, codes::LOCKED, message),
        CoreError::InvalidCredentials { .. } => {
            (StatusCode::UNAUTHORIZED, codes::INVALID_CREDENTIALS, message)
        }
        CoreError::Validation(msg) => (StatusCode::BAD_REQUEST, codes::VALIDATION, msg.clone()),
        CoreError::Conflict(msg) => (StatusCode::CONFLICT, codes::CONFLICT, msg.clone()),
        CoreError::IntegrityConflict(msg) => {
            (StatusCode::CONFLICT, codes::INTEGRITY_CONFLICT, msg.clone())
        }
        CoreError::NotFound { .. } => (StatusCode::NOT_FOUND, codes::NOT_FOUND, message),
        CoreError::Internal(msg) => {
            tracing::error!(error = %msg, "Internal core error");
            internal()
        }
    }
}

/// Classify a sqlx error.
///
/// - `RowNotFound` maps to 404.
/// - Unique violations map to 409 (`uq_` constraints) as a last line of
///   defence behind the explicit name checks.
/// - Everything else is logged and sanitized.
fn classify_sqlx_error(err: &sqlx::Error) -> (StatusCode, i32, String) {
    match err {
        sqlx::Error::RowNotFound => (
            StatusCode::NOT_FOUND,
            codes::NOT_FOUND,
            "Resource not found".to_string(),
        ),
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
            let constraint = db_err.constraint().unwrap_or("unknown");
            (
                StatusCode::CONFLICT,
                codes::CONFLICT,
                format!("Duplicate value violates unique constraint: {constraint}"),
            )
        }
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23503") => (
            StatusCode::CONFLICT,
            codes::INTEGRITY_CONFLICT,
            "The record is still referenced".to_string(),
        ),
        other => {
            tracing::error!(error = %other, "Database error");
            internal()
        }
    }
}

fn internal() -> (StatusCode, i32, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        codes::FAILURE,
        INTERNAL_MESSAGE.to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_and_credential_messages_reach_the_client() {
        let err = AppError::Core(CoreError::AccountLocked {
            message: "Account is locked; try again in 3 minutes".into(),
            minutes: 3,
        });
        let (status, code, message) = err.classify();
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(code, codes::LOCKED);
        assert!(message.contains("3 minutes"));

        let (_, code, _) = AppError::Core(CoreError::InvalidCredentials {
            message: "nope".into(),
            remaining: 2,
        })
        .classify();
        assert_eq!(code, codes::INVALID_CREDENTIALS);
    }

    #[test]
    fn cache_failures_are_sanitized() {
        let err = AppError::Cache(CacheError::Connection("redis://secret@host".into()));
        let (status, code, message) = err.classify();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(code, codes::FAILURE);
        assert_eq!(message, INTERNAL_MESSAGE);
    }

    #[test]
    fn filter_rejections_have_distinct_codes() {
        let code = |e: CoreError| AppError::Core(e).classify().1;
        assert_eq!(code(CoreError::AccessDenied), codes::ACCESS_DENIED);
        assert_eq!(code(CoreError::NotAuthenticated), codes::NOT_LOGGED_IN);
        assert_eq!(
            code(CoreError::PermissionDenied("x".into())),
            codes::PERMISSION_DENIED
        );
    }
}
