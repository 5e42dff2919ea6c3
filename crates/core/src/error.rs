/// Domain error taxonomy.
///
/// Every failure that crosses a module boundary is one of these. The API layer
/// maps each variant to an HTTP status and a numeric envelope code.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The caller's IP address is not on the allow-list.
    #[error("Illegal access")]
    AccessDenied,

    /// Missing, unknown or expired session token.
    #[error("Not logged in")]
    NotAuthenticated,

    /// Authenticated, but the caller lacks the required permission or data scope.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The identity or IP is inside a lockout window.
    #[error("{message}")]
    AccountLocked { message: String, minutes: i64 },

    /// Wrong username or password; carries the attempts left before a lock.
    #[error("{message}")]
    InvalidCredentials { message: String, remaining: i64 },

    #[error("Validation failed: {0}")]
    Validation(String),

    /// Duplicate name/code on insert or update.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Delete blocked by existing children or references.
    #[error("Integrity conflict: {0}")]
    IntegrityConflict(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Internal error: {0}")]
    Internal(String),
}
