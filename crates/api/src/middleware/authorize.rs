//! Request-time authorization filter.
//!
//! Runs as a route layer over every `/sys` route, in order:
//!
//! 1. client IP against the allow-list
//! 2. exempt paths skip straight to the handler
//! 3. token resolution
//! 4. the route's permission requirement against the role's permissions
//! 5. sliding refresh of the session
//!
//! Failures short-circuit before the handler runs. Requests that pass get the
//! security headers, and a rotated token when the session was re-issued.

use axum::extract::{MatchedPath, Request, State};
use axum::http::header::{self, HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use keystone_core::error::CoreError;
use keystone_core::types::unix_now;

use super::auth::{ClientIp, CurrentUser};
use crate::auth::token::{read_token, write_token};
use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Paths reachable without a token.
pub const EXEMPT_PATHS: &[&str] = &["/sys/login", "/sys/getKey", "/sys/getCode"];

const CONTENT_SECURITY_POLICY: &str =
    "default-src 'self'; script-src 'self'; frame-ancestors 'self'; object-src 'none'";

pub async fn authorize(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let origin = request.headers().get(header::ORIGIN).cloned();
    let rotated = match gate(&state, &mut request).await {
        Ok(rotated) => rotated,
        Err(e) => return e.into_response(),
    };

    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    apply_security_headers(headers, origin.as_ref(), &state.config.security.allowed_origins);
    if let Some(token) = rotated {
        write_token(headers, &state.config.security.token_header, &token);
    }
    response
}

/// Steps 1-5. Returns the rotated token, if any.
async fn gate(state: &AppState, request: &mut Request) -> AppResult<Option<String>> {
    let ip = ClientIp::from_extensions(request.extensions());
    request.extensions_mut().insert(ip.clone());

    if !state.allow_list.allows(&ip.0) {
        tracing::warn!(ip = %ip.0, "Request from address outside the allow-list");
        return Err(CoreError::AccessDenied.into());
    }

    let path = match request.extensions().get::<MatchedPath>() {
        Some(matched) => matched.as_str().to_string(),
        None => request.uri().path().to_string(),
    };
    if EXEMPT_PATHS.contains(&path.as_str()) {
        return Ok(None);
    }

    let security = &state.config.security;
    let token = read_token(request.headers(), &security.token_header)
        .ok_or(AppError::Core(CoreError::NotAuthenticated))?;
    let session = state.sessions.resolve(token).await?;

    let Some(requirement) = state.route_permissions.requirement(&path) else {
        tracing::error!(path = %path, "Route has no permission entry");
        return Err(CoreError::PermissionDenied("Route is not accessible".into()).into());
    };
    if !state
        .permissions
        .is_granted(&session.user.user.role_id, requirement)
        .await?
    {
        tracing::warn!(
            user = %session.user.user.user_name,
            path = %path,
            "Missing permission"
        );
        return Err(CoreError::PermissionDenied("Insufficient permissions".into()).into());
    }

    // The super-admin key widens the data scope only.
    let is_super_admin =
        session.user.user.role_key.as_deref() == Some(security.super_admin_role.as_str());
    let rotated = state.sessions.refresh(&session, unix_now()).await?;
    let current = CurrentUser {
        token: rotated.clone().unwrap_or(session.token),
        user: session.user,
        is_super_admin,
    };
    request.extensions_mut().insert(current);
    Ok(rotated)
}

/// Response headers added to every authorized request.
///
/// The origin is echoed back only when it is on `allowed_origins`.
pub fn apply_security_headers(
    headers: &mut HeaderMap,
    origin: Option<&HeaderValue>,
    allowed_origins: &[String],
) {
    if let Some(origin) = origin {
        let allowed = origin
            .to_str()
            .map(|o| allowed_origins.iter().any(|a| a == o))
            .unwrap_or(false);
        if allowed {
            headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
        }
    }
    let fixed = [
        (header::CONTENT_SECURITY_POLICY, CONTENT_SECURITY_POLICY),
        (header::ACCESS_CONTROL_ALLOW_CREDENTIALS, "true"),
        (header::REFERRER_POLICY, "no-referrer"),
        (header::X_XSS_PROTECTION, "1; mode=block"),
        (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
        (header::X_FRAME_OPTIONS, "SAMEORIGIN"),
        (header::X_DNS_PREFETCH_CONTROL, "off"),
        (
            header::STRICT_TRANSPORT_SECURITY,
            "max-age=31536000; includeSubDomains",
        ),
        (header::CACHE_CONTROL, "no-cache, no-store, must-revalidate"),
        (header::PRAGMA, "no-cache"),
        (header::EXPIRES, "0"),
    ];
    for (name, value) in fixed {
        headers.insert(name, HeaderValue::from_static(value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_echoed_only_when_allowed() {
        let allowed = vec!["http://localhost:5173".to_string()];

        let mut headers = HeaderMap::new();
        let good = HeaderValue::from_static("http://localhost:5173");
        apply_security_headers(&mut headers, Some(&good), &allowed);
        assert_eq!(
            headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "http://localhost:5173"
        );

        let mut headers = HeaderMap::new();
        let bad = HeaderValue::from_static("http://evil.example");
        apply_security_headers(&mut headers, Some(&bad), &allowed);
        assert!(headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
        assert_eq!(headers.get(header::X_FRAME_OPTIONS).unwrap(), "SAMEORIGIN");
        assert_eq!(headers.get(header::EXPIRES).unwrap(), "0");
    }

    #[test]
    fn exempt_paths_are_the_session_entry_points() {
        assert!(EXEMPT_PATHS.contains(&"/sys/login"));
        assert!(!EXEMPT_PATHS.contains(&"/sys/logout"));
    }
}
