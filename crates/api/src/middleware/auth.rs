//! Extractors for the identity established by the authorization filter.

use std::net::SocketAddr;

use axum::extract::connect_info::MockConnectInfo;
use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use axum::http::Extensions;
use keystone_core::error::CoreError;

use crate::auth::session::SessionUser;
use crate::error::AppError;

/// The authenticated caller of the current request.
///
/// Inserted by the authorization filter once the token resolves; any handler
/// behind the filter can take it as an extractor:
///
/// ```ignore
/// async fn my_handler(user: CurrentUser) -> AppResult<Json<()>> {
///     tracing::info!(user = %user.user_name(), "handling request");
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentUser {
    /// The token that is live after this request (the rotated one if the
    /// session was re-issued).
    pub token: String,
    pub user: SessionUser,
    pub is_super_admin: bool,
}

impl CurrentUser {
    pub fn id(&self) -> &str {
        &self.user.user.base.id
    }

    pub fn user_name(&self) -> &str {
        &self.user.user.user_name
    }

    pub fn role_id(&self) -> &str {
        &self.user.user.role_id
    }

    pub fn dept_id(&self) -> &str {
        &self.user.user.dept_id
    }
}

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or(AppError::Core(CoreError::NotAuthenticated))
    }
}

/// Address of the connected client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

impl ClientIp {
    /// The peer address recorded by the server, or a mocked one in tests.
    pub fn from_extensions(extensions: &Extensions) -> Self {
        let addr = extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr)
            .or_else(|| {
                extensions
                    .get::<MockConnectInfo<SocketAddr>>()
                    .map(|MockConnectInfo(addr)| *addr)
            });
        let ip = addr.map(|a| a.ip().to_string()).unwrap_or_default();
        ClientIp(ip)
    }
}

impl<S: Send + Sync> FromRequestParts<S> for ClientIp {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(match parts.extensions.get::<ClientIp>() {
            Some(ip) => ip.clone(),
            None => ClientIp::from_extensions(&parts.extensions),
        })
    }
}
