//! Shared application router builder.
//!
//! Provides [`build_app_router`] so both the production binary (`main.rs`)
//! and integration tests (`tests/common/mod.rs`) use the exact same middleware
//! stack.

use std::time::Duration;

use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderName, HeaderValue, Method, StatusCode};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::config::{ConfigError, ServerConfig};
use crate::routes;
use crate::state::AppState;

/// Build the full application [`Router`] with all middleware layers.
///
/// The middleware stack is applied bottom-up:
///
/// 1. CORS
/// 2. Set request ID on incoming requests
/// 3. Structured request/response tracing
/// 4. Propagate request ID to response
/// 5. Request timeout
/// 6. Panic recovery (catch panics, return 500)
///
/// The authorization filter sits below all of these as a route layer on the
/// `/sys` routes.
pub fn build_app_router(state: AppState) -> Result<Router, ConfigError> {
    let config = state.config.clone();
    let cors = build_cors_layer(&config)?;
    let request_id_header = HeaderName::from_static("x-request-id");

    Ok(Router::new()
        // Health check at root level, outside the authorization filter.
        .merge(routes::health::router())
        .merge(routes::sys_routes(state.clone()))
        // -- Middleware stack (applied bottom-up) --
        // Panic recovery: catch panics and return 500 JSON.
        .layer(CatchPanicLayer::new())
        // Request timeout.
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.request_timeout_secs),
        ))
        // Propagate request ID to response.
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        // Structured request/response tracing.
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Set request ID on incoming requests.
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        // CORS.
        .layer(cors)
        // Shared state.
        .with_state(state))
}

/// Build the CORS middleware layer from the configured origin allow-list.
///
/// The token header is both accepted and exposed so the console can read a
/// rotated token.
pub fn build_cors_layer(config: &ServerConfig) -> Result<CorsLayer, ConfigError> {
    let origins = config
        .security
        .allowed_origins
        .iter()
        .map(|o| {
            o.parse::<HeaderValue>().map_err(|e| ConfigError::Invalid {
                name: "ALLOWED_ORIGINS",
                reason: format!("'{o}': {e}"),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    let token_header = HeaderName::from_bytes(config.security.token_header.as_bytes())
        .map_err(|e| ConfigError::Invalid {
            name: "TOKEN_HEADER",
            reason: e.to_string(),
        })?;

    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([CONTENT_TYPE, token_header.clone()])
        .expose_headers([token_header])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600)))
}
