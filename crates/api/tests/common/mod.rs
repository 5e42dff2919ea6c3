//! Shared test helpers for HTTP-level integration tests.
//!
//! Builds the production router over an in-memory cache and credential
//! store. The Postgres pool is lazy and never connected, so these tests only
//! reach routes that are answered before any repository call.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::connect_info::MockConnectInfo;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use keystone_api::auth::password::hash_password;
use keystone_api::auth::store::{MemoryCredentialStore, PgCredentialStore};
use keystone_api::bootstrap::ensure_admin;
use keystone_api::config::{SecurityConfig, ServerConfig, SessionConfig};
use keystone_api::router::build_app_router;
use keystone_api::state::AppState;
use keystone_cache::MemoryCache;
use keystone_core::roles::{STATE_DISABLED, STATE_ENABLED};
use keystone_core::types::ROOT_PARENT_ID;
use keystone_db::models::base::BaseFields;
use keystone_db::models::dept::Dept;
use keystone_db::models::user::{UserCredentials, UserView};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tower::ServiceExt;

pub const TOKEN_HEADER: &str = "x-keystone-token";
pub const PASSWORD: &str = "s3cret-pass";
pub const CLIENT_IP: &str = "10.0.0.7";

/// Role of `alice`; may view users only.
pub const VIEWER_ROLE: &str = "role-viewer";
/// Role of `root`; carries the super-admin key.
pub const ADMIN_ROLE: &str = "role-admin";

/// Build a test `ServerConfig` admitting `10.0.0.*`.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        database_url: "postgres://keystone@127.0.0.1:1/keystone".to_string(),
        security: SecurityConfig {
            auth_hosts: vec!["10.0.0.*".to_string(), "127.0.0.1".to_string()],
            ..SecurityConfig::default()
        },
        session: SessionConfig::default(),
        redis: None,
    }
}

fn dept(id: &str, parent: &str, level: i32) -> Dept {
    Dept {
        base: BaseFields {
            id: id.to_string(),
            ..BaseFields::default()
        },
        name: format!("Dept {id}"),
        parent_id: parent.to_string(),
        level,
        sort: 0,
        children: Vec::new(),
    }
}

fn user(name: &str, dept_id: &str, role_id: &str, role_key: &str, state: i32) -> UserCredentials {
    UserCredentials {
        user: UserView {
            base: BaseFields {
                id: format!("id-{name}"),
                ..BaseFields::default()
            },
            user_name: name.to_string(),
            real_name: name.to_uppercase(),
            dept_id: dept_id.to_string(),
            dept_name: Some(format!("Dept {dept_id}")),
            role_id: role_id.to_string(),
            role_key: Some(role_key.to_string()),
            role_name: None,
            phone: None,
            state,
            picture: None,
        },
        password: hash_password(PASSWORD).expect("hashing should succeed"),
    }
}

/// Departments `A > B > C`, an enabled viewer `alice` in `B`, a super admin
/// `root` in `A` and a disabled `mallory`.
pub async fn seeded_store() -> Arc<MemoryCredentialStore> {
    let store = Arc::new(MemoryCredentialStore::new());
    store.add_dept(dept("A", ROOT_PARENT_ID, 1)).await;
    store.add_dept(dept("B", "A", 2)).await;
    store.add_dept(dept("C", "B", 3)).await;

    store
        .add_user(user("alice", "B", VIEWER_ROLE, "viewer", STATE_ENABLED))
        .await;
    store
        .add_user(user("root", "A", ADMIN_ROLE, "super_admin", STATE_ENABLED))
        .await;
    store
        .add_user(user("mallory", "C", VIEWER_ROLE, "viewer", STATE_DISABLED))
        .await;

    store
        .grant(VIEWER_ROLE, &["system:user:view", "system:dept:view"])
        .await;
    store
}

/// A handle on the app plus the store behind it.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryCredentialStore>,
}

impl TestApp {
    pub fn app(&self) -> Router {
        self.router.clone()
    }
}

/// Build the full application router with every request appearing to come
/// from `client_ip`.
pub async fn build_test_app_from(client_ip: &str) -> TestApp {
    build_test_app_with(test_config(), client_ip).await
}

pub async fn build_test_app_with(config: ServerConfig, client_ip: &str) -> TestApp {
    let pool = PgPoolOptions::new()
        .acquire_timeout(Duration::from_millis(200))
        .connect_lazy(&config.database_url)
        .expect("lazy pool should be created");
    let store = seeded_store().await;
    let state = AppState::new(
        pool,
        config,
        Arc::new(MemoryCache::new()),
        store.clone(),
    )
    .expect("state should build");

    let addr: SocketAddr = format!("{client_ip}:40000")
        .parse()
        .expect("valid socket address");
    let router = build_app_router(state)
        .expect("router should build")
        .layer(MockConnectInfo(addr));
    TestApp { router, store }
}

pub async fn build_test_app() -> TestApp {
    build_test_app_from(CLIENT_IP).await
}

/// The router over a real database, with the cache exposed for inspection.
pub struct PgTestApp {
    pub router: Router,
    pub pool: PgPool,
    pub cache: Arc<MemoryCache>,
    pub config: ServerConfig,
}

impl PgTestApp {
    pub fn app(&self) -> Router {
        self.router.clone()
    }

    /// Log in as the bootstrapped administrator.
    pub async fn login_admin(&self) -> String {
        login(
            self.app(),
            keystone_api::bootstrap::ADMIN_USER_NAME,
            &self.config.security.init_password,
        )
        .await
    }
}

/// Build the router over a migrated `pool` (from `#[sqlx::test]`) with the
/// initial administrator created.
pub async fn build_pg_app(pool: PgPool) -> PgTestApp {
    let config = test_config();
    ensure_admin(&pool, &config)
        .await
        .expect("administrator should be created");

    let cache = Arc::new(MemoryCache::new());
    let store = Arc::new(PgCredentialStore::new(pool.clone()));
    let state = AppState::new(pool.clone(), config.clone(), cache.clone(), store)
        .expect("state should build");

    let addr: SocketAddr = format!("{CLIENT_IP}:40000")
        .parse()
        .expect("valid socket address");
    let router = build_app_router(state)
        .expect("router should build")
        .layer(MockConnectInfo(addr));
    PgTestApp {
        router,
        pool,
        cache,
        config,
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

async fn send(
    app: Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(TOKEN_HEADER, token);
    }
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("serializable body"))
        }
        None => Body::empty(),
    };
    app.oneshot(builder.body(body).expect("valid request"))
        .await
        .expect("router is infallible")
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, None, None).await
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    send(app, Method::GET, uri, Some(token), None).await
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    send(app, Method::POST, uri, None, Some(body)).await
}

pub async fn post_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    send(app, Method::POST, uri, Some(token), None).await
}

pub async fn put_json_auth(
    app: Router,
    uri: &str,
    token: &str,
    body: serde_json::Value,
) -> Response<Body> {
    send(app, Method::PUT, uri, Some(token), Some(body)).await
}

pub async fn post_json_auth(
    app: Router,
    uri: &str,
    token: &str,
    body: serde_json::Value,
) -> Response<Body> {
    send(app, Method::POST, uri, Some(token), Some(body)).await
}

pub async fn delete_json_auth(
    app: Router,
    uri: &str,
    token: &str,
    body: serde_json::Value,
) -> Response<Body> {
    send(app, Method::DELETE, uri, Some(token), Some(body)).await
}

/// Read the response body as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("readable body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("JSON body")
}

/// Log in and return the session token.
pub async fn login(app: Router, user_name: &str, password: &str) -> String {
    let response = post_json(
        app,
        "/sys/login",
        serde_json::json!({ "userName": user_name, "password": password }),
    )
    .await;
    let json = body_json(response).await;
    assert_eq!(json["code"], 0, "login failed: {json}");
    json["data"]
        .as_str()
        .expect("token string")
        .to_string()
}
