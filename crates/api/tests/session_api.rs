//! HTTP-level tests for the session entry points: login, captcha, public key,
//! current user and logout, plus the lockout messages surfaced by login.

mod common;

use axum::http::StatusCode;
use common::{body_json, get, get_auth, login, post_auth, post_json, PASSWORD, TOKEN_HEADER};
use keystone_api::config::SessionConfig;

fn credentials(user_name: &str, password: &str) -> serde_json::Value {
    serde_json::json!({ "userName": user_name, "password": password })
}

// ---------------------------------------------------------------------------
// Login and current user
// ---------------------------------------------------------------------------

#[tokio::test]
async fn login_then_current_user_carries_scope_and_permissions() {
    let app = common::build_test_app().await;
    let token = login(app.app(), "alice", PASSWORD).await;

    let response = get_auth(app.app(), "/sys/user/getLoginUser", &token).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["code"], 0);

    let data = &json["data"];
    assert_eq!(data["userName"], "alice");
    assert_eq!(data["deptId"], "B");
    assert_eq!(data["childId"], "B,C");
    assert_eq!(data["ancestorId"], "A");

    let perms: Vec<&str> = data["permissions"]
        .as_array()
        .expect("permissions array")
        .iter()
        .filter_map(|p| p.as_str())
        .collect();
    assert!(perms.contains(&"system:user:view"));
    assert!(perms.contains(&"system:dept:view"));
}

#[tokio::test]
async fn login_writes_an_audit_entry() {
    let app = common::build_test_app().await;
    login(app.app(), "alice", PASSWORD).await;

    let logs = app.store.logs().await;
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].creator_id.as_deref(), Some("alice"));
}

#[tokio::test]
async fn login_with_blank_fields_is_a_validation_error() {
    let app = common::build_test_app().await;
    let response = post_json(app.app(), "/sys/login", credentials("", "")).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], 1005);
}

#[tokio::test]
async fn second_login_replaces_the_first_session() {
    let app = common::build_test_app().await;
    let first = login(app.app(), "alice", PASSWORD).await;
    let second = login(app.app(), "alice", PASSWORD).await;
    assert_ne!(first, second);

    let stale = get_auth(app.app(), "/sys/user/getLoginUser", &first).await;
    assert_eq!(stale.status(), StatusCode::UNAUTHORIZED);

    let live = get_auth(app.app(), "/sys/user/getLoginUser", &second).await;
    assert_eq!(live.status(), StatusCode::OK);
}

#[tokio::test]
async fn disabled_account_is_refused() {
    let app = common::build_test_app().await;
    let response = post_json(app.app(), "/sys/login", credentials("mallory", PASSWORD)).await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let json = body_json(response).await;
    assert_eq!(json["code"], 1002);
    assert!(json["message"].as_str().unwrap().contains("disabled"));
}

#[tokio::test]
async fn invalid_login_type_is_rejected_before_authenticating() {
    let app = common::build_test_app().await;
    let response = post_json(
        app.app(),
        "/sys/login",
        serde_json::json!({ "userName": "alice", "password": PASSWORD, "loginType": "we_b" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], 1005);
    assert!(app.store.logs().await.is_empty());
}

// ---------------------------------------------------------------------------
// Logout
// ---------------------------------------------------------------------------

#[tokio::test]
async fn logout_invalidates_the_token() {
    let app = common::build_test_app().await;
    let token = login(app.app(), "alice", PASSWORD).await;

    let response = post_auth(app.app(), "/sys/logout", &token).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["code"], 0);

    let response = get_auth(app.app(), "/sys/user/getLoginUser", &token).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], 1003);
}

// ---------------------------------------------------------------------------
// Token rotation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn aged_session_is_rotated_through_the_response_header() {
    let mut config = common::test_config();
    config.session = SessionConfig {
        rotate_after_secs: 0,
        ..SessionConfig::default()
    };
    let app = common::build_test_app_with(config, common::CLIENT_IP).await;
    let token = login(app.app(), "alice", PASSWORD).await;

    let response = get_auth(app.app(), "/sys/user/getLoginUser", &token).await;
    assert_eq!(response.status(), StatusCode::OK);
    let rotated = response
        .headers()
        .get(TOKEN_HEADER)
        .expect("rotated token header")
        .to_str()
        .unwrap()
        .to_string();
    assert_ne!(rotated, token);

    let old = get_auth(app.app(), "/sys/user/getLoginUser", &token).await;
    assert_eq!(old.status(), StatusCode::UNAUTHORIZED);

    let new = get_auth(app.app(), "/sys/user/getLoginUser", &rotated).await;
    assert_eq!(new.status(), StatusCode::OK);
}

#[tokio::test]
async fn fresh_session_keeps_its_token() {
    let app = common::build_test_app().await;
    let token = login(app.app(), "alice", PASSWORD).await;

    let response = get_auth(app.app(), "/sys/user/getLoginUser", &token).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(TOKEN_HEADER).is_none());
}

// ---------------------------------------------------------------------------
// Captcha and public key
// ---------------------------------------------------------------------------

#[tokio::test]
async fn captcha_is_issued_without_a_token() {
    let app = common::build_test_app().await;
    let response = get(app.app(), "/sys/getCode").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["codeId"].as_str().unwrap().len(), 32);
    assert_eq!(json["data"]["code"].as_str().unwrap().len(), 4);
}

#[tokio::test]
async fn public_key_is_served_without_a_token() {
    let app = common::build_test_app().await;
    let response = get(app.app(), "/sys/getKey").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["code"], 0);
    assert!(json["data"].is_string());
}

// ---------------------------------------------------------------------------
// Lockout
// ---------------------------------------------------------------------------

#[tokio::test]
async fn repeated_failures_count_down_then_lock() {
    let app = common::build_test_app().await;

    for remaining in [2, 1] {
        let response = post_json(app.app(), "/sys/login", credentials("alice", "wrong")).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = body_json(response).await;
        assert_eq!(json["code"], 1000);
        let message = json["message"].as_str().unwrap();
        assert!(
            message.contains(&format!("{remaining} of 3")),
            "unexpected message: {message}"
        );
    }

    let response = post_json(app.app(), "/sys/login", credentials("alice", "wrong")).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let json = body_json(response).await;
    assert_eq!(json["code"], 1004);
    assert!(json["message"].as_str().unwrap().contains("15 minutes"));

    // The correct password no longer helps inside the window.
    let response = post_json(app.app(), "/sys/login", credentials("alice", PASSWORD)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let json = body_json(response).await;
    assert_eq!(json["code"], 1004);
    assert!(json["message"].as_str().unwrap().starts_with("Account is locked"));
}

#[tokio::test]
async fn locked_ip_cannot_fetch_the_public_key() {
    let app = common::build_test_app().await;
    for _ in 0..3 {
        post_json(app.app(), "/sys/login", credentials("alice", "wrong")).await;
    }

    let response = get(app.app(), "/sys/getKey").await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let json = body_json(response).await;
    assert_eq!(json["code"], 1004);
    assert!(json["message"].as_str().unwrap().starts_with("IP is locked"));
}

#[tokio::test]
async fn unknown_users_lock_the_ip() {
    let app = common::build_test_app().await;
    for name in ["ghost1", "ghost2"] {
        let response = post_json(app.app(), "/sys/login", credentials(name, "x")).await;
        assert_eq!(body_json(response).await["code"], 1000);
    }

    let response = post_json(app.app(), "/sys/login", credentials("ghost3", "x")).await;
    assert_eq!(body_json(response).await["code"], 1004);

    let response = post_json(app.app(), "/sys/login", credentials("ghost4", "x")).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let json = body_json(response).await;
    assert_eq!(json["code"], 1004);
    assert!(json["message"].as_str().unwrap().starts_with("IP is locked"));
}
