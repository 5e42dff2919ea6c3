//! HTTP-level tests for the authorization filter: allow-list, token checks,
//! route permissions, data scope and the headers added to passing requests.

mod common;

use axum::http::{header, StatusCode};
use common::{body_json, get, get_auth, login, post_json, PASSWORD};

// ---------------------------------------------------------------------------
// IP allow-list
// ---------------------------------------------------------------------------

#[tokio::test]
async fn address_outside_allow_list_is_rejected_even_on_exempt_paths() {
    let app = common::build_test_app_from("10.0.1.7").await;

    let response = get(app.app(), "/sys/getCode").await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let json = body_json(response).await;
    assert_eq!(json["code"], 1001);
    assert_eq!(json["message"], "Illegal access");

    let response = post_json(
        app.app(),
        "/sys/login",
        serde_json::json!({ "userName": "alice", "password": PASSWORD }),
    )
    .await;
    assert_eq!(body_json(response).await["code"], 1001);
}

#[tokio::test]
async fn wildcard_and_exact_entries_admit_their_addresses() {
    for ip in ["10.0.0.99", "127.0.0.1"] {
        let app = common::build_test_app_from(ip).await;
        let response = get(app.app(), "/sys/getCode").await;
        assert_eq!(response.status(), StatusCode::OK, "{ip} should be admitted");
    }
}

#[tokio::test]
async fn health_is_outside_the_filter() {
    let app = common::build_test_app_from("192.168.9.9").await;
    let response = get(app.app(), "/health").await;
    assert_eq!(response.status(), StatusCode::OK);
}

// ---------------------------------------------------------------------------
// Token
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_token_is_not_authenticated() {
    let app = common::build_test_app().await;
    let response = get(app.app(), "/sys/user/getLoginUser").await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["code"], 1003);
    assert_eq!(json["message"], "Not logged in");
}

#[tokio::test]
async fn unknown_token_is_not_authenticated() {
    let app = common::build_test_app().await;
    let response = get_auth(app.app(), "/sys/user/list", "no-such-token").await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], 1003);
}

// ---------------------------------------------------------------------------
// Route permissions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_permission_is_denied_before_the_handler() {
    let app = common::build_test_app().await;
    let token = login(app.app(), "alice", PASSWORD).await;

    for uri in ["/sys/role/list", "/sys/safe/getSafeSet", "/sys/menu/list"] {
        let response = get_auth(app.app(), uri, &token).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{uri}");
        let json = body_json(response).await;
        assert_eq!(json["code"], 1002, "{uri}");
    }
}

#[tokio::test]
async fn any_listed_alternative_grants_access() {
    let app = common::build_test_app().await;
    let token = login(app.app(), "alice", PASSWORD).await;

    // Passes the filter on `system:user:view`, then the handler refuses a
    // department outside the caller's subtree.
    let response = get_auth(app.app(), "/sys/dept/getById/A", &token).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let json = body_json(response).await;
    assert_eq!(json["code"], 1002);
    assert!(json["message"].as_str().unwrap().contains("No data permission"));
}

#[tokio::test]
async fn permissions_are_loaded_from_the_store_on_first_check() {
    let app = common::build_test_app().await;
    let token = login(app.app(), "alice", PASSWORD).await;
    app.store.revoke_all(common::VIEWER_ROLE).await;

    // Nothing has been cached for the role yet.
    let response = get_auth(app.app(), "/sys/dept/getById/A", &token).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let json = body_json(response).await;
    assert_eq!(json["code"], 1002);
    assert!(json["message"]
        .as_str()
        .unwrap()
        .contains("Insufficient permissions"));
}

#[tokio::test]
async fn super_admin_without_grants_is_denied() {
    let app = common::build_test_app().await;
    let token = login(app.app(), "root", PASSWORD).await;

    let response = get_auth(app.app(), "/sys/safe/getSafeSet", &token).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let json = body_json(response).await;
    assert_eq!(json["code"], 1002);
    assert!(json["message"]
        .as_str()
        .unwrap()
        .contains("Insufficient permissions"));
}

#[tokio::test]
async fn super_admin_passes_with_the_granted_permission() {
    let app = common::build_test_app().await;
    app.store
        .grant(common::ADMIN_ROLE, &["system:userLog:view"])
        .await;
    let token = login(app.app(), "root", PASSWORD).await;

    let response = get_auth(app.app(), "/sys/safe/getSafeSet", &token).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["code"], 0);
    assert_eq!(json["data"]["pwdLoginLimit"], 0);
    assert_eq!(json["data"]["idleTimeSetting"], 1);
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let app = common::build_test_app().await;
    let response = get(app.app(), "/sys/nothing/here").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Response headers
// ---------------------------------------------------------------------------

#[tokio::test]
async fn passing_requests_carry_security_headers() {
    let app = common::build_test_app().await;
    let token = login(app.app(), "alice", PASSWORD).await;

    let response = get_auth(app.app(), "/sys/user/getLoginUser", &token).await;
    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers[header::X_FRAME_OPTIONS], "SAMEORIGIN");
    assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
    assert_eq!(headers[header::REFERRER_POLICY], "no-referrer");
    assert_eq!(
        headers[header::CACHE_CONTROL],
        "no-cache, no-store, must-revalidate"
    );
    assert!(headers.contains_key(header::CONTENT_SECURITY_POLICY));
    assert!(headers.contains_key("x-request-id"));
}

#[tokio::test]
async fn rejected_requests_do_not_carry_security_headers() {
    let app = common::build_test_app().await;
    let response = get(app.app(), "/sys/user/getLoginUser").await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(!response.headers().contains_key(header::X_FRAME_OPTIONS));
}
