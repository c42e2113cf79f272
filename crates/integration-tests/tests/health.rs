//! Health checks and cross-cutting middleware.

use reqwest::StatusCode;
use seto_integration_tests::TestApp;

#[tokio::test]
async fn test_liveness() {
    let app = TestApp::spawn().await;
    let response = app.visitor().get_raw("/health").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.expect("body"), "ok");
}

#[tokio::test]
async fn test_readiness_without_database() {
    let app = TestApp::spawn().await;
    let response = app.visitor().get_raw("/health/ready").await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_security_headers_and_request_id() {
    let app = TestApp::spawn().await;
    let response = app.visitor().get_raw("/cart").await;
    let headers = response.headers();

    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["x-frame-options"], "DENY");
    assert_eq!(headers["cache-control"], "no-store");
    assert!(headers.contains_key("x-request-id"));
}

#[tokio::test]
async fn test_session_cookie_is_http_only() {
    let app = TestApp::spawn().await;
    let response = app.visitor().get_raw("/cart").await;
    let cookie = response
        .headers()
        .get("set-cookie")
        .and_then(|v| v.to_str().ok())
        .expect("session cookie")
        .to_string();

    assert!(cookie.starts_with("seto_session="));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Lax"));
}
