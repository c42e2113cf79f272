//! Raw payment endpoints.

use std::time::Duration;

use reqwest::StatusCode;
use serde_json::json;
use seto_integration_tests::TestApp;

/// The payment creation route is rate limited per client address.
const CLIENT_IP: (&str, &str) = ("x-forwarded-for", "203.0.113.7");

#[tokio::test]
async fn test_create_requires_amount_and_description() {
    let app = TestApp::spawn().await;
    let visitor = app.visitor();

    let (status, body) = visitor
        .post_with_headers("/payment/create", &json!({ "amount": 1200 }), &[CLIENT_IP])
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "金額と注文内容は必須です");

    let (status, _) = visitor
        .post_with_headers(
            "/payment/create",
            &json!({ "amount": 0, "orderDescription": "SETO Blend Coffee" }),
            &[CLIENT_IP],
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.gateway.created_count(), 0);
}

#[tokio::test]
async fn test_create_then_status_and_cancel() {
    let app = TestApp::spawn().await;
    let visitor = app.visitor();

    let (status, body) = visitor
        .post_with_headers(
            "/payment/create",
            &json!({ "amount": 1500, "orderDescription": "SETO Blend Coffee x1" }),
            &[CLIENT_IP],
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let merchant_payment_id = body["data"]["merchantPaymentId"]
        .as_str()
        .expect("merchant payment id")
        .to_string();
    assert_eq!(body["data"]["orderId"], merchant_payment_id.as_str());

    let (status, body) = visitor
        .get(&format!("/payment/status?merchantPaymentId={merchant_payment_id}"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "CREATED");
    assert_eq!(body["data"]["amount"]["amount"], 1500);
    assert_eq!(body["data"]["amount"]["currency"], "JPY");

    let (status, body) = visitor
        .post(
            "/payment/cancel",
            &json!({ "merchantPaymentId": merchant_payment_id }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(app.gateway.canceled().len(), 1);
}

#[tokio::test]
async fn test_idempotency_key_replays_response() {
    let app = TestApp::spawn().await;
    let visitor = app.visitor();
    let request = json!({ "amount": 1200, "orderDescription": "SETO Blend Coffee x1" });
    let headers = [CLIENT_IP, ("idempotency-key", "checkout-42")];

    let (_, first) = visitor
        .post_with_headers("/payment/create", &request, &headers)
        .await;
    let (status, second) = visitor
        .post_with_headers("/payment/create", &request, &headers)
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(first, second);
    assert_eq!(app.gateway.created_count(), 1);
}

#[tokio::test]
async fn test_concurrent_requests_with_one_key_create_one_payment() {
    let app = TestApp::spawn().await;
    app.gateway.set_create_delay(Duration::from_millis(200));
    let request = json!({ "amount": 1200, "orderDescription": "SETO Blend Coffee x1" });
    let headers = [CLIENT_IP, ("idempotency-key", "checkout-43")];

    // Separate visitors carry no session, so nothing else serializes them.
    let (first, second) = tokio::join!(
        async {
            app.visitor()
                .post_with_headers("/payment/create", &request, &headers)
                .await
        },
        async {
            app.visitor()
                .post_with_headers("/payment/create", &request, &headers)
                .await
        },
    );

    assert_eq!(first.0, StatusCode::OK);
    assert_eq!(second.0, StatusCode::OK);
    assert_eq!(
        first.1["data"]["merchantPaymentId"],
        second.1["data"]["merchantPaymentId"]
    );
    assert_eq!(app.gateway.created_count(), 1);
}

#[tokio::test]
async fn test_failed_create_is_not_replayed_for_its_key() {
    let app = TestApp::spawn().await;
    let visitor = app.visitor();
    let request = json!({ "amount": 1200, "orderDescription": "SETO Blend Coffee x1" });
    let headers = [CLIENT_IP, ("idempotency-key", "checkout-44")];

    app.gateway.reject_create(true);
    let (status, _) = visitor
        .post_with_headers("/payment/create", &request, &headers)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    app.gateway.reject_create(false);
    let (status, body) = visitor
        .post_with_headers("/payment/create", &request, &headers)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["merchantPaymentId"].is_string());
    assert_eq!(app.gateway.created_count(), 1);
}

#[tokio::test]
async fn test_provider_rejection_is_bad_request() {
    let app = TestApp::spawn().await;
    app.gateway.reject_create(true);

    let (status, body) = app
        .visitor()
        .post_with_headers(
            "/payment/create",
            &json!({ "amount": 1200, "orderDescription": "SETO Blend Coffee x1" }),
            &[CLIENT_IP],
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "金額が不正です");
}

#[tokio::test]
async fn test_status_requires_valid_id() {
    let app = TestApp::spawn().await;
    let visitor = app.visitor();

    let (status, body) = visitor.get("/payment/status").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "決済IDは必須です");

    let (status, _) = visitor
        .get("/payment/status?merchantPaymentId=..%2Fv2%2Fcodes")
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_is_rate_limited() {
    let app = TestApp::spawn().await;
    let visitor = app.visitor();
    let request = json!({ "amount": 1200, "orderDescription": "SETO Blend Coffee x1" });

    let mut limited = false;
    for _ in 0..20 {
        let (status, _) = visitor
            .post_with_headers("/payment/create", &request, &[CLIENT_IP])
            .await;
        if status == StatusCode::TOO_MANY_REQUESTS {
            limited = true;
            break;
        }
    }
    assert!(limited);
}
