//! Cart endpoints.

use reqwest::StatusCode;
use serde_json::json;
use seto_integration_tests::TestApp;

#[tokio::test]
async fn test_cart_starts_empty() {
    let app = TestApp::spawn().await;
    let (status, body) = app.visitor().get("/cart").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"], json!([]));
    assert_eq!(body["totalItems"], 0);
    assert_eq!(body["totalPrice"], 0);
}

#[tokio::test]
async fn test_cart_totals_follow_variants() {
    let app = TestApp::spawn().await;
    let visitor = app.visitor();

    visitor.add_to_cart("1", "whole_bean", 2).await;
    let body = visitor.add_to_cart("1", "ground", 1).await;

    // 1200 × 2 + (1200 + 300)
    assert_eq!(body["items"].as_array().map(Vec::len), Some(2));
    assert_eq!(body["totalItems"], 3);
    assert_eq!(body["totalPrice"], 3900);

    // Same variant again merges into the existing line.
    let body = visitor.add_to_cart("1", "whole_bean", 1).await;
    assert_eq!(body["items"].as_array().map(Vec::len), Some(2));
    assert_eq!(body["totalItems"], 4);

    // The cart survives across requests in the session.
    let (_, body) = visitor.get("/cart").await;
    assert_eq!(body["totalPrice"], 5100);
}

#[tokio::test]
async fn test_carts_are_per_visitor() {
    let app = TestApp::spawn().await;
    app.visitor().add_to_cart("1", "drip_bag", 1).await;

    let (_, body) = app.visitor().get("/cart").await;
    assert_eq!(body["totalItems"], 0);
}

#[tokio::test]
async fn test_update_quantity_and_remove_on_zero() {
    let app = TestApp::spawn().await;
    let visitor = app.visitor();
    let body = visitor.add_to_cart("1", "whole_bean", 1).await;
    let line_id = body["items"][0]["id"].clone();

    let (status, body) = visitor
        .post("/cart/update", &json!({ "id": line_id, "quantity": 3 }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalPrice"], 3600);

    let (status, body) = visitor
        .post("/cart/update", &json!({ "id": line_id, "quantity": 0 }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"], json!([]));
}

#[tokio::test]
async fn test_update_unknown_line_is_not_found() {
    let app = TestApp::spawn().await;
    let (status, _) = app
        .visitor()
        .post("/cart/update", &json!({ "id": "missing", "quantity": 2 }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_remove_and_clear() {
    let app = TestApp::spawn().await;
    let visitor = app.visitor();
    visitor.add_to_cart("1", "whole_bean", 1).await;
    let body = visitor.add_to_cart("1", "ground", 2).await;
    let ground_id = body["items"][1]["id"].clone();

    let (status, body) = visitor.post("/cart/remove", &json!({ "id": ground_id })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalItems"], 1);

    // Removing a line that is gone is a no-op.
    let (status, body) = visitor.post("/cart/remove", &json!({ "id": ground_id })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalItems"], 1);

    let (status, body) = visitor.post("/cart/clear", &json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalItems"], 0);
}

#[tokio::test]
async fn test_add_unknown_product_is_not_found() {
    let app = TestApp::spawn().await;
    let (status, _) = app
        .visitor()
        .post(
            "/cart/add",
            &json!({ "productId": "999", "grindType": "whole_bean" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_add_zero_quantity_is_rejected() {
    let app = TestApp::spawn().await;
    let (status, _) = app
        .visitor()
        .post(
            "/cart/add",
            &json!({ "productId": "1", "grindType": "whole_bean", "quantity": 0 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_concurrent_adds_from_one_session_are_all_kept() {
    let app = TestApp::spawn().await;
    let visitor = app.visitor();
    // Establish the session cookie so every add targets the same session.
    visitor.get("/cart").await;

    let mut adds = tokio::task::JoinSet::new();
    for _ in 0..20 {
        let tab = visitor.clone();
        adds.spawn(async move { tab.add_to_cart("1", "whole_bean", 1).await });
    }
    while let Some(added) = adds.join_next().await {
        added.expect("add task panicked");
    }

    let (_, body) = visitor.get("/cart").await;
    assert_eq!(body["items"].as_array().map(Vec::len), Some(1));
    assert_eq!(body["totalItems"], 20);
    assert_eq!(body["totalPrice"], 24000);
}
