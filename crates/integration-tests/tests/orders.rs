//! Order endpoints.

use reqwest::StatusCode;
use serde_json::json;
use seto_integration_tests::{TestApp, valid_shipping};

fn order_items() -> serde_json::Value {
    json!([
        { "id": "1:whole_bean", "name": "SETO Blend Coffee", "price": 1200, "quantity": 2 },
        { "id": "1:drip_bag", "name": "SETO Blend Coffee", "price": 2000, "quantity": 1 },
    ])
}

#[tokio::test]
async fn test_orders_require_customer_session() {
    let app = TestApp::spawn().await;
    let visitor = app.visitor();

    let (status, body) = visitor.get("/orders").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "認証が必要です");

    let (status, _) = visitor
        .post("/orders", &json!({ "items": order_items() }))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(app.orders.all().is_empty());
}

#[tokio::test]
async fn test_place_and_fetch_order() {
    let app = TestApp::spawn().await;
    let visitor = app.visitor();
    // Any storefront request establishes the customer session.
    visitor.get("/cart").await;

    let (status, body) = visitor
        .post(
            "/orders",
            &json!({ "items": order_items(), "shippingAddress": valid_shipping() }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["order"]["totalAmount"], 4400);
    assert_eq!(body["order"]["status"], "pending");
    let order_id = body["order"]["orderId"].as_str().expect("order id").to_string();

    let (status, body) = visitor.get(&format!("/orders?id={order_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["order"]["orderId"], order_id.as_str());

    let (status, body) = visitor.get("/orders").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["orders"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn test_orders_are_private_to_customer() {
    let app = TestApp::spawn().await;
    let owner = app.visitor();
    owner.get("/cart").await;
    let (_, body) = owner.post("/orders", &json!({ "items": order_items() })).await;
    let order_id = body["order"]["orderId"].as_str().expect("order id").to_string();

    let other = app.visitor();
    other.get("/cart").await;
    let (status, body) = other.get(&format!("/orders?id={order_id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "注文が見つかりません");

    let (_, body) = other.get("/orders").await;
    assert_eq!(body["orders"], json!([]));
}

#[tokio::test]
async fn test_place_order_validation() {
    let app = TestApp::spawn().await;
    let visitor = app.visitor();
    visitor.get("/cart").await;

    let (status, body) = visitor.post("/orders", &json!({ "items": [] })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "注文アイテムが必要です");

    let mut shipping = valid_shipping();
    shipping["phone"] = json!("call me");
    let (status, body) = visitor
        .post(
            "/orders",
            &json!({ "items": order_items(), "shippingAddress": shipping }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["fieldErrors"]["phone"].is_string());
}
