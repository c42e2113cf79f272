//! Catalog endpoints, including the built-in fallback.

use std::sync::Arc;

use reqwest::StatusCode;
use seto_core::catalog::fallback_products;
use seto_integration_tests::{StaticProductStore, TestApp};

#[tokio::test]
async fn test_products_fall_back_when_store_is_down() {
    let app = TestApp::spawn().await;
    let visitor = app.visitor();

    let (status, body) = visitor.get("/products").await;
    assert_eq!(status, StatusCode::OK);
    let products = body["products"].as_array().expect("products array");
    assert_eq!(products.len(), 1);
    assert_eq!(products[0]["name"], "SETO Blend Coffee");
    assert_eq!(products[0]["price"], 1200);
    assert_eq!(products[0]["weightOptions"], serde_json::json!([100]));
}

#[tokio::test]
async fn test_product_detail_falls_back_when_store_is_down() {
    let app = TestApp::spawn().await;
    let visitor = app.visitor();

    let (status, body) = visitor.get("/products/1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["product"]["id"], "1");

    let (status, body) = visitor.get("/products/999").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Product not found");
}

#[tokio::test]
async fn test_products_served_from_store() {
    let mut product = fallback_products().remove(0);
    product.id = seto_core::ProductId::new("ethiopia");
    product.name = "SETO Single Origin - Ethiopia".to_string();
    let app = TestApp::spawn_with_products(Arc::new(StaticProductStore(vec![product]))).await;
    let visitor = app.visitor();

    let (status, body) = visitor.get("/products").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["products"][0]["id"], "ethiopia");

    // A reachable store is authoritative: no fallback for unknown ids.
    let (status, _) = visitor.get("/products/1").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
