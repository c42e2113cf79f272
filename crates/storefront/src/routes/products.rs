//! Product route handlers.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Serialize;
use seto_core::ProductId;
use seto_core::catalog::Product;
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::state::AppState;

/// `GET /products` response.
#[derive(Debug, Serialize)]
pub struct ProductList {
    pub products: Vec<Product>,
}

/// `GET /products/{id}` response.
#[derive(Debug, Serialize)]
pub struct ProductDetail {
    pub product: Product,
}

/// List all products.
#[instrument(skip(state))]
pub async fn index(State(state): State<AppState>) -> Json<ProductList> {
    Json(ProductList {
        products: state.catalog().list_products().await,
    })
}

/// Show a single product.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ProductDetail>> {
    let product = state
        .catalog()
        .get_product(&ProductId::new(id))
        .await
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;

    Ok(Json(ProductDetail { product }))
}
