//! Cart route handlers.
//!
//! The cart lives in the visitor session under a versioned snapshot. Every
//! mutation runs load → change → save and responds with the updated cart
//! view; the session lock keeps concurrent mutations of one visitor apart.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use seto_core::cart::{Cart, CartError, CartItem, GrindType, NewCartItem};
use seto_core::{ProductId, Yen};
use tracing::instrument;

use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::Visitor;
use crate::models::session;
use crate::state::AppState;

/// Cart display data.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub items: Vec<CartItem>,
    pub total_items: u64,
    pub total_price: Yen,
}

impl From<&Cart> for CartView {
    fn from(cart: &Cart) -> Self {
        Self {
            items: cart.items().to_vec(),
            total_items: cart.total_items(),
            total_price: cart.total(),
        }
    }
}

/// Add to cart request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartRequest {
    pub product_id: ProductId,
    pub grind_type: GrindType,
    #[serde(default)]
    pub gift: bool,
    pub quantity: Option<u32>,
}

/// Update cart request body.
#[derive(Debug, Deserialize)]
pub struct UpdateCartRequest {
    pub id: String,
    pub quantity: i64,
}

/// Remove from cart request body.
#[derive(Debug, Deserialize)]
pub struct RemoveFromCartRequest {
    pub id: String,
}

// =============================================================================
// Session Helpers
// =============================================================================

/// Run `change` against the visitor's cart and persist the result.
async fn update_cart<F>(visitor: &Visitor, change: F) -> Result<CartView>
where
    F: FnOnce(&mut Cart) -> std::result::Result<(), CartError>,
{
    let mut cart = session::load_cart(&visitor.session).await?;
    change(&mut cart)?;
    session::save_cart(&visitor.session, &cart).await?;
    Ok(CartView::from(&cart))
}

// =============================================================================
// Handlers
// =============================================================================

/// Display the cart.
#[instrument(skip(visitor), fields(customer_id = %visitor.customer_id))]
pub async fn show(visitor: Visitor) -> Result<Json<CartView>> {
    let cart = session::load_cart(&visitor.session).await?;
    Ok(Json(CartView::from(&cart)))
}

/// Add a product variant to the cart.
///
/// The line name and unit price are computed from the catalog document, never
/// taken from the request.
#[instrument(skip(state, visitor), fields(customer_id = %visitor.customer_id))]
pub async fn add(
    State(state): State<AppState>,
    visitor: Visitor,
    Json(request): Json<AddToCartRequest>,
) -> Result<Json<CartView>> {
    let product = state
        .catalog()
        .get_product(&request.product_id)
        .await
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;
    let item = NewCartItem::for_product(&product, request.grind_type, request.gift)?;
    let quantity = request.quantity.unwrap_or(1);

    add_breadcrumb(
        "cart",
        "Added item",
        Some(&[("product_id", product.id.as_str()), ("variant", &item.id)]),
    );

    let view = update_cart(&visitor, |cart| cart.add(item, quantity)).await?;
    Ok(Json(view))
}

/// Change the quantity of a line; zero or less removes it.
#[instrument(skip(visitor), fields(customer_id = %visitor.customer_id))]
pub async fn update(
    visitor: Visitor,
    Json(request): Json<UpdateCartRequest>,
) -> Result<Json<CartView>> {
    let view = update_cart(&visitor, |cart| {
        cart.set_quantity(&request.id, request.quantity)
    })
    .await?;
    Ok(Json(view))
}

/// Remove a line. Removing a missing line is a no-op.
#[instrument(skip(visitor), fields(customer_id = %visitor.customer_id))]
pub async fn remove(
    visitor: Visitor,
    Json(request): Json<RemoveFromCartRequest>,
) -> Result<Json<CartView>> {
    let view = update_cart(&visitor, |cart| {
        cart.remove(&request.id);
        Ok(())
    })
    .await?;
    Ok(Json(view))
}

/// Empty the cart.
#[instrument(skip(visitor), fields(customer_id = %visitor.customer_id))]
pub async fn clear(visitor: Visitor) -> Result<Json<CartView>> {
    let view = update_cart(&visitor, |cart| {
        cart.clear();
        Ok(())
    })
    .await?;
    Ok(Json(view))
}
