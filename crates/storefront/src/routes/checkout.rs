//! Checkout route handlers: shipping capture, payment and confirmation.
//!
//! A completed payment reaches the session through [`apply_completion`], which
//! every payment read calls: the first call after the order was stored clears
//! the cart and shipping details, records the order as `last_order` and saves
//! the session before the checkout lets go of the order.

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, header::USER_AGENT},
};
use serde::Serialize;
use seto_core::order::Order;
use seto_core::shipping::{ShippingForm, ShippingInfo};
use tracing::instrument;

use crate::checkout::{CheckoutRequest, CheckoutView};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::Visitor;
use crate::models::session;
use crate::state::AppState;

const MSG_EMPTY_CART: &str = "カートが空です";
const MSG_SHIPPING_REQUIRED: &str = "配送先情報を入力してください";
const MSG_ORDER_NOT_FOUND: &str = "注文が見つかりません";

/// Shipping details response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingView {
    pub valid: bool,
    pub shipping_info: Option<ShippingInfo>,
}

/// Confirmation response.
#[derive(Debug, Serialize)]
pub struct CompleteView {
    pub order: Order,
}

/// Hand a completed order to the session, once.
///
/// A failed session save leaves the order with the checkout, so the next read
/// applies it again instead of the visitor paying twice.
async fn apply_completion(state: &AppState, visitor: &Visitor) -> Result<Option<Order>> {
    let Some(order) = state.checkout().completed_order(visitor.customer_id).await else {
        return Ok(None);
    };
    if session::apply_completed_order(&visitor.session, &order).await? {
        visitor.session.save().await?;
        add_breadcrumb(
            "checkout",
            "Order confirmed",
            Some(&[("order_id", order.order_id.as_str())]),
        );
    }
    state
        .checkout()
        .acknowledge_completed(visitor.customer_id, &order.order_id)
        .await;
    Ok(Some(order))
}

/// Show the stored shipping details.
#[instrument(skip(visitor), fields(customer_id = %visitor.customer_id))]
pub async fn shipping_show(visitor: Visitor) -> Result<Json<ShippingView>> {
    let shipping_info = session::shipping_info(&visitor.session).await?;
    Ok(Json(ShippingView {
        valid: shipping_info.is_some(),
        shipping_info,
    }))
}

/// Validate and store the shipping form.
///
/// Responds 422 with per-field messages when the form is invalid.
#[instrument(skip(visitor, form), fields(customer_id = %visitor.customer_id))]
pub async fn shipping_submit(
    visitor: Visitor,
    Json(form): Json<ShippingForm>,
) -> Result<Json<ShippingView>> {
    let info = form.into_validated().map_err(AppError::Validation)?;

    session::save_shipping_info(&visitor.session, &info).await?;
    add_breadcrumb("checkout", "Shipping details saved", None);

    Ok(Json(ShippingView {
        valid: true,
        shipping_info: Some(info),
    }))
}

/// Confirm the checkout: create the payment intent and start polling.
///
/// Confirming again while a payment is in flight returns the current attempt.
#[instrument(skip(state, visitor, headers), fields(customer_id = %visitor.customer_id))]
pub async fn payment_confirm(
    State(state): State<AppState>,
    visitor: Visitor,
    headers: HeaderMap,
) -> Result<Json<CheckoutView>> {
    if let Some(order) = apply_completion(&state, &visitor).await? {
        return Ok(Json(CheckoutView::completed(order)));
    }

    let cart = session::load_cart(&visitor.session).await?;
    if cart.is_empty() {
        return Err(AppError::BadRequest(MSG_EMPTY_CART.to_string()));
    }
    let shipping = session::shipping_info(&visitor.session)
        .await?
        .ok_or_else(|| AppError::BadRequest(MSG_SHIPPING_REQUIRED.to_string()))?;

    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_owned();

    let view = state
        .checkout()
        .confirm(
            visitor.customer_id,
            CheckoutRequest {
                items: cart.into_items(),
                shipping,
                user_agent,
            },
        )
        .await?;
    Ok(Json(view))
}

/// Current state of the checkout attempt.
#[instrument(skip(state, visitor), fields(customer_id = %visitor.customer_id))]
pub async fn payment_show(
    State(state): State<AppState>,
    visitor: Visitor,
) -> Result<Json<CheckoutView>> {
    if let Some(order) = apply_completion(&state, &visitor).await? {
        return Ok(Json(CheckoutView::completed(order)));
    }

    let view = state
        .checkout()
        .view(visitor.customer_id)
        .await
        .unwrap_or_else(CheckoutView::idle);
    Ok(Json(view))
}

/// Abandon the checkout attempt.
#[instrument(skip(state, visitor), fields(customer_id = %visitor.customer_id))]
pub async fn payment_abandon(
    State(state): State<AppState>,
    visitor: Visitor,
) -> Result<Json<CheckoutView>> {
    let view = state
        .checkout()
        .abandon(visitor.customer_id)
        .await?
        .unwrap_or_else(CheckoutView::idle);
    Ok(Json(view))
}

/// The confirmed order.
///
/// The payment provider redirects the visitor here after paying.
#[instrument(skip(state, visitor), fields(customer_id = %visitor.customer_id))]
pub async fn complete(
    State(state): State<AppState>,
    visitor: Visitor,
) -> Result<Json<CompleteView>> {
    if let Some(order) = apply_completion(&state, &visitor).await? {
        return Ok(Json(CompleteView { order }));
    }

    let order = session::last_order(&visitor.session)
        .await?
        .ok_or_else(|| AppError::NotFound(MSG_ORDER_NOT_FOUND.to_string()))?;
    Ok(Json(CompleteView { order }))
}
