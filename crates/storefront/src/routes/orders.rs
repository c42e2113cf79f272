//! Order route handlers.
//!
//! Both endpoints require a customer session; orders are only ever visible to
//! the customer that placed them.

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use seto_core::OrderId;
use seto_core::order::{Order, OrderItem};
use seto_core::shipping::ShippingForm;
use tracing::instrument;

use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::RequireCustomer;
use crate::state::AppState;

const MSG_ITEMS_REQUIRED: &str = "注文アイテムが必要です";
const MSG_ORDER_NOT_FOUND: &str = "注文が見つかりません";

/// `GET /orders` query.
#[derive(Debug, Deserialize)]
pub struct OrdersQuery {
    pub id: Option<String>,
}

/// `GET /orders` response: the list, or a single order when `id` is given.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum OrdersResponse {
    List { orders: Vec<Order> },
    Single { order: Order },
}

/// `POST /orders` body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[serde(default)]
    pub items: Vec<OrderItem>,
    pub shipping_address: Option<ShippingForm>,
}

/// `POST /orders` response.
#[derive(Debug, Serialize)]
pub struct CreatedOrder {
    pub success: bool,
    pub order: Order,
}

/// List the customer's orders, or fetch one by id.
#[instrument(skip(state), fields(customer_id = %customer_id))]
pub async fn index(
    State(state): State<AppState>,
    RequireCustomer(customer_id): RequireCustomer,
    Query(query): Query<OrdersQuery>,
) -> Result<Json<OrdersResponse>> {
    if let Some(id) = query.id {
        let order = state
            .orders()
            .get(customer_id, &OrderId::new(id))
            .await?
            .ok_or_else(|| AppError::NotFound(MSG_ORDER_NOT_FOUND.to_string()))?;
        return Ok(Json(OrdersResponse::Single { order }));
    }

    let orders = state.orders().list_for_customer(customer_id).await?;
    Ok(Json(OrdersResponse::List { orders }))
}

/// Place a pending order.
///
/// A shipping address, when given, must pass the same validation as the
/// checkout shipping form.
#[instrument(skip(state, request), fields(customer_id = %customer_id))]
pub async fn create(
    State(state): State<AppState>,
    RequireCustomer(customer_id): RequireCustomer,
    Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<CreatedOrder>)> {
    if request.items.is_empty() {
        return Err(AppError::BadRequest(MSG_ITEMS_REQUIRED.to_string()));
    }
    let shipping_info = request
        .shipping_address
        .map(ShippingForm::into_validated)
        .transpose()
        .map_err(AppError::Validation)?;

    let order = Order::place(customer_id, request.items, shipping_info, Utc::now())?;
    state.orders().insert(&order).await?;

    add_breadcrumb(
        "orders",
        "Order placed",
        Some(&[("order_id", order.order_id.as_str())]),
    );
    tracing::info!(order_id = %order.order_id, total = %order.total_amount, "Pending order placed");

    Ok((
        StatusCode::CREATED,
        Json(CreatedOrder {
            success: true,
            order,
        }),
    ))
}
