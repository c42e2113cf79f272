//! Orders and the order finalizer.
//!
//! Checkout orders are built by [`finalize`] once the payment provider reports
//! the intent as completed. [`Order::place`] builds the pending orders created
//! directly through the orders API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cart::{CartItem, GrindType};
use crate::checkout::PaymentIntent;
use crate::shipping::ShippingInfo;
use crate::types::{CustomerId, MerchantPaymentId, OrderId, OrderStatus, PaymentStatus, Yen};

/// Payment method recorded on checkout orders.
pub const PAYMENT_METHOD_PAYPAY: &str = "PayPay";

/// Errors produced while building an order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FinalizeError {
    #[error("order has no items")]
    EmptyItems,
    #[error("item {0} has a zero quantity")]
    InvalidQuantity(String),
    #[error("payment {0} is not completed")]
    NotCompleted(MerchantPaymentId),
}

/// A line of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: String,
    pub name: String,
    pub price: Yen,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grind_type: Option<GrindType>,
}

impl OrderItem {
    /// `price × quantity`.
    #[must_use]
    pub fn line_total(&self) -> Yen {
        self.price.times(self.quantity)
    }
}

impl From<&CartItem> for OrderItem {
    fn from(item: &CartItem) -> Self {
        Self {
            id: item.id.clone(),
            name: item.name.clone(),
            price: item.unit_price,
            quantity: item.quantity,
            image_url: item.image_url.clone(),
            grind_type: Some(item.grind_type),
        }
    }
}

/// A placed order. Orders are never updated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub order_id: OrderId,
    pub customer_id: CustomerId,
    pub order_date: DateTime<Utc>,
    pub items: Vec<OrderItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipping_info: Option<ShippingInfo>,
    pub total_amount: Yen,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
    pub status: OrderStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merchant_payment_id: Option<MerchantPaymentId>,
}

/// Σ price × quantity.
#[must_use]
pub fn total_amount(items: &[OrderItem]) -> Yen {
    items.iter().map(OrderItem::line_total).sum()
}

fn check_items(items: &[OrderItem]) -> Result<(), FinalizeError> {
    if items.is_empty() {
        return Err(FinalizeError::EmptyItems);
    }
    if let Some(item) = items.iter().find(|item| item.quantity == 0) {
        return Err(FinalizeError::InvalidQuantity(item.id.clone()));
    }
    Ok(())
}

/// Build the order for a completed checkout.
///
/// The result depends only on its inputs, so finalizing the same attempt twice
/// yields the same order (same id, same merchant payment id). The order id is
/// taken from the intent.
///
/// # Errors
///
/// Returns `FinalizeError::NotCompleted` if the intent is not `COMPLETED` and
/// `FinalizeError::EmptyItems` for an empty cart.
pub fn finalize(
    items: &[CartItem],
    shipping: &ShippingInfo,
    intent: &PaymentIntent,
    customer_id: CustomerId,
    completed_at: DateTime<Utc>,
) -> Result<Order, FinalizeError> {
    if intent.status != PaymentStatus::Completed {
        return Err(FinalizeError::NotCompleted(
            intent.merchant_payment_id.clone(),
        ));
    }

    let items: Vec<OrderItem> = items.iter().map(OrderItem::from).collect();
    check_items(&items)?;

    Ok(Order {
        order_id: intent.order_id.clone(),
        customer_id,
        order_date: completed_at,
        total_amount: total_amount(&items),
        items,
        shipping_info: Some(shipping.clone()),
        payment_method: Some(PAYMENT_METHOD_PAYPAY.to_owned()),
        status: OrderStatus::Completed,
        merchant_payment_id: Some(intent.merchant_payment_id.clone()),
    })
}

impl Order {
    /// Build a pending order submitted through the orders API.
    ///
    /// # Errors
    ///
    /// Returns `FinalizeError::EmptyItems` or `FinalizeError::InvalidQuantity`.
    pub fn place(
        customer_id: CustomerId,
        items: Vec<OrderItem>,
        shipping_info: Option<ShippingInfo>,
        now: DateTime<Utc>,
    ) -> Result<Self, FinalizeError> {
        check_items(&items)?;

        Ok(Self {
            order_id: OrderId::generate(),
            customer_id,
            order_date: now,
            total_amount: total_amount(&items),
            items,
            shipping_info,
            payment_method: None,
            status: OrderStatus::Pending,
            merchant_payment_id: None,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{Email, ProductId};

    fn cart_item(id: &str, price: u64, quantity: u32) -> CartItem {
        CartItem {
            id: id.to_string(),
            product_id: ProductId::new("1"),
            name: "X".to_string(),
            unit_price: Yen::new(price),
            quantity,
            grind_type: GrindType::WholeBean,
            image_url: None,
            gift: false,
        }
    }

    fn shipping() -> ShippingInfo {
        ShippingInfo {
            full_name: "山田 太郎".to_string(),
            postal_code: "123-4567".to_string(),
            prefecture: "東京都".to_string(),
            city: "千代田区".to_string(),
            address: "1-1-1".to_string(),
            building: None,
            phone: "090-1234-5678".to_string(),
            email: Email::parse("taro@example.com").unwrap(),
        }
    }

    fn intent(status: PaymentStatus) -> PaymentIntent {
        let order_id = OrderId::new("order_1");
        PaymentIntent {
            merchant_payment_id: MerchantPaymentId::for_order(&order_id),
            order_id,
            amount: Yen::new(2400),
            payment_url: String::new(),
            deep_link: String::new(),
            expiry_date: None,
            status,
        }
    }

    #[test]
    fn test_finalize_totals_items() {
        let order = finalize(
            &[cart_item("1", 1200, 2)],
            &shipping(),
            &intent(PaymentStatus::Completed),
            CustomerId::generate(),
            Utc::now(),
        )
        .unwrap();

        assert_eq!(order.total_amount, Yen::new(2400));
        assert_eq!(order.payment_method.as_deref(), Some("PayPay"));
        assert_eq!(order.status, OrderStatus::Completed);
        assert_eq!(order.order_id.as_str(), "order_1");
        assert_eq!(order.merchant_payment_id.unwrap().as_str(), "order_1");
    }

    #[test]
    fn test_finalize_is_deterministic() {
        let customer = CustomerId::generate();
        let at = Utc::now();
        let items = [cart_item("1", 1200, 1), cart_item("2", 1500, 3)];
        let completed = intent(PaymentStatus::Completed);

        let first = finalize(&items, &shipping(), &completed, customer, at).unwrap();
        let second = finalize(&items, &shipping(), &completed, customer, at).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.total_amount, Yen::new(5700));
    }

    #[test]
    fn test_finalize_requires_completed_intent() {
        let err = finalize(
            &[cart_item("1", 1200, 1)],
            &shipping(),
            &intent(PaymentStatus::Created),
            CustomerId::generate(),
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, FinalizeError::NotCompleted(_)));
    }

    #[test]
    fn test_finalize_rejects_empty_cart() {
        let err = finalize(
            &[],
            &shipping(),
            &intent(PaymentStatus::Completed),
            CustomerId::generate(),
            Utc::now(),
        )
        .unwrap_err();
        assert_eq!(err, FinalizeError::EmptyItems);
    }

    #[test]
    fn test_place_pending_order() {
        let items = vec![OrderItem {
            id: "1".to_string(),
            name: "X".to_string(),
            price: Yen::new(1200),
            quantity: 2,
            image_url: None,
            grind_type: None,
        }];
        let order = Order::place(CustomerId::generate(), items, None, Utc::now()).unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.total_amount, Yen::new(2400));
        assert!(order.payment_method.is_none());
    }

    #[test]
    fn test_place_rejects_zero_quantity() {
        let items = vec![OrderItem {
            id: "1".to_string(),
            name: "X".to_string(),
            price: Yen::new(1200),
            quantity: 0,
            image_url: None,
            grind_type: None,
        }];
        assert_eq!(
            Order::place(CustomerId::generate(), items, None, Utc::now()),
            Err(FinalizeError::InvalidQuantity("1".to_string()))
        );
    }

    #[test]
    fn test_order_json_shape() {
        let order = finalize(
            &[cart_item("1", 1200, 2)],
            &shipping(),
            &intent(PaymentStatus::Completed),
            CustomerId::generate(),
            Utc::now(),
        )
        .unwrap();
        let json = serde_json::to_value(&order).unwrap();
        assert_eq!(json["totalAmount"], 2400);
        assert_eq!(json["status"], "completed");
        assert_eq!(json["shippingInfo"]["postalCode"], "123-4567");
    }
}
