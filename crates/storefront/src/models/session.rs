//! Session-related types.
//!
//! The visitor's cart, shipping details and last order live in the session
//! instead of the browser. Read-modify-write cycles on these keys are safe
//! because [`crate::middleware::session_lock_middleware`] runs one request
//! per session at a time.

use seto_core::cart::{Cart, CartSnapshot};
use seto_core::order::Order;
use seto_core::shipping::ShippingInfo;
use seto_core::{CustomerId, OrderId};
use tower_sessions::Session;
use tower_sessions::session::Error;

/// Session keys.
pub mod keys {
    /// Anonymous customer id, assigned on first use.
    pub const CUSTOMER: &str = "customer";

    /// Versioned cart snapshot.
    pub const CART: &str = "cart";

    /// Validated shipping details.
    pub const SHIPPING_INFO: &str = "shipping_info";

    /// Snapshot of the most recent completed order.
    pub const LAST_ORDER: &str = "last_order";

    /// Id of the last order whose completion was applied to this session.
    pub const APPLIED_ORDER: &str = "applied_order";
}

/// The customer id stored in the session, if any.
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn customer_id(session: &Session) -> Result<Option<CustomerId>, Error> {
    session.get(keys::CUSTOMER).await
}

/// The customer id stored in the session, assigning a new one if needed.
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn ensure_customer_id(session: &Session) -> Result<CustomerId, Error> {
    if let Some(id) = customer_id(session).await? {
        return Ok(id);
    }
    let id = CustomerId::generate();
    session.insert(keys::CUSTOMER, id).await?;
    tracing::debug!(customer_id = %id, "Assigned customer id");
    Ok(id)
}

/// Rehydrate the cart.
///
/// A snapshot that cannot be decoded or has an unknown schema version is
/// logged and replaced with an empty cart.
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn load_cart(session: &Session) -> Result<Cart, Error> {
    let snapshot = match session.get::<CartSnapshot>(keys::CART).await {
        Ok(Some(snapshot)) => snapshot,
        Ok(None) => return Ok(Cart::new()),
        Err(Error::SerdeJson(e)) => {
            tracing::warn!(error = %e, "Discarding undecodable cart");
            return Ok(Cart::new());
        }
        Err(e) => return Err(e),
    };

    Ok(Cart::from_snapshot(snapshot).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Discarding stored cart");
        Cart::new()
    }))
}

/// Persist the cart.
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn save_cart(session: &Session, cart: &Cart) -> Result<(), Error> {
    session.insert(keys::CART, cart.snapshot()).await
}

/// The stored shipping details.
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn shipping_info(session: &Session) -> Result<Option<ShippingInfo>, Error> {
    match session.get(keys::SHIPPING_INFO).await {
        Err(Error::SerdeJson(e)) => {
            tracing::warn!(error = %e, "Discarding undecodable shipping info");
            Ok(None)
        }
        other => other,
    }
}

/// Persist validated shipping details.
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn save_shipping_info(session: &Session, info: &ShippingInfo) -> Result<(), Error> {
    session.insert(keys::SHIPPING_INFO, info).await
}

/// The most recent completed order.
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn last_order(session: &Session) -> Result<Option<Order>, Error> {
    session.get(keys::LAST_ORDER).await
}

/// Apply a completed order to the session: clear the cart and shipping
/// details and remember the order.
///
/// Returns `false` if this order was already applied.
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn apply_completed_order(session: &Session, order: &Order) -> Result<bool, Error> {
    let applied: Option<OrderId> = session.get(keys::APPLIED_ORDER).await?;
    if applied.as_ref() == Some(&order.order_id) {
        return Ok(false);
    }

    session.remove_value(keys::CART).await?;
    session.remove_value(keys::SHIPPING_INFO).await?;
    session.insert(keys::LAST_ORDER, order).await?;
    session.insert(keys::APPLIED_ORDER, &order.order_id).await?;
    tracing::info!(order_id = %order.order_id, "Checkout completed, cart cleared");
    Ok(true)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use seto_core::cart::{GrindType, NewCartItem};
    use seto_core::order::OrderItem;
    use seto_core::{ProductId, Yen};
    use tower_sessions::MemoryStore;

    use super::*;

    fn session() -> Session {
        Session::new(None, Arc::new(MemoryStore::default()), None)
    }

    fn new_item() -> NewCartItem {
        NewCartItem {
            id: "1:whole_bean".to_string(),
            product_id: ProductId::new("1"),
            name: "SETO Blend Coffee (100g, 豆のまま)".to_string(),
            unit_price: Yen::new(1200),
            grind_type: GrindType::WholeBean,
            image_url: None,
            gift: false,
        }
    }

    #[tokio::test]
    async fn test_customer_id_is_stable() {
        let session = session();
        assert!(customer_id(&session).await.unwrap().is_none());
        let first = ensure_customer_id(&session).await.unwrap();
        let second = ensure_customer_id(&session).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_cart_round_trips_through_session() {
        let session = session();
        let mut cart = load_cart(&session).await.unwrap();
        cart.add(new_item(), 2).unwrap();
        save_cart(&session, &cart).await.unwrap();

        let cart = load_cart(&session).await.unwrap();
        assert_eq!(cart.total(), Yen::new(2400));
    }

    #[tokio::test]
    async fn test_unknown_cart_version_rehydrates_empty() {
        let session = session();
        session
            .insert(
                keys::CART,
                serde_json::json!({"version": 99, "items": []}),
            )
            .await
            .unwrap();
        assert!(load_cart(&session).await.unwrap().is_empty());

        session.insert(keys::CART, "not a cart").await.unwrap();
        assert!(load_cart(&session).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_completed_order_is_applied_once() {
        let session = session();
        let mut cart = Cart::new();
        cart.add(new_item(), 1).unwrap();
        save_cart(&session, &cart).await.unwrap();

        let order = Order::place(
            CustomerId::generate(),
            vec![OrderItem {
                id: "1".to_string(),
                name: "X".to_string(),
                price: Yen::new(1200),
                quantity: 1,
                image_url: None,
                grind_type: None,
            }],
            None,
            Utc::now(),
        )
        .unwrap();

        assert!(apply_completed_order(&session, &order).await.unwrap());
        assert!(load_cart(&session).await.unwrap().is_empty());
        assert_eq!(last_order(&session).await.unwrap().unwrap().order_id, order.order_id);

        let mut cart = Cart::new();
        cart.add(new_item(), 1).unwrap();
        save_cart(&session, &cart).await.unwrap();
        assert!(!apply_completed_order(&session, &order).await.unwrap());
        assert!(!load_cart(&session).await.unwrap().is_empty());
    }
}
