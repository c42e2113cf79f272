//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                 - Liveness check
//! GET  /health/ready           - Readiness check (database ping)
//!
//! # Products
//! GET  /products               - Product listing
//! GET  /products/{id}          - Product detail
//!
//! # Cart (session)
//! GET  /cart                   - Cart view
//! POST /cart/add               - Add a product variant
//! POST /cart/update            - Set line quantity (≤ 0 removes)
//! POST /cart/remove            - Remove a line
//! POST /cart/clear             - Empty the cart
//!
//! # Checkout (session)
//! GET  /checkout/shipping      - Stored shipping details
//! POST /checkout/shipping      - Validate and store shipping details
//! POST /checkout/payment       - Confirm: create payment intent, start polling
//! GET  /checkout/payment       - Current checkout state
//! DELETE /checkout/payment     - Abandon the attempt
//! GET  /checkout/complete      - Confirmed order
//!
//! # Payment (raw provider access)
//! POST /payment/create         - Create a payment intent (rate limited)
//! GET  /payment/status         - Payment details
//! POST /payment/cancel         - Cancel a payment
//!
//! # Orders (requires customer session)
//! GET  /orders                 - Order list, or one order with ?id=
//! POST /orders                 - Place a pending order
//! ```

pub mod cart;
pub mod checkout;
pub mod health;
pub mod orders;
pub mod payment;
pub mod products;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;
use tower_sessions::{SessionManagerLayer, SessionStore};

use crate::middleware::{
    payment_rate_limiter, request_id_middleware, security_headers_middleware,
    session_lock_middleware,
};
use crate::state::AppState;

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/{id}", get(products::show))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/remove", post(cart::remove))
        .route("/clear", post(cart::clear))
}

/// Create the checkout routes router.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/shipping",
            get(checkout::shipping_show).post(checkout::shipping_submit),
        )
        .route(
            "/payment",
            get(checkout::payment_show)
                .post(checkout::payment_confirm)
                .delete(checkout::payment_abandon),
        )
        .route("/complete", get(checkout::complete))
}

/// Create the raw payment routes router.
pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/create",
            post(payment::create).layer(payment_rate_limiter()),
        )
        .route("/status", get(payment::status))
        .route("/cancel", post(payment::cancel))
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new().route("/", get(orders::index).post(orders::create))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/products", product_routes())
        .nest("/cart", cart_routes())
        .nest("/checkout", checkout_routes())
        .nest("/payment", payment_routes())
        .nest("/orders", order_routes())
}

/// Build the complete application with its middleware stack.
///
/// The caller picks the session store: `PostgreSQL` in production, memory in
/// tests. Requests of one session are serialized around the session layer.
pub fn app<Store>(state: AppState, session_layer: SessionManagerLayer<Store>) -> Router
where
    Store: SessionStore + Clone,
{
    routes()
        .layer(axum_middleware::from_fn(security_headers_middleware))
        .layer(session_layer)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            session_lock_middleware,
        ))
        .layer(axum_middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}
