//! Checkout attempt registry and payment orchestration.
//!
//! # Architecture
//!
//! - One [`Attempt`] per customer, kept in a `moka` cache keyed by
//!   [`CustomerId`]; idle attempts are evicted after an hour
//! - Each attempt holds its [`PaymentFlow`] behind a mutex (single writer)
//!   together with the cart/shipping snapshot taken at confirm time
//! - A confirmed attempt owns a background poller (see [`poller`]) that drives
//!   the flow until a terminal status is observed or the attempt is stopped
//! - Every confirm bumps the attempt's generation; a create-intent answer is
//!   only applied to the generation that asked for it
//! - The visitor's session reads a completed order through
//!   [`Checkout::completed_order`] and releases it with
//!   [`Checkout::acknowledge_completed`] once the session is saved
//!
//! Intent creation is never retried automatically; a failed attempt can be
//! confirmed again.

mod poller;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use moka::future::Cache;
use serde::Serialize;
use seto_core::cart::CartItem;
use seto_core::checkout::{PaymentFlow, PaymentIntent, PollPolicy, TransitionError, order_description};
use seto_core::order::Order;
use seto_core::shipping::ShippingInfo;
use seto_core::{CustomerId, MerchantPaymentId, OrderId, PaymentStatus, Yen};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::instrument;

use crate::db::OrderStore;
use crate::error::add_breadcrumb;
use crate::paypay::{CreateQrCodeRequest, PaymentError, PaymentGateway};

use poller::PollHandle;

/// Idle attempts are dropped after this long.
const ATTEMPT_IDLE_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Errors returned by checkout operations.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("cart is empty")]
    EmptyCart,

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error(transparent)]
    Payment(#[from] PaymentError),
}

/// What the visitor is paying for, captured at confirm time.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub items: Vec<CartItem>,
    pub shipping: ShippingInfo,
    pub user_agent: String,
}

#[derive(Debug, Clone)]
struct Basket {
    items: Vec<CartItem>,
    shipping: ShippingInfo,
    amount: Yen,
}

/// Client-facing view of an attempt.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutView {
    #[serde(flatten)]
    pub flow: PaymentFlow,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Yen>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<Order>,
}

impl CheckoutView {
    /// View of a customer without an attempt.
    #[must_use]
    pub fn idle() -> Self {
        Self {
            flow: PaymentFlow::Idle,
            payment_url: None,
            amount: None,
            order: None,
        }
    }

    /// View of an attempt whose order was just handed to the session.
    #[must_use]
    pub fn completed(order: Order) -> Self {
        let flow = PaymentFlow::Completed {
            order_id: order.order_id.clone(),
            merchant_payment_id: order
                .merchant_payment_id
                .clone()
                .unwrap_or_else(|| MerchantPaymentId::for_order(&order.order_id)),
        };
        Self {
            flow,
            payment_url: None,
            amount: Some(order.total_amount),
            order: Some(order),
        }
    }
}

/// One checkout attempt of one customer.
struct Attempt {
    customer_id: CustomerId,
    state: Mutex<AttemptState>,
}

#[derive(Default)]
struct AttemptState {
    flow: PaymentFlow,
    /// Bumped by every confirm.
    generation: u64,
    basket: Option<Basket>,
    /// Persisted order, until the session acknowledges it.
    order: Option<Order>,
    poller: Option<PollHandle>,
}

impl AttemptState {
    fn view(&self) -> CheckoutView {
        CheckoutView {
            flow: self.flow.clone(),
            payment_url: self.flow.payment_url().map(str::to_owned),
            amount: self.basket.as_ref().map(|b| b.amount),
            order: self.order.clone(),
        }
    }

    fn stop_poller(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.stop();
        }
    }
}

impl Attempt {
    fn new(customer_id: CustomerId) -> Self {
        Self {
            customer_id,
            state: Mutex::new(AttemptState::default()),
        }
    }
}

/// Checkout orchestrator shared by all handlers.
#[derive(Clone)]
pub struct Checkout {
    inner: Arc<CheckoutInner>,
}

struct CheckoutInner {
    gateway: Arc<dyn PaymentGateway>,
    orders: Arc<dyn OrderStore>,
    policy: PollPolicy,
    redirect_url: String,
    attempts: Cache<CustomerId, Arc<Attempt>>,
}

impl Checkout {
    /// Create the orchestrator.
    ///
    /// # Arguments
    ///
    /// * `gateway` - Payment provider
    /// * `orders` - Where finalized orders are stored
    /// * `policy` - Poll cadence and budget
    /// * `redirect_url` - Where the provider sends the visitor after paying
    #[must_use]
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        orders: Arc<dyn OrderStore>,
        policy: PollPolicy,
        redirect_url: impl Into<String>,
    ) -> Self {
        let attempts = Cache::builder()
            .max_capacity(10_000)
            .time_to_idle(ATTEMPT_IDLE_TIMEOUT)
            .build();

        Self {
            inner: Arc::new(CheckoutInner {
                gateway,
                orders,
                policy,
                redirect_url: redirect_url.into(),
                attempts,
            }),
        }
    }

    /// Confirm the checkout: create a payment intent and start polling it.
    ///
    /// While an intent is already being created, paid or finalized the
    /// current attempt is returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::EmptyCart` without items and
    /// `CheckoutError::Payment` if the provider rejects the intent; the
    /// attempt is then `Failed` and may be confirmed again. An intent created
    /// after the attempt moved on is cancelled and the current view returned.
    #[instrument(skip(self, request), fields(customer_id = %customer_id))]
    pub async fn confirm(
        &self,
        customer_id: CustomerId,
        request: CheckoutRequest,
    ) -> Result<CheckoutView, CheckoutError> {
        if request.items.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        let amount: Yen = request.items.iter().map(CartItem::line_total).sum();

        let attempt = self
            .inner
            .attempts
            .get_with(customer_id, async move { Arc::new(Attempt::new(customer_id)) })
            .await;

        let generation = {
            let mut state = attempt.state.lock().await;
            match state.flow.confirm() {
                Ok(()) => {}
                Err(TransitionError::InProgress) => return Ok(state.view()),
                Err(e) => return Err(e.into()),
            }
            state.stop_poller();
            state.generation += 1;
            state.basket = Some(Basket {
                items: request.items,
                shipping: request.shipping,
                amount,
            });
            state.generation
        };

        let order_id = OrderId::generate();
        let merchant_payment_id = MerchantPaymentId::for_order(&order_id);
        add_breadcrumb(
            "checkout",
            "Creating payment intent",
            Some(&[("merchant_payment_id", merchant_payment_id.as_str())]),
        );

        let qr_request = CreateQrCodeRequest::order_qr(
            merchant_payment_id.clone(),
            amount,
            order_description(amount),
            self.inner.redirect_url.clone(),
            request.user_agent,
        );
        let created = self.inner.gateway.create_qr_code(&qr_request).await;

        let mut state = attempt.state.lock().await;
        if state.generation != generation || !matches!(state.flow, PaymentFlow::Creating) {
            // Abandoned or confirmed again while the intent was being created.
            let view = state.view();
            drop(state);
            match created {
                Ok(_) => {
                    tracing::info!(
                        merchant_payment_id = %merchant_payment_id,
                        "Attempt moved on during intent creation, cancelling intent"
                    );
                    self.inner.cancel_at_provider(&merchant_payment_id).await;
                }
                Err(e) => tracing::debug!(error = %e, "Stale intent creation failed"),
            }
            return Ok(view);
        }

        match created {
            Ok(qr) => {
                let intent = PaymentIntent {
                    expiry_date: qr.expires_at(),
                    order_id,
                    merchant_payment_id: merchant_payment_id.clone(),
                    amount,
                    payment_url: qr.url,
                    deep_link: qr.deep_link,
                    status: PaymentStatus::Created,
                };
                state.flow.intent_created(intent, Utc::now())?;
                state.poller = Some(poller::spawn(
                    Arc::clone(&self.inner),
                    Arc::clone(&attempt),
                    merchant_payment_id.clone(),
                ));
                tracing::info!(
                    merchant_payment_id = %merchant_payment_id,
                    amount = %amount,
                    "Payment intent created"
                );
                Ok(state.view())
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to create payment intent");
                state.flow.creation_failed(e.public_message())?;
                state.basket = None;
                Err(e.into())
            }
        }
    }

    /// Current view of the customer's attempt, `None` without one.
    pub async fn view(&self, customer_id: CustomerId) -> Option<CheckoutView> {
        let attempt = self.inner.attempts.get(&customer_id).await?;
        let state = attempt.state.lock().await;
        Some(state.view())
    }

    /// Abandon the customer's attempt.
    ///
    /// Stops the poller and asks the provider to cancel the live intent. The
    /// attempt ends `Failed` and may be confirmed again.
    ///
    /// # Errors
    ///
    /// Returns `TransitionError::AlreadyCompleted` once payment was taken.
    #[instrument(skip(self), fields(customer_id = %customer_id))]
    pub async fn abandon(
        &self,
        customer_id: CustomerId,
    ) -> Result<Option<CheckoutView>, CheckoutError> {
        let Some(attempt) = self.inner.attempts.get(&customer_id).await else {
            return Ok(None);
        };

        let mut state = attempt.state.lock().await;
        let live = state.flow.abandon()?;
        state.stop_poller();
        let view = state.view();
        drop(state);

        if let Some(merchant_payment_id) = live {
            add_breadcrumb(
                "checkout",
                "Payment abandoned",
                Some(&[("merchant_payment_id", merchant_payment_id.as_str())]),
            );
            self.inner.cancel_at_provider(&merchant_payment_id).await;
        }
        Ok(Some(view))
    }

    /// The stored order of a completed attempt.
    ///
    /// The order stays available until [`Self::acknowledge_completed`] is
    /// called for it.
    pub async fn completed_order(&self, customer_id: CustomerId) -> Option<Order> {
        let attempt = self.inner.attempts.get(&customer_id).await?;
        let state = attempt.state.lock().await;
        if !matches!(state.flow, PaymentFlow::Completed { .. }) {
            return None;
        }
        state.order.clone()
    }

    /// The visitor's session has recorded `order_id`.
    ///
    /// Drops the attempt so the next confirm starts fresh. Does nothing if
    /// the attempt holds a different order.
    pub async fn acknowledge_completed(&self, customer_id: CustomerId, order_id: &OrderId) {
        let Some(attempt) = self.inner.attempts.get(&customer_id).await else {
            return;
        };
        let acknowledged = attempt
            .state
            .lock()
            .await
            .order
            .as_ref()
            .is_some_and(|order| order.order_id == *order_id);
        if acknowledged {
            self.inner.attempts.invalidate(&customer_id).await;
        }
    }

    /// Stop every running poller.
    pub async fn shutdown(&self) {
        let attempts: Vec<Arc<Attempt>> = self.inner.attempts.iter().map(|(_, a)| a).collect();
        for attempt in attempts {
            attempt.state.lock().await.stop_poller();
        }
        tracing::info!("Payment pollers stopped");
    }
}

impl CheckoutInner {
    /// Best-effort cancel; failures are logged and otherwise ignored.
    async fn cancel_at_provider(&self, merchant_payment_id: &MerchantPaymentId) {
        match self.gateway.cancel_payment(merchant_payment_id).await {
            Ok(()) => tracing::info!(merchant_payment_id = %merchant_payment_id, "Payment cancelled"),
            Err(e) => tracing::warn!(
                error = %e,
                merchant_payment_id = %merchant_payment_id,
                "Failed to cancel payment"
            ),
        }
    }
}
