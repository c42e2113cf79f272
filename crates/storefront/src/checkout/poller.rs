//! Background payment status poller.
//!
//! One task per confirmed attempt. The task sleeps for the interval chosen by
//! the flow, asks the provider for the intent status and feeds the answer back
//! into the flow. It exits when the flow reaches a terminal state, when the
//! flow is changed underneath it (abandon, new attempt) or when its
//! [`PollHandle`] is stopped.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use seto_core::MerchantPaymentId;
use seto_core::checkout::{FailureReason, PaymentFlow, PollDecision};
use seto_core::order::{self, Order};
use tokio::sync::watch;
use tracing::Instrument;

use super::{Attempt, CheckoutInner};
use crate::db::RepositoryError;
use crate::error::add_breadcrumb;

/// Stops a running poller.
pub(super) struct PollHandle {
    cancel: watch::Sender<bool>,
}

impl PollHandle {
    pub(super) fn stop(&self) {
        let _ = self.cancel.send(true);
    }
}

/// Start polling `merchant_payment_id` for `attempt`.
pub(super) fn spawn(
    inner: Arc<CheckoutInner>,
    attempt: Arc<Attempt>,
    merchant_payment_id: MerchantPaymentId,
) -> PollHandle {
    let (cancel_tx, cancel_rx) = watch::channel(false);
    let span = tracing::info_span!(
        "payment_poller",
        customer_id = %attempt.customer_id,
        merchant_payment_id = %merchant_payment_id,
    );

    tokio::spawn(run(inner, attempt, merchant_payment_id, cancel_rx).instrument(span));

    PollHandle { cancel: cancel_tx }
}

/// Sleep for `delay`; returns `false` if the poller was stopped meanwhile.
async fn wait(delay: Duration, cancel: &mut watch::Receiver<bool>) -> bool {
    if *cancel.borrow() {
        return false;
    }
    tokio::select! {
        () = tokio::time::sleep(delay) => !*cancel.borrow(),
        changed = cancel.changed() => changed.is_ok() && !*cancel.borrow(),
    }
}

async fn run(
    inner: Arc<CheckoutInner>,
    attempt: Arc<Attempt>,
    merchant_payment_id: MerchantPaymentId,
    mut cancel: watch::Receiver<bool>,
) {
    let policy = inner.policy;
    let mut delay = policy.interval;
    tracing::debug!("Payment poller started");

    loop {
        if !wait(delay, &mut cancel).await {
            tracing::debug!("Payment poller stopped");
            return;
        }

        let polled = inner.gateway.payment_details(&merchant_payment_id).await;

        let decision = {
            let mut state = attempt.state.lock().await;
            if *cancel.borrow() {
                return;
            }
            let now = Utc::now();
            let decision = match polled {
                Ok(details) => {
                    tracing::debug!(status = %details.status, "Payment status polled");
                    state.flow.observe(details.status, &policy, now)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Payment status poll failed");
                    state.flow.poll_error(&policy, now)
                }
            };
            match decision {
                Ok(decision) => decision,
                Err(e) => {
                    tracing::debug!(error = %e, "Attempt moved on, poller exiting");
                    return;
                }
            }
        };

        match decision {
            PollDecision::Continue(next) => delay = next,
            PollDecision::Finalize => {
                add_breadcrumb(
                    "checkout",
                    "Payment completed",
                    Some(&[("merchant_payment_id", merchant_payment_id.as_str())]),
                );
                finalize(&inner, &attempt, &mut cancel).await;
                return;
            }
            PollDecision::Stop(reason) => {
                tracing::info!(reason = ?reason, "Payment attempt failed");
                add_breadcrumb(
                    "checkout",
                    "Payment failed",
                    Some(&[("merchant_payment_id", merchant_payment_id.as_str())]),
                );
                if reason == FailureReason::Expired {
                    inner.cancel_at_provider(&merchant_payment_id).await;
                }
                return;
            }
        }
    }
}

/// Persist the order of a completed payment and complete the flow.
///
/// A failed insert is retried on the error interval until it succeeds or the
/// poller is stopped.
async fn finalize(
    inner: &CheckoutInner,
    attempt: &Attempt,
    cancel: &mut watch::Receiver<bool>,
) {
    let order = {
        let state = attempt.state.lock().await;
        let (PaymentFlow::Finalizing(intent), Some(basket)) = (&state.flow, &state.basket) else {
            return;
        };
        match order::finalize(
            &basket.items,
            &basket.shipping,
            intent,
            attempt.customer_id,
            Utc::now(),
        ) {
            Ok(order) => order,
            Err(e) => {
                tracing::error!(error = %e, "Cannot build order for completed payment");
                return;
            }
        }
    };

    let stored = loop {
        match store(inner, &order).await {
            Ok(stored) => break stored,
            Err(e) => {
                tracing::warn!(error = %e, order_id = %order.order_id, "Failed to store order, retrying");
                if !wait(inner.policy.error_interval, cancel).await {
                    tracing::error!(order_id = %order.order_id, "Poller stopped before order was stored");
                    return;
                }
            }
        }
    };

    let mut state = attempt.state.lock().await;
    if let Err(e) = state.flow.complete(stored.order_id.clone()) {
        tracing::warn!(error = %e, "Could not complete checkout flow");
        return;
    }
    tracing::info!(order_id = %stored.order_id, total = %stored.total_amount, "Order placed");
    state.order = Some(stored);
}

/// Insert `order`, or load the copy stored by an earlier finalize.
async fn store(inner: &CheckoutInner, order: &Order) -> Result<Order, RepositoryError> {
    if inner.orders.insert(order).await? {
        return Ok(order.clone());
    }
    let existing = match &order.merchant_payment_id {
        Some(id) => inner.orders.get_by_merchant_payment_id(id).await?,
        None => None,
    };
    Ok(existing.unwrap_or_else(|| order.clone()))
}
