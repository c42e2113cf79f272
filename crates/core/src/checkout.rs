//! Checkout payment flow.
//!
//! [`PaymentFlow`] is the state machine of one checkout attempt:
//!
//! ```text
//! Idle ──confirm──▶ Creating ──intent_created──▶ AwaitingPayment ──COMPLETED──▶ Finalizing ──complete──▶ Completed
//!                      │                              │
//!                      └──creation_failed──┐          ├──CANCELED / FAILED / budget exhausted
//!                                          ▼          ▼
//!                                        Failed ◀─────┘   (confirm again to retry)
//! ```
//!
//! The machine does no I/O. The storefront runtime calls the provider, feeds
//! the observed statuses into [`PaymentFlow::observe`] and acts on the returned
//! [`PollDecision`].

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::types::{MerchantPaymentId, OrderId, PaymentStatus, Yen};

/// Message shown when the visitor cancels in the wallet app.
pub const MSG_CANCELED: &str = "決済がキャンセルされました";
/// Message shown when the provider reports a failed payment.
pub const MSG_FAILED: &str = "決済が失敗しました";
/// Message shown when the poll budget runs out.
pub const MSG_EXPIRED: &str = "決済の有効期限が切れました";
/// Message shown after the visitor abandons the payment step.
pub const MSG_ABANDONED: &str = "決済が中断されました";

/// Human-readable payment description sent to the provider.
#[must_use]
pub fn order_description(amount: Yen) -> String {
    format!("SETO Blend Coffee: {amount}")
}

/// The application's copy of a provider payment intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntent {
    pub order_id: OrderId,
    pub merchant_payment_id: MerchantPaymentId,
    pub amount: Yen,
    pub payment_url: String,
    pub deep_link: String,
    pub expiry_date: Option<DateTime<Utc>>,
    pub status: PaymentStatus,
}

/// An intent that is waiting for the visitor to pay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingPayment {
    pub intent: PaymentIntent,
    /// Status polls performed so far, successful or not.
    pub polls: u32,
    pub started_at: DateTime<Utc>,
}

/// Why an attempt ended in [`PaymentFlow::Failed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    CreateFailed,
    Canceled,
    Failed,
    Expired,
    Abandoned,
}

/// State of one checkout attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PaymentFlow {
    #[default]
    Idle,
    Creating,
    AwaitingPayment(PendingPayment),
    /// The provider reported COMPLETED; the order is being persisted.
    Finalizing(PaymentIntent),
    #[serde(rename_all = "camelCase")]
    Completed {
        order_id: OrderId,
        merchant_payment_id: MerchantPaymentId,
    },
    Failed {
        reason: FailureReason,
        message: String,
    },
}

/// Illegal transition requests.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("a payment is already in progress")]
    InProgress,
    #[error("this checkout is already completed")]
    AlreadyCompleted,
    #[error("cannot {action} while {state}")]
    Invalid {
        action: &'static str,
        state: &'static str,
    },
}

/// What the poller should do after an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollDecision {
    /// Poll again after the given delay.
    Continue(Duration),
    /// Persist the order, then call [`PaymentFlow::complete`].
    Finalize,
    /// The attempt failed; stop polling.
    Stop(FailureReason),
}

/// Poll cadence and budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay after a successful status response.
    pub interval: Duration,
    /// Delay after a transport or HTTP error.
    pub error_interval: Duration,
    pub max_attempts: u32,
    /// Overall time budget measured from intent creation.
    pub deadline: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            error_interval: Duration::from_secs(10),
            max_attempts: 180,
            deadline: Duration::from_secs(900),
        }
    }
}

impl PollPolicy {
    /// Whether an attempt with `polls` polls started at `started_at` is out of budget.
    #[must_use]
    pub fn exhausted(&self, polls: u32, started_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        let elapsed = (now - started_at).to_std().unwrap_or_default();
        polls >= self.max_attempts || elapsed >= self.deadline
    }
}

impl PaymentFlow {
    /// Short state name.
    #[must_use]
    pub const fn state_name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Creating => "creating",
            Self::AwaitingPayment(_) => "awaiting_payment",
            Self::Finalizing(_) => "finalizing",
            Self::Completed { .. } => "completed",
            Self::Failed { .. } => "failed",
        }
    }

    /// Whether an intent is being created, paid or finalized.
    #[must_use]
    pub const fn is_in_flight(&self) -> bool {
        matches!(
            self,
            Self::Creating | Self::AwaitingPayment(_) | Self::Finalizing(_)
        )
    }

    /// The pending payment, if awaiting one.
    #[must_use]
    pub const fn pending(&self) -> Option<&PendingPayment> {
        match self {
            Self::AwaitingPayment(pending) => Some(pending),
            _ => None,
        }
    }

    /// Payment page URL; only exposed while awaiting payment.
    #[must_use]
    pub fn payment_url(&self) -> Option<&str> {
        self.pending().map(|p| p.intent.payment_url.as_str())
    }

    /// Merchant payment id of the live or finished intent.
    #[must_use]
    pub const fn merchant_payment_id(&self) -> Option<&MerchantPaymentId> {
        match self {
            Self::AwaitingPayment(pending) => Some(&pending.intent.merchant_payment_id),
            Self::Finalizing(intent) => Some(&intent.merchant_payment_id),
            Self::Completed {
                merchant_payment_id,
                ..
            } => Some(merchant_payment_id),
            _ => None,
        }
    }

    fn invalid(&self, action: &'static str) -> TransitionError {
        TransitionError::Invalid {
            action,
            state: self.state_name(),
        }
    }

    /// Start a new attempt (or retry after a failure).
    ///
    /// # Errors
    ///
    /// Returns `TransitionError::InProgress` while an intent is in flight, so a
    /// double submit never creates a second intent, and
    /// `TransitionError::AlreadyCompleted` once the order exists.
    pub fn confirm(&mut self) -> Result<(), TransitionError> {
        match self {
            Self::Idle | Self::Failed { .. } => {
                *self = Self::Creating;
                Ok(())
            }
            Self::Creating | Self::AwaitingPayment(_) | Self::Finalizing(_) => {
                Err(TransitionError::InProgress)
            }
            Self::Completed { .. } => Err(TransitionError::AlreadyCompleted),
        }
    }

    /// The provider accepted the intent.
    ///
    /// # Errors
    ///
    /// Returns `TransitionError::Invalid` unless the flow is `Creating`.
    pub fn intent_created(
        &mut self,
        intent: PaymentIntent,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        if !matches!(self, Self::Creating) {
            return Err(self.invalid("record a created intent"));
        }
        *self = Self::AwaitingPayment(PendingPayment {
            intent,
            polls: 0,
            started_at: now,
        });
        Ok(())
    }

    /// The provider rejected the intent or could not be reached.
    ///
    /// # Errors
    ///
    /// Returns `TransitionError::Invalid` unless the flow is `Creating`.
    pub fn creation_failed(&mut self, message: impl Into<String>) -> Result<(), TransitionError> {
        if !matches!(self, Self::Creating) {
            return Err(self.invalid("record a creation failure"));
        }
        *self = Self::Failed {
            reason: FailureReason::CreateFailed,
            message: message.into(),
        };
        Ok(())
    }

    /// Feed a status returned by the provider.
    ///
    /// # Errors
    ///
    /// Returns `TransitionError::Invalid` unless the flow is `AwaitingPayment`.
    pub fn observe(
        &mut self,
        status: PaymentStatus,
        policy: &PollPolicy,
        now: DateTime<Utc>,
    ) -> Result<PollDecision, TransitionError> {
        let Self::AwaitingPayment(pending) = &mut *self else {
            return Err(self.invalid("observe a status"));
        };
        pending.polls = pending.polls.saturating_add(1);

        match status {
            PaymentStatus::Completed => {
                let mut intent = pending.intent.clone();
                intent.status = PaymentStatus::Completed;
                *self = Self::Finalizing(intent);
                Ok(PollDecision::Finalize)
            }
            PaymentStatus::Canceled => Ok(self.fail(FailureReason::Canceled, MSG_CANCELED)),
            PaymentStatus::Failed => Ok(self.fail(FailureReason::Failed, MSG_FAILED)),
            other => {
                pending.intent.status = other;
                if policy.exhausted(pending.polls, pending.started_at, now) {
                    return Ok(self.fail(FailureReason::Expired, MSG_EXPIRED));
                }
                Ok(PollDecision::Continue(policy.interval))
            }
        }
    }

    /// A status poll failed at the transport or HTTP level.
    ///
    /// # Errors
    ///
    /// Returns `TransitionError::Invalid` unless the flow is `AwaitingPayment`.
    pub fn poll_error(
        &mut self,
        policy: &PollPolicy,
        now: DateTime<Utc>,
    ) -> Result<PollDecision, TransitionError> {
        let Self::AwaitingPayment(pending) = &mut *self else {
            return Err(self.invalid("record a poll error"));
        };
        pending.polls = pending.polls.saturating_add(1);
        if policy.exhausted(pending.polls, pending.started_at, now) {
            return Ok(self.fail(FailureReason::Expired, MSG_EXPIRED));
        }
        Ok(PollDecision::Continue(policy.error_interval))
    }

    /// The order was persisted.
    ///
    /// Calling this again with the same order id is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `TransitionError::Invalid` unless the flow is `Finalizing`.
    pub fn complete(&mut self, order_id: OrderId) -> Result<(), TransitionError> {
        match self {
            Self::Finalizing(intent) => {
                let merchant_payment_id = intent.merchant_payment_id.clone();
                *self = Self::Completed {
                    order_id,
                    merchant_payment_id,
                };
                Ok(())
            }
            Self::Completed {
                order_id: existing, ..
            } if *existing == order_id => Ok(()),
            _ => Err(self.invalid("complete")),
        }
    }

    /// The visitor left the payment step.
    ///
    /// Returns the merchant payment id of the intent that should be cancelled
    /// at the provider, if any.
    ///
    /// # Errors
    ///
    /// Returns `TransitionError::AlreadyCompleted` once payment was taken
    /// (`Finalizing` or `Completed`).
    pub fn abandon(&mut self) -> Result<Option<MerchantPaymentId>, TransitionError> {
        if matches!(self, Self::Finalizing(_) | Self::Completed { .. }) {
            return Err(TransitionError::AlreadyCompleted);
        }
        let live = self.pending().map(|p| p.intent.merchant_payment_id.clone());
        if !matches!(self, Self::Failed { .. }) {
            self.fail(FailureReason::Abandoned, MSG_ABANDONED);
        }
        Ok(live)
    }

    fn fail(&mut self, reason: FailureReason, message: &str) -> PollDecision {
        *self = Self::Failed {
            reason,
            message: message.to_owned(),
        };
        PollDecision::Stop(reason)
    }
}
