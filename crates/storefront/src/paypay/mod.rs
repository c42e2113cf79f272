//! PayPay Open Payment API client.
//!
//! # Architecture
//!
//! - Plain REST over `reqwest`, every request signed with `OPA-Auth` (see [`auth`])
//! - [`PaymentGateway`] is the seam the checkout runtime and the payment routes
//!   depend on; [`PayPayClient`] is the production implementation
//! - No retries here: the checkout poller owns the retry cadence
//!
//! # Endpoints
//!
//! - `POST /v2/codes` - create a dynamic order QR code (payment intent)
//! - `GET /v2/codes/payments/{merchantPaymentId}` - payment details
//! - `DELETE /v2/payments/{merchantPaymentId}` - cancel a payment
//! - `POST /v2/refunds` - refund a completed payment

pub mod auth;
mod client;
pub mod types;

use async_trait::async_trait;
use seto_core::MerchantPaymentId;
use thiserror::Error;

pub use client::PayPayClient;
pub use types::*;

/// Maximum length of a merchant payment id accepted by PayPay.
pub const MAX_MERCHANT_PAYMENT_ID_LENGTH: usize = 64;

/// Errors that can occur when calling the payment provider.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// Transport failure (connect, timeout, TLS, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success HTTP status without a readable result envelope.
    #[error("PayPay returned HTTP {status}")]
    Status { status: u16, body: String },

    /// The provider answered with a non-`SUCCESS` result code.
    #[error("PayPay error {code}: {message}")]
    Api { code: String, message: String },

    /// JSON (de)serialization failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// `SUCCESS` result without a `data` object.
    #[error("PayPay response has no data")]
    MissingData,

    /// Identifier that cannot be sent to the provider.
    #[error("Invalid payment id: {0}")]
    InvalidId(String),
}

impl PaymentError {
    /// Message that may be shown to the visitor.
    ///
    /// Provider result messages are passed through; transport details are not.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::Api { message, .. } if !message.is_empty() => message.clone(),
            Self::InvalidId(_) => "決済IDが不正です".to_string(),
            _ => "決済サービスとの通信に失敗しました".to_string(),
        }
    }
}

/// Operations the storefront needs from the payment provider.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a payment intent (dynamic QR code).
    async fn create_qr_code(&self, request: &CreateQrCodeRequest) -> Result<QrCode, PaymentError>;

    /// Fetch the current state of a payment.
    async fn payment_details(
        &self,
        merchant_payment_id: &MerchantPaymentId,
    ) -> Result<PaymentDetails, PaymentError>;

    /// Cancel a payment that has not completed.
    async fn cancel_payment(&self, merchant_payment_id: &MerchantPaymentId)
    -> Result<(), PaymentError>;

    /// Refund (part of) a completed payment.
    async fn refund_payment(&self, request: &RefundRequest) -> Result<RefundDetails, PaymentError>;
}

/// Check that an id only uses characters that are safe in a URL path.
///
/// # Errors
///
/// Returns `PaymentError::InvalidId` for empty, overlong or non `[A-Za-z0-9_-]` ids.
pub fn validate_payment_id(id: &str) -> Result<(), PaymentError> {
    let valid = !id.is_empty()
        && id.len() <= MAX_MERCHANT_PAYMENT_ID_LENGTH
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
    if valid {
        Ok(())
    } else {
        Err(PaymentError::InvalidId(id.chars().take(80).collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_payment_id() {
        assert!(validate_payment_id("order_3f2a9c1e-5b7d-4e8f-9a0b-1c2d3e4f5a6b").is_ok());
        assert!(validate_payment_id("").is_err());
        assert!(validate_payment_id("../v2/refunds").is_err());
        assert!(validate_payment_id("order 1").is_err());
        assert!(validate_payment_id(&"a".repeat(65)).is_err());
    }

    #[test]
    fn test_public_message_hides_transport_details() {
        let err = PaymentError::Status {
            status: 500,
            body: "internal stack trace".to_string(),
        };
        assert!(!err.public_message().contains("stack"));

        let err = PaymentError::Api {
            code: "INVALID_PARAMS".to_string(),
            message: "Invalid request params".to_string(),
        };
        assert_eq!(err.public_message(), "Invalid request params");
    }
}
