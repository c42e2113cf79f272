//! PayPay payment operations.
//!
//! # Usage
//!
//! ```bash
//! seto-cli payment status <merchantPaymentId>
//! seto-cli payment cancel <merchantPaymentId>
//! seto-cli payment refund <paymentId> --amount 1200 --reason "破損"
//! ```
//!
//! # Environment Variables
//!
//! - `PAYPAY_API_KEY`, `PAYPAY_API_SECRET`, `PAYPAY_MERCHANT_ID` - credentials
//! - `PAYPAY_ENVIRONMENT` - `STAGING` (default) or `PROD`

use chrono::Utc;
use seto_core::{MerchantPaymentId, PaymentId, Yen};
use seto_storefront::config::{ConfigError, PayPayConfig};
use seto_storefront::paypay::{
    PayPayClient, PaymentError, PaymentGateway, RefundRequest, validate_payment_id,
};
use thiserror::Error;
use tracing::info;

/// Errors that can occur during payment operations.
#[derive(Debug, Error)]
pub enum PaymentCommandError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),

    #[error("Refund amount must be greater than zero")]
    ZeroAmount,
}

fn client() -> Result<PayPayClient, PaymentCommandError> {
    dotenvy::dotenv().ok();
    let config = PayPayConfig::from_env()?;
    info!(environment = ?config.environment, "Using PayPay");
    Ok(PayPayClient::new(&config))
}

fn merchant_payment_id(id: &str) -> Result<MerchantPaymentId, PaymentError> {
    validate_payment_id(id)?;
    Ok(MerchantPaymentId::new(id))
}

/// Show the provider's view of a payment.
///
/// # Errors
///
/// Returns `PaymentCommandError` if credentials are missing or the provider call fails.
pub async fn status(id: &str) -> Result<(), PaymentCommandError> {
    let id = merchant_payment_id(id)?;
    let details = client()?.payment_details(&id).await?;

    info!("Payment {}", details.merchant_payment_id);
    info!("  Status: {}", details.status.as_str());
    info!("  Amount: {}", details.amount.amount);
    if let Some(payment_id) = &details.payment_id {
        info!("  PayPay payment id: {payment_id}");
    }
    if let Some(description) = &details.order_description {
        info!("  Description: {description}");
    }
    if let Some(accepted_at) = details.accepted_at {
        info!("  Accepted at (epoch): {accepted_at}");
    }
    Ok(())
}

/// Cancel a payment.
///
/// # Errors
///
/// Returns `PaymentCommandError` if credentials are missing or the provider call fails.
pub async fn cancel(id: &str) -> Result<(), PaymentCommandError> {
    let id = merchant_payment_id(id)?;
    client()?.cancel_payment(&id).await?;
    info!(merchant_payment_id = %id, "Payment canceled");
    Ok(())
}

/// Refund `amount` yen of a completed payment.
///
/// # Errors
///
/// Returns `PaymentCommandError` if the amount is zero, credentials are
/// missing, or the provider rejects the refund.
pub async fn refund(payment_id: &str, amount: u64, reason: &str) -> Result<(), PaymentCommandError> {
    let amount = Yen::new(amount);
    if amount.is_zero() {
        return Err(PaymentCommandError::ZeroAmount);
    }
    validate_payment_id(payment_id)?;

    let request = RefundRequest::new(PaymentId::new(payment_id), amount, reason, Utc::now());
    let refund = client()?.refund_payment(&request).await?;

    info!(
        merchant_refund_id = %refund.merchant_refund_id,
        status = %refund.status,
        amount = %refund.amount.amount,
        "Refund requested"
    );
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_merchant_payment_id_rejects_path_characters() {
        assert!(merchant_payment_id("../v2/codes").is_err());
        assert!(merchant_payment_id("order_3f1c9a2e-5b7d-4e8f-9a6b-2c4d8e0f1a3b").is_ok());
    }

    #[tokio::test]
    async fn test_refund_rejects_zero_amount() {
        let result = refund("04123456789012345678", 0, "test").await;
        assert!(matches!(result, Err(PaymentCommandError::ZeroAmount)));
    }
}
