//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.
//! Every error body is JSON: `{"error": message}`.

use std::sync::Arc;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use seto_core::cart::CartError;
use seto_core::checkout::TransitionError;
use seto_core::order::FinalizeError;
use seto_core::shipping::ShippingValidation;
use thiserror::Error;

use crate::checkout::CheckoutError;
use crate::db::RepositoryError;
use crate::paypay::PaymentError;

/// Message returned when the provider answers without payment data.
const MSG_MISSING_DATA: &str = "決済データが取得できませんでした";

/// Message returned with shipping validation failures.
const VALIDATION_MESSAGE: &str = "入力内容に誤りがあります";

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Payment provider call failed during checkout.
    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),

    /// Payment provider call failed on a raw payment endpoint.
    #[error("{message}: {source}")]
    PaymentRequest {
        message: &'static str,
        #[source]
        source: Arc<PaymentError>,
    },

    /// Session store operation failed.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Cart operation rejected.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// Checkout state does not allow the operation.
    #[error("Checkout conflict: {0}")]
    Checkout(#[from] TransitionError),

    /// Shipping form failed validation.
    #[error("Validation failed")]
    Validation(ShippingValidation),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Visitor has no customer session.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Conflicting request.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<CheckoutError> for AppError {
    fn from(err: CheckoutError) -> Self {
        match err {
            CheckoutError::EmptyCart => Self::BadRequest("カートが空です".to_string()),
            CheckoutError::Transition(e) => Self::Checkout(e),
            CheckoutError::Payment(e) => Self::Payment(e),
        }
    }
}

impl From<FinalizeError> for AppError {
    fn from(err: FinalizeError) -> Self {
        match err {
            FinalizeError::EmptyItems => Self::BadRequest("注文アイテムが必要です".to_string()),
            other => Self::BadRequest(other.to_string()),
        }
    }
}

impl AppError {
    /// Provider failure on a raw payment endpoint, answered with `message`
    /// unless the provider's own message can be shown.
    pub fn payment_request(message: &'static str) -> impl FnOnce(PaymentError) -> Self {
        move |source| Self::PaymentRequest {
            message,
            source: Arc::new(source),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::PaymentRequest { source, .. }
                if matches!(
                    source.as_ref(),
                    PaymentError::Api { .. } | PaymentError::InvalidId(_)
                ) =>
            {
                StatusCode::BAD_REQUEST
            }
            Self::Database(_)
            | Self::Session(_)
            | Self::Internal(_)
            | Self::PaymentRequest { .. }
            | Self::Cart(CartError::UnsupportedVersion(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Payment(_) => StatusCode::BAD_GATEWAY,
            Self::Cart(CartError::ItemNotFound(_)) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Cart(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Checkout(_) | Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    /// Message shown to the client; internal details are never exposed.
    fn public_message(&self) -> String {
        match self {
            Self::Database(_)
            | Self::Session(_)
            | Self::Internal(_)
            | Self::Cart(CartError::UnsupportedVersion(_)) => "Internal server error".to_string(),
            Self::Payment(err) => err.public_message(),
            Self::PaymentRequest { message, source } => match source.as_ref() {
                PaymentError::Api { .. } | PaymentError::InvalidId(_) => source.public_message(),
                PaymentError::MissingData => MSG_MISSING_DATA.to_string(),
                _ => (*message).to_string(),
            },
            Self::Cart(err) => err.to_string(),
            Self::Checkout(err) => err.to_string(),
            Self::Validation(_) => VALIDATION_MESSAGE.to_string(),
            Self::NotFound(msg)
            | Self::Unauthorized(msg)
            | Self::BadRequest(msg)
            | Self::Conflict(msg) => msg.clone(),
            Self::RateLimited => "Too many requests".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let message = self.public_message();
        let body = match self {
            Self::Validation(validation) => json!({
                "error": message,
                "valid": validation.valid,
                "fieldErrors": validation.field_errors,
            }),
            _ => json!({ "error": message }),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a customer ID.
pub fn set_sentry_user(customer_id: &impl ToString) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(customer_id.to_string()),
            ..Default::default()
        }));
    });
}

/// Add a breadcrumb for visitor actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added item", Some(&[("product_id", "1")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::to_bytes;
    use seto_core::shipping::ShippingForm;

    use super::*;

    async fn body_json(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("product-123".to_string());
        assert_eq!(err.to_string(), "Not found: product-123");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        fn get_status(err: AppError) -> StatusCode {
            err.into_response().status()
        }

        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Unauthorized("test".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::Checkout(TransitionError::AlreadyCompleted)),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AppError::Payment(PaymentError::MissingData)),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            get_status(AppError::Cart(CartError::InvalidQuantity)),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::RateLimited),
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[tokio::test]
    async fn test_internal_details_are_hidden() {
        let (status, body) = body_json(AppError::Database(RepositoryError::DataCorruption(
            "bad json in row 7".to_string(),
        )))
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal server error");
    }

    #[tokio::test]
    async fn test_payment_request_uses_endpoint_message() {
        let (status, body) = body_json(AppError::payment_request(
            "決済の作成中にエラーが発生しました",
        )(PaymentError::Status {
            status: 500,
            body: "oops".to_string(),
        }))
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "決済の作成中にエラーが発生しました");

        let (status, body) = body_json(AppError::payment_request(
            "決済状態の取得中にエラーが発生しました",
        )(PaymentError::Api {
            code: "DYNAMIC_QR_PAYMENT_NOT_FOUND".to_string(),
            message: "Dynamic QR payment not found".to_string(),
        }))
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Dynamic QR payment not found");
    }

    #[tokio::test]
    async fn test_validation_body_lists_field_errors() {
        let validation = ShippingForm::default().validate();
        let (status, body) = body_json(AppError::Validation(validation)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["valid"], false);
        assert_eq!(body["fieldErrors"]["fullName"], "氏名を入力してください");
    }
}
