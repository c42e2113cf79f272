//! Raw payment endpoints.
//!
//! Thin wrappers over the payment provider for clients that drive the payment
//! themselves. The session checkout in [`super::checkout`] does not use them.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State},
    http::{HeaderMap, header::USER_AGENT},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use seto_core::checkout::MSG_CANCELED;
use seto_core::{MerchantPaymentId, OrderId, PaymentId, PaymentStatus, Yen};
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::paypay::{CreateQrCodeRequest, Money, PaymentError, validate_payment_id};
use crate::state::{AppState, IdempotentResponse};

/// Header carrying the client's idempotency key.
pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

const MAX_IDEMPOTENCY_KEY_LENGTH: usize = 255;

const MSG_CREATE_REQUIRED: &str = "金額と注文内容は必須です";
const MSG_ID_REQUIRED: &str = "決済IDは必須です";
const MSG_CREATE_FAILED: &str = "決済の作成中にエラーが発生しました";
const MSG_STATUS_FAILED: &str = "決済状態の取得中にエラーが発生しました";
const MSG_CANCEL_FAILED: &str = "決済のキャンセル中にエラーが発生しました";

/// `POST /payment/create` body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentRequest {
    pub amount: Option<u64>,
    pub order_description: Option<String>,
}

/// Created payment intent.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedPayment {
    pub order_id: OrderId,
    pub payment_url: String,
    pub deep_link: String,
    pub expiry_date: Option<i64>,
    pub merchant_payment_id: MerchantPaymentId,
}

/// `GET /payment/status` query.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusQuery {
    pub merchant_payment_id: Option<String>,
}

/// Payment status data.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatusView {
    pub status: PaymentStatus,
    pub payment_id: Option<PaymentId>,
    pub merchant_payment_id: MerchantPaymentId,
    pub amount: Money,
    pub order_description: Option<String>,
    pub payment_date: Option<i64>,
    pub completed_at: Option<i64>,
}

/// `POST /payment/cancel` body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelPaymentRequest {
    pub merchant_payment_id: Option<String>,
}

/// A required, non-blank merchant payment id.
fn required_payment_id(id: Option<String>) -> Result<MerchantPaymentId> {
    let id = id
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::BadRequest(MSG_ID_REQUIRED.to_string()))?;
    validate_payment_id(&id).map_err(AppError::payment_request(MSG_STATUS_FAILED))?;
    Ok(MerchantPaymentId::new(id))
}

fn idempotency_key(headers: &HeaderMap) -> Result<Option<String>> {
    let Some(value) = headers.get(IDEMPOTENCY_KEY_HEADER) else {
        return Ok(None);
    };
    value
        .to_str()
        .ok()
        .map(str::trim)
        .filter(|k| !k.is_empty() && k.len() <= MAX_IDEMPOTENCY_KEY_LENGTH)
        .map(|k| Some(k.to_owned()))
        .ok_or_else(|| AppError::BadRequest("Invalid Idempotency-Key header".to_string()))
}

/// Ask the provider for a new intent and build the response body.
async fn create_intent(
    state: &AppState,
    amount: Yen,
    description: String,
    user_agent: String,
) -> std::result::Result<IdempotentResponse, PaymentError> {
    let order_id = OrderId::generate();
    let merchant_payment_id = MerchantPaymentId::for_order(&order_id);

    let qr_request = CreateQrCodeRequest::order_qr(
        merchant_payment_id.clone(),
        amount,
        description,
        state.config().payment_redirect_url(),
        user_agent,
    );
    let qr = state.gateway().create_qr_code(&qr_request).await?;

    tracing::info!(merchant_payment_id = %merchant_payment_id, amount = %amount, "Payment created");

    Ok(Arc::new(json!({
        "success": true,
        "data": CreatedPayment {
            order_id,
            payment_url: qr.url,
            deep_link: qr.deep_link,
            expiry_date: qr.expiry_date,
            merchant_payment_id,
        },
    })))
}

/// Create a payment intent.
///
/// A repeated `Idempotency-Key` replays the first successful response for ten
/// minutes instead of creating another intent. Concurrent requests with the
/// same key share one provider call; failures are not remembered.
#[instrument(skip(state, headers, request))]
pub async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreatePaymentRequest>,
) -> Result<Json<serde_json::Value>> {
    let key = idempotency_key(&headers)?;

    let (Some(amount), Some(description)) = (
        request.amount.filter(|a| *a > 0),
        request
            .order_description
            .filter(|d| !d.trim().is_empty()),
    ) else {
        return Err(AppError::BadRequest(MSG_CREATE_REQUIRED.to_string()));
    };

    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_owned();
    let intent = create_intent(&state, Yen::new(amount), description, user_agent);

    let body = match key {
        None => intent.await.map_err(AppError::payment_request(MSG_CREATE_FAILED))?,
        Some(key) => {
            let entry = state
                .idempotency()
                .entry(key)
                .or_try_insert_with(intent)
                .await
                .map_err(|source| AppError::PaymentRequest {
                    message: MSG_CREATE_FAILED,
                    source,
                })?;
            if !entry.is_fresh() {
                tracing::debug!(idempotency_key = %entry.key(), "Replaying cached payment response");
            }
            entry.into_value()
        }
    };

    Ok(Json(body.as_ref().clone()))
}

/// Fetch the provider's view of a payment.
#[instrument(skip(state))]
pub async fn status(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<serde_json::Value>> {
    let merchant_payment_id = required_payment_id(query.merchant_payment_id)?;

    let details = state
        .gateway()
        .payment_details(&merchant_payment_id)
        .await
        .map_err(AppError::payment_request(MSG_STATUS_FAILED))?;

    Ok(Json(json!({
        "success": true,
        "data": PaymentStatusView {
            status: details.status,
            payment_id: details.payment_id,
            merchant_payment_id: details.merchant_payment_id,
            amount: details.amount,
            order_description: details.order_description,
            payment_date: details.requested_at,
            completed_at: details.accepted_at,
        },
    })))
}

/// Cancel a payment.
#[instrument(skip(state, request))]
pub async fn cancel(
    State(state): State<AppState>,
    Json(request): Json<CancelPaymentRequest>,
) -> Result<Json<serde_json::Value>> {
    let merchant_payment_id = required_payment_id(request.merchant_payment_id)?;

    state
        .gateway()
        .cancel_payment(&merchant_payment_id)
        .await
        .map_err(AppError::payment_request(MSG_CANCEL_FAILED))?;

    tracing::info!(merchant_payment_id = %merchant_payment_id, "Payment cancelled");
    Ok(Json(json!({
        "success": true,
        "message": MSG_CANCELED,
    })))
}
