//! PayPay Open Payment API wire types.
//!
//! Every response is wrapped in `{resultInfo, data}`; only a `resultInfo.code`
//! of `SUCCESS` means the call succeeded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use seto_core::{CurrencyCode, MerchantPaymentId, PaymentId, PaymentStatus, Yen};

/// Result code of a successful call.
pub const RESULT_SUCCESS: &str = "SUCCESS";

/// Amount with currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    pub amount: Yen,
    #[serde(default)]
    pub currency: CurrencyCode,
}

impl From<Yen> for Money {
    fn from(amount: Yen) -> Self {
        Self {
            amount,
            currency: CurrencyCode::JPY,
        }
    }
}

/// Response envelope.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub result_info: ResultInfo,
    pub data: Option<T>,
}

/// Outcome of a call.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultInfo {
    pub code: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub code_id: Option<String>,
}

impl ResultInfo {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.code == RESULT_SUCCESS
    }
}

/// `POST /v2/codes` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateQrCodeRequest {
    pub merchant_payment_id: MerchantPaymentId,
    pub amount: Money,
    pub code_type: &'static str,
    pub order_description: String,
    pub is_authorization: bool,
    pub redirect_url: String,
    pub redirect_type: &'static str,
    pub user_agent: String,
}

impl CreateQrCodeRequest {
    /// A one-off order QR code that redirects back to the web store.
    #[must_use]
    pub fn order_qr(
        merchant_payment_id: MerchantPaymentId,
        amount: Yen,
        order_description: impl Into<String>,
        redirect_url: impl Into<String>,
        user_agent: impl Into<String>,
    ) -> Self {
        Self {
            merchant_payment_id,
            amount: amount.into(),
            code_type: "ORDER_QR",
            order_description: order_description.into(),
            is_authorization: false,
            redirect_url: redirect_url.into(),
            redirect_type: "WEB_LINK",
            user_agent: user_agent.into(),
        }
    }
}

/// `POST /v2/codes` response data.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QrCode {
    #[serde(default)]
    pub code_id: Option<String>,
    pub url: String,
    #[serde(default)]
    pub deep_link: String,
    /// Epoch seconds.
    #[serde(default)]
    pub expiry_date: Option<i64>,
    pub merchant_payment_id: MerchantPaymentId,
}

impl QrCode {
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expiry_date.and_then(|secs| DateTime::from_timestamp(secs, 0))
    }
}

/// `GET /v2/codes/payments/{merchantPaymentId}` response data.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDetails {
    pub status: PaymentStatus,
    #[serde(default)]
    pub payment_id: Option<PaymentId>,
    pub merchant_payment_id: MerchantPaymentId,
    pub amount: Money,
    #[serde(default)]
    pub order_description: Option<String>,
    /// Epoch seconds.
    #[serde(default)]
    pub requested_at: Option<i64>,
    /// Epoch seconds; set once the payment is accepted.
    #[serde(default)]
    pub accepted_at: Option<i64>,
}

impl PaymentDetails {
    #[must_use]
    pub fn requested(&self) -> Option<DateTime<Utc>> {
        self.requested_at.and_then(|secs| DateTime::from_timestamp(secs, 0))
    }

    #[must_use]
    pub fn accepted(&self) -> Option<DateTime<Utc>> {
        self.accepted_at.and_then(|secs| DateTime::from_timestamp(secs, 0))
    }
}

/// `POST /v2/refunds` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundRequest {
    pub merchant_refund_id: String,
    pub payment_id: PaymentId,
    pub amount: Money,
    pub requested_at: i64,
    pub reason: String,
}

impl RefundRequest {
    /// Refund `amount` of a payment; the refund id embeds the request time.
    #[must_use]
    pub fn new(
        payment_id: PaymentId,
        amount: Yen,
        reason: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            merchant_refund_id: format!("refund-{payment_id}-{}", now.timestamp_millis()),
            payment_id,
            amount: amount.into(),
            requested_at: now.timestamp(),
            reason: reason.into(),
        }
    }
}

/// `POST /v2/refunds` response data.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundDetails {
    pub status: String,
    pub merchant_refund_id: String,
    #[serde(default)]
    pub payment_id: Option<PaymentId>,
    pub amount: Money,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_order_qr_payload() {
        let request = CreateQrCodeRequest::order_qr(
            MerchantPaymentId::new("order_1"),
            Yen::new(2400),
            "SETO Blend Coffee: ¥2,400",
            "https://seto-coffee.jp/checkout/complete",
            "Mozilla/5.0",
        );
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["merchantPaymentId"], "order_1");
        assert_eq!(json["amount"]["amount"], 2400);
        assert_eq!(json["amount"]["currency"], "JPY");
        assert_eq!(json["codeType"], "ORDER_QR");
        assert_eq!(json["redirectType"], "WEB_LINK");
        assert_eq!(json["isAuthorization"], false);
        assert_eq!(json["userAgent"], "Mozilla/5.0");
    }

    #[test]
    fn test_parse_qr_code_response() {
        let body = r#"{
            "resultInfo": {"code": "SUCCESS", "message": "Success", "codeId": "08100001"},
            "data": {
                "codeId": "04-abc",
                "url": "https://qr-stg.sandbox.paypay.ne.jp/28180104abc",
                "deepLink": "paypay://payment?link_key=abc",
                "expiryDate": 1740787500,
                "merchantPaymentId": "order_1",
                "amount": {"amount": 2400, "currency": "JPY"}
            }
        }"#;
        let response: ApiResponse<QrCode> = serde_json::from_str(body).unwrap();
        assert!(response.result_info.is_success());
        let data = response.data.unwrap();
        assert_eq!(data.merchant_payment_id.as_str(), "order_1");
        assert_eq!(data.expires_at().unwrap().timestamp(), 1_740_787_500);
    }

    #[test]
    fn test_parse_error_response_without_data() {
        let body = r#"{"resultInfo": {"code": "DUPLICATE_DYNAMIC_QR_REQUEST", "message": "Duplicate Dynamic QR request error"}}"#;
        let response: ApiResponse<QrCode> = serde_json::from_str(body).unwrap();
        assert!(!response.result_info.is_success());
        assert!(response.data.is_none());
    }

    #[test]
    fn test_parse_payment_details() {
        let body = r#"{
            "resultInfo": {"code": "SUCCESS", "message": "Success"},
            "data": {
                "status": "COMPLETED",
                "paymentId": "0123456789",
                "merchantPaymentId": "order_1",
                "amount": {"amount": 2400, "currency": "JPY"},
                "requestedAt": 1740787200,
                "acceptedAt": 1740787260
            }
        }"#;
        let response: ApiResponse<PaymentDetails> = serde_json::from_str(body).unwrap();
        let data = response.data.unwrap();
        assert_eq!(data.status, PaymentStatus::Completed);
        assert_eq!(data.amount.amount, Yen::new(2400));
        assert!(data.accepted().is_some());
    }

    #[test]
    fn test_refund_request_id() {
        let now = DateTime::from_timestamp(1_740_787_200, 0).unwrap();
        let request = RefundRequest::new(PaymentId::new("pay_1"), Yen::new(1200), "damaged", now);
        assert_eq!(request.merchant_refund_id, "refund-pay_1-1740787200000");
        assert_eq!(request.requested_at, 1_740_787_200);
    }
}
