//! `reqwest`-backed [`PaymentGateway`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use seto_core::MerchantPaymentId;
use tracing::{debug, instrument};

use super::auth::{JSON_CONTENT_TYPE, RequestSigner};
use super::types::{
    ApiResponse, CreateQrCodeRequest, PaymentDetails, QrCode, RefundDetails, RefundRequest,
};
use super::{PaymentError, PaymentGateway, validate_payment_id};
use crate::config::PayPayConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MERCHANT_HEADER: &str = "X-ASSUME-MERCHANT";

/// Client for the PayPay Open Payment API.
#[derive(Clone)]
pub struct PayPayClient {
    inner: Arc<PayPayClientInner>,
}

struct PayPayClientInner {
    client: reqwest::Client,
    base_url: String,
    merchant_id: String,
    signer: RequestSigner,
}

impl PayPayClient {
    /// Create a new PayPay API client.
    #[must_use]
    pub fn new(config: &PayPayConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();

        Self {
            inner: Arc::new(PayPayClientInner {
                client,
                base_url: config.base_url().trim_end_matches('/').to_owned(),
                merchant_id: config.merchant_id.clone(),
                signer: RequestSigner::new(config.api_key.clone(), config.api_secret.clone()),
            }),
        }
    }

    /// Send a signed request and unwrap the result envelope.
    async fn execute<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> Result<ApiResponse<T>, PaymentError> {
        let url = format!("{}{path}", self.inner.base_url);
        let authorization = self
            .inner
            .signer
            .authorization(method.as_str(), path, body.as_deref());

        let mut request = self
            .inner
            .client
            .request(method, &url)
            .header(AUTHORIZATION, authorization)
            .header(MERCHANT_HEADER, &self.inner.merchant_id);
        if let Some(body) = body {
            request = request.header(CONTENT_TYPE, JSON_CONTENT_TYPE).body(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let response_text = response.text().await?;

        let envelope: ApiResponse<T> = match serde_json::from_str(&response_text) {
            Ok(envelope) => envelope,
            Err(e) if status.is_success() => {
                tracing::error!(
                    error = %e,
                    body = %response_text.chars().take(500).collect::<String>(),
                    "Failed to parse PayPay response"
                );
                return Err(PaymentError::Parse(e));
            }
            Err(_) => {
                tracing::error!(
                    status = %status,
                    body = %response_text.chars().take(500).collect::<String>(),
                    "PayPay API returned non-success status"
                );
                return Err(PaymentError::Status {
                    status: status.as_u16(),
                    body: response_text.chars().take(200).collect(),
                });
            }
        };

        if !envelope.result_info.is_success() {
            debug!(
                status = %status,
                code = %envelope.result_info.code,
                message = %envelope.result_info.message,
                "PayPay result is not SUCCESS"
            );
            return Err(PaymentError::Api {
                code: envelope.result_info.code,
                message: envelope.result_info.message,
            });
        }

        Ok(envelope)
    }

    async fn execute_data<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> Result<T, PaymentError> {
        self.execute(method, path, body)
            .await?
            .data
            .ok_or(PaymentError::MissingData)
    }
}

#[async_trait]
impl PaymentGateway for PayPayClient {
    #[instrument(skip(self, request), fields(merchant_payment_id = %request.merchant_payment_id, amount = %request.amount.amount))]
    async fn create_qr_code(&self, request: &CreateQrCodeRequest) -> Result<QrCode, PaymentError> {
        validate_payment_id(request.merchant_payment_id.as_str())?;
        let body = serde_json::to_vec(request)?;
        self.execute_data(Method::POST, "/v2/codes", Some(body)).await
    }

    #[instrument(skip(self), fields(merchant_payment_id = %merchant_payment_id))]
    async fn payment_details(
        &self,
        merchant_payment_id: &MerchantPaymentId,
    ) -> Result<PaymentDetails, PaymentError> {
        validate_payment_id(merchant_payment_id.as_str())?;
        let path = format!("/v2/codes/payments/{merchant_payment_id}");
        self.execute_data(Method::GET, &path, None).await
    }

    #[instrument(skip(self), fields(merchant_payment_id = %merchant_payment_id))]
    async fn cancel_payment(
        &self,
        merchant_payment_id: &MerchantPaymentId,
    ) -> Result<(), PaymentError> {
        validate_payment_id(merchant_payment_id.as_str())?;
        let path = format!("/v2/payments/{merchant_payment_id}");
        self.execute::<serde_json::Value>(Method::DELETE, &path, None)
            .await?;
        Ok(())
    }

    #[instrument(skip(self, request), fields(payment_id = %request.payment_id))]
    async fn refund_payment(&self, request: &RefundRequest) -> Result<RefundDetails, PaymentError> {
        validate_payment_id(request.payment_id.as_str())?;
        let body = serde_json::to_vec(request)?;
        self.execute_data(Method::POST, "/v2/refunds", Some(body)).await
    }
}
