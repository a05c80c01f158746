//! Razorpay gateway client.
//!
//! An explicit, injected client (no global singleton) wrapping the Orders and
//! Payments APIs plus both HMAC signature schemes. Outbound calls carry a
//! bounded timeout; timeouts, connect failures, and gateway 5xx responses
//! surface as the retryable `GatewayUnavailable` error.

use crate::config::RazorpayConfig;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use store_core::error::AppError;
use store_core::signature::{payment_signature_payload, verify_hmac};

#[derive(Clone)]
pub struct RazorpayClient {
    client: reqwest::Client,
    config: RazorpayConfig,
}

#[derive(Debug, Serialize)]
struct CreateOrderBody {
    /// Amount in the smallest currency unit (paise for INR).
    amount: u64,
    currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    receipt: Option<String>,
}

/// Gateway order as returned by the Orders API.
#[derive(Debug, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    pub amount: u64,
    pub currency: String,
    pub receipt: Option<String>,
    /// `created` | `attempted` | `paid`
    pub status: String,
    pub created_at: u64,
}

/// Gateway payment record from the payments listing.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayPayment {
    pub id: String,
    pub amount: u64,
    pub currency: String,
    /// `created` | `authorized` | `captured` | `failed` | `refunded`
    pub status: String,
    pub order_id: Option<String>,
    pub method: Option<String>,
    pub created_at: u64,
}

#[derive(Debug, Deserialize)]
struct PaymentCollection {
    items: Vec<GatewayPayment>,
}

/// Webhook envelope pushed by the gateway.
#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    pub event: String,
    pub payload: WebhookPayload,
    pub created_at: u64,
}

#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    pub payment: Option<WebhookPaymentEntity>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookPaymentEntity {
    pub entity: GatewayPayment,
}

#[derive(Debug, Deserialize)]
struct GatewayErrorBody {
    error: GatewayErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GatewayErrorDetail {
    code: String,
    description: String,
}

impl RazorpayClient {
    pub fn new(config: RazorpayConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .unwrap_or_default();
        Self { client, config }
    }

    pub fn key_id(&self) -> &str {
        &self.config.key_id
    }

    pub fn is_configured(&self) -> bool {
        !self.config.key_id.is_empty() && !self.config.key_secret.expose_secret().is_empty()
    }

    /// Create a gateway order for client-side checkout.
    pub async fn create_order(
        &self,
        amount_minor_units: u64,
        currency: &str,
        receipt: Option<String>,
    ) -> Result<GatewayOrder, AppError> {
        let url = format!("{}/orders", self.config.api_base_url);
        let body = CreateOrderBody {
            amount: amount_minor_units,
            currency: currency.to_string(),
            receipt,
        };

        let response = self
            .client
            .post(&url)
            .basic_auth(
                &self.config.key_id,
                Some(self.config.key_secret.expose_secret()),
            )
            .json(&body)
            .send()
            .await
            .map_err(Self::transport_error)?;

        let order: GatewayOrder = Self::read_response(response, "create_order").await?;
        tracing::info!(
            gateway_order_id = %order.id,
            amount = order.amount,
            currency = %order.currency,
            "Gateway order created"
        );
        Ok(order)
    }

    /// Fetch the gateway's authoritative view of an order.
    pub async fn fetch_order(&self, gateway_order_id: &str) -> Result<GatewayOrder, AppError> {
        let url = format!("{}/orders/{}", self.config.api_base_url, gateway_order_id);
        let response = self
            .client
            .get(&url)
            .basic_auth(
                &self.config.key_id,
                Some(self.config.key_secret.expose_secret()),
            )
            .send()
            .await
            .map_err(Self::transport_error)?;
        Self::read_response(response, "fetch_order").await
    }

    /// Payments recorded against a gateway order, most recent first.
    pub async fn fetch_payments(
        &self,
        gateway_order_id: &str,
    ) -> Result<Vec<GatewayPayment>, AppError> {
        let url = format!(
            "{}/orders/{}/payments",
            self.config.api_base_url, gateway_order_id
        );
        let response = self
            .client
            .get(&url)
            .basic_auth(
                &self.config.key_id,
                Some(self.config.key_secret.expose_secret()),
            )
            .send()
            .await
            .map_err(Self::transport_error)?;

        let collection: PaymentCollection = Self::read_response(response, "fetch_payments").await?;
        let mut payments = collection.items;
        payments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(payments)
    }

    /// Verify the checkout signature: HMAC-SHA256 of
    /// `"{gateway_order_id}|{gateway_payment_id}"` under the key secret.
    /// This, not the bearer token, is the proof a payment actually happened.
    pub fn verify_payment_signature(
        &self,
        gateway_order_id: &str,
        gateway_payment_id: &str,
        signature: &str,
    ) -> Result<bool, AppError> {
        let payload = payment_signature_payload(gateway_order_id, gateway_payment_id);
        verify_hmac(
            self.config.key_secret.expose_secret(),
            payload.as_bytes(),
            signature,
        )
        .map_err(AppError::InternalError)
    }

    /// Verify a webhook signature over the raw, unparsed body bytes. Any
    /// re-serialization before this point would break the digest.
    pub fn verify_webhook_signature(&self, raw_body: &[u8], signature: &str) -> Result<bool, AppError> {
        verify_hmac(
            self.config.webhook_secret.expose_secret(),
            raw_body,
            signature,
        )
        .map_err(AppError::InternalError)
    }

    pub fn parse_webhook_event(&self, raw_body: &[u8]) -> Result<WebhookEvent, AppError> {
        serde_json::from_slice(raw_body)
            .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Invalid webhook payload: {}", e)))
    }

    fn transport_error(err: reqwest::Error) -> AppError {
        AppError::GatewayUnavailable(anyhow::anyhow!("Gateway request failed: {}", err))
    }

    async fn read_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
        operation: &str,
    ) -> Result<T, AppError> {
        let status = response.status();
        let body = response.text().await.map_err(Self::transport_error)?;

        if status.is_success() {
            return serde_json::from_str(&body).map_err(|e| {
                AppError::InternalError(anyhow::anyhow!(
                    "Unexpected gateway response for {}: {}",
                    operation,
                    e
                ))
            });
        }

        if status.is_server_error() {
            tracing::error!(%status, operation, "Gateway server error");
            return Err(AppError::GatewayUnavailable(anyhow::anyhow!(
                "Gateway returned {}",
                status
            )));
        }

        let detail: GatewayErrorBody =
            serde_json::from_str(&body).unwrap_or_else(|_| GatewayErrorBody {
                error: GatewayErrorDetail {
                    code: "UNKNOWN".to_string(),
                    description: body.clone(),
                },
            });
        tracing::error!(
            code = %detail.error.code,
            description = %detail.error.description,
            operation,
            "Gateway rejected request"
        );
        Err(AppError::BadRequest(anyhow::anyhow!(
            "Gateway error: {}",
            detail.error.code
        )))
    }
}
