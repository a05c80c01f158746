//! Payment endpoints: gateway session creation, the client verification
//! call, the admin sync pull, and the gateway webhook.

use crate::dtos::{
    CreatePaymentOrderRequest, SyncOrderRequest, VerifyPaymentRequest, VerifyPaymentResponse,
};
use crate::middleware::{AdminUser, AuthUser};
use crate::services::reconciliation::{PaymentSession, SyncReport};
use crate::services::CompletionOutcome;
use crate::AppState;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use store_core::error::AppError;
use validator::Validate;

const WEBHOOK_SIGNATURE_HEADER: &str = "X-Razorpay-Signature";

pub async fn create_payment_order(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreatePaymentOrderRequest>,
) -> Result<(StatusCode, Json<PaymentSession>), AppError> {
    let session = state
        .reconciliation
        .create_payment_session(user.user_id, payload.order_id)
        .await?;
    Ok((StatusCode::CREATED, Json(session)))
}

pub async fn verify_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<VerifyPaymentRequest>,
) -> Result<Json<VerifyPaymentResponse>, AppError> {
    payload.validate()?;

    let (order, outcome) = state
        .reconciliation
        .verify_payment(
            user.user_id,
            payload.order_id,
            &payload.gateway_order_id,
            &payload.gateway_payment_id,
            &payload.signature,
        )
        .await?;

    let already_processed = outcome == CompletionOutcome::AlreadyProcessed;
    let message = if already_processed {
        "Payment already recorded"
    } else {
        "Payment verified"
    };
    Ok(Json(VerifyPaymentResponse {
        order,
        already_processed,
        message: message.to_string(),
    }))
}

pub async fn sync_order(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(payload): Json<SyncOrderRequest>,
) -> Result<Json<SyncReport>, AppError> {
    payload.validate()?;
    let report = state
        .reconciliation
        .sync_order(&payload.gateway_order_id)
        .await?;
    Ok(Json(report))
}

/// Gateway webhook. No bearer token: authenticity is the HMAC signature
/// header, verified over the raw body bytes before anything else happens.
/// Structurally valid, signed deliveries are always acknowledged with 200,
/// even when no local order matches.
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    let signature = headers
        .get(WEBHOOK_SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            tracing::warn!("Webhook rejected: missing signature header");
            AppError::SignatureMismatch
        })?;

    state.reconciliation.handle_webhook(&body, signature).await?;
    Ok(StatusCode::OK)
}
