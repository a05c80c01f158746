//! Payment reconciliation.
//!
//! Three independent channels report the fate of one gateway payment: the
//! client's inline verification call, an admin-triggered pull of the
//! gateway's authoritative state, and the gateway's own webhook push. They
//! arrive in any order, possibly duplicated, possibly days apart.
//!
//! All three converge on a single serialization point: the conditional
//! update `claim_order_completion` ("set paid WHERE not paid"). Whichever
//! signal wins that update runs the stock-reserve and cart-clear side effects
//! exactly once; every other completion signal only refreshes cosmetic
//! gateway fields. Idempotence is structural, not cached, so replays are safe
//! at any distance in time.

use crate::models::{Order, OrderStatus, PaymentMethod, PaymentStatus};
use crate::services::razorpay::{GatewayOrder, GatewayPayment, RazorpayClient};
use crate::services::{CartService, InventoryService, StoreRepository};
use store_core::error::AppError;
use uuid::Uuid;

/// What a completion signal did to the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// This signal won the transition; stock was reserved and the cart
    /// cleared.
    Applied,
    /// The order was already paid; only gateway correlation fields were
    /// refreshed. Not an error: callers report success.
    AlreadyProcessed,
}

/// Gateway payment status → local payment status. `None` means the status
/// carries no local transition (e.g. an authorization awaiting capture).
pub fn map_gateway_status(status: &str) -> Option<PaymentStatus> {
    match status {
        "captured" => Some(PaymentStatus::Completed),
        "failed" => Some(PaymentStatus::Failed),
        "refunded" => Some(PaymentStatus::Refunded),
        "created" | "authorized" => Some(PaymentStatus::Pending),
        _ => None,
    }
}

/// Checkout session data handed to the client-side payment UI.
#[derive(Debug, serde::Serialize)]
pub struct PaymentSession {
    pub order_id: Uuid,
    pub gateway_order_id: String,
    pub amount: u64,
    pub currency: String,
    pub key_id: String,
}

/// Admin sync result: our view next to the gateway's.
#[derive(Debug, serde::Serialize)]
pub struct SyncReport {
    pub order: Order,
    pub gateway_status: String,
    pub payments: Vec<GatewayPaymentSummary>,
}

#[derive(Debug, serde::Serialize)]
pub struct GatewayPaymentSummary {
    pub id: String,
    pub status: String,
    pub amount: u64,
    pub created_at: u64,
}

pub const CURRENCY: &str = "INR";

#[derive(Clone)]
pub struct ReconciliationEngine {
    repository: StoreRepository,
    inventory: InventoryService,
    cart: CartService,
    gateway: RazorpayClient,
}

impl ReconciliationEngine {
    pub fn new(
        repository: StoreRepository,
        inventory: InventoryService,
        cart: CartService,
        gateway: RazorpayClient,
    ) -> Self {
        Self {
            repository,
            inventory,
            cart,
            gateway,
        }
    }

    /// Open (or reuse) a gateway payment session for an unpaid ONLINE order.
    pub async fn create_payment_session(
        &self,
        caller_id: Uuid,
        order_id: Uuid,
    ) -> Result<PaymentSession, AppError> {
        let order = self.load_owned_order(caller_id, order_id).await?;

        if order.payment_method != PaymentMethod::Online {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Order is not payable online"
            )));
        }
        if order.is_paid {
            return Err(AppError::BadRequest(anyhow::anyhow!("Order is already paid")));
        }

        let amount_minor_units = (order.total_price * 100.0).round() as u64;

        // A session already opened for this order is reusable; a second
        // create call is an idempotent no-op against the gateway.
        let gateway_order_id = match &order.gateway_order_id {
            Some(existing) => existing.clone(),
            None => {
                let gateway_order = self
                    .gateway
                    .create_order(
                        amount_minor_units,
                        CURRENCY,
                        Some(format!("order_{}", order.id)),
                    )
                    .await?;
                self.repository
                    .set_gateway_order_id(order.id, &gateway_order.id)
                    .await
                    .map_err(AppError::DatabaseError)?;
                gateway_order.id
            }
        };

        Ok(PaymentSession {
            order_id: order.id,
            gateway_order_id,
            amount: amount_minor_units,
            currency: CURRENCY.to_string(),
            key_id: self.gateway.key_id().to_string(),
        })
    }

    /// Channel (a): the client's inline verification call.
    ///
    /// The HMAC over `"{gateway_order_id}|{gateway_payment_id}"` is the sole
    /// proof the caller completed a real payment; no bearer token substitutes
    /// for it, and it is checked before any lookup.
    pub async fn verify_payment(
        &self,
        caller_id: Uuid,
        order_id: Uuid,
        gateway_order_id: &str,
        gateway_payment_id: &str,
        signature: &str,
    ) -> Result<(Order, CompletionOutcome), AppError> {
        let valid = self.gateway.verify_payment_signature(
            gateway_order_id,
            gateway_payment_id,
            signature,
        )?;
        if !valid {
            tracing::warn!(
                order_id = %order_id,
                gateway_order_id = %gateway_order_id,
                gateway_payment_id = %gateway_payment_id,
                "Payment verification rejected: signature mismatch"
            );
            return Err(AppError::SignatureMismatch);
        }

        let order = self.load_owned_order(caller_id, order_id).await?;

        if let Some(stored) = &order.gateway_order_id {
            if stored != gateway_order_id {
                tracing::warn!(
                    order_id = %order_id,
                    stored = %stored,
                    received = %gateway_order_id,
                    "Gateway order id does not match the order's session"
                );
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Gateway order does not match this order"
                )));
            }
        }

        let outcome = self
            .apply_completion(
                &order,
                Some(gateway_order_id),
                Some(gateway_payment_id),
                Some(signature),
            )
            .await?;

        let updated = self
            .repository
            .get_order(order_id)
            .await
            .map_err(AppError::DatabaseError)?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Order not found")))?;
        Ok((updated, outcome))
    }

    /// Channel (b): admin-triggered pull of the gateway's authoritative
    /// state. Maps the most recent payment's status onto the order through
    /// the same completion guard as every other channel.
    pub async fn sync_order(&self, gateway_order_id: &str) -> Result<SyncReport, AppError> {
        let order = self
            .repository
            .get_order_by_gateway_order_id(gateway_order_id)
            .await
            .map_err(AppError::DatabaseError)?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Order not found")))?;

        let gateway_order: GatewayOrder = self.gateway.fetch_order(gateway_order_id).await?;
        let payments = self.gateway.fetch_payments(gateway_order_id).await?;

        match payments.first() {
            None => {
                if gateway_order.status == "created" {
                    self.repository
                        .set_payment_pending(order.id)
                        .await
                        .map_err(AppError::DatabaseError)?;
                }
            }
            Some(latest) => {
                self.apply_gateway_payment(&order, latest).await?;
            }
        }

        let refreshed = self
            .repository
            .get_order(order.id)
            .await
            .map_err(AppError::DatabaseError)?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Order not found")))?;

        Ok(SyncReport {
            order: refreshed,
            gateway_status: gateway_order.status,
            payments: payments
                .iter()
                .map(|p| GatewayPaymentSummary {
                    id: p.id.clone(),
                    status: p.status.clone(),
                    amount: p.amount,
                    created_at: p.created_at,
                })
                .collect(),
        })
    }

    /// Channel (c): the gateway's webhook push.
    ///
    /// Signature over the raw body is checked before any parsing dispatch or
    /// order lookup; an unverified payload never causes a side effect.
    /// Unknown event types and unmatched orders are acknowledged (the caller
    /// returns 200) so the gateway does not retry-storm on data we cannot
    /// reconcile.
    pub async fn handle_webhook(
        &self,
        raw_body: &[u8],
        signature_header: &str,
    ) -> Result<(), AppError> {
        let valid = self
            .gateway
            .verify_webhook_signature(raw_body, signature_header)?;
        if !valid {
            tracing::warn!("Webhook rejected: invalid signature");
            return Err(AppError::SignatureMismatch);
        }

        let event = self.gateway.parse_webhook_event(raw_body)?;
        tracing::info!(event_type = %event.event, "Processing gateway webhook");

        match event.event.as_str() {
            "payment.captured" | "payment.failed" | "payment.refunded" => {
                let Some(payment) = event.payload.payment.map(|p| p.entity) else {
                    tracing::warn!(event_type = %event.event, "Webhook carried no payment entity");
                    return Ok(());
                };
                let Some(order) = self.find_order_for_payment(&payment).await? else {
                    tracing::warn!(
                        gateway_payment_id = %payment.id,
                        gateway_order_id = ?payment.order_id,
                        "No local order matches webhook payment; acknowledging"
                    );
                    return Ok(());
                };
                self.apply_gateway_payment(&order, &payment).await?;
            }
            other => {
                // The gateway adds event types over time; unknown ones are
                // accepted and ignored.
                tracing::debug!(event_type = %other, "Ignoring unhandled webhook event type");
            }
        }

        Ok(())
    }

    /// Apply one gateway payment record to an order.
    async fn apply_gateway_payment(
        &self,
        order: &Order,
        payment: &GatewayPayment,
    ) -> Result<(), AppError> {
        match map_gateway_status(&payment.status) {
            Some(PaymentStatus::Completed) => {
                self.apply_completion(
                    order,
                    payment.order_id.as_deref(),
                    Some(&payment.id),
                    None,
                )
                .await?;
            }
            Some(PaymentStatus::Failed) => {
                // Failure never reserves stock or clears the cart; a later
                // successful retry can still complete the order.
                let changed = self
                    .repository
                    .set_payment_failed(order.id, Some(&payment.id))
                    .await
                    .map_err(AppError::DatabaseError)?;
                tracing::info!(
                    order_id = %order.id,
                    gateway_payment_id = %payment.id,
                    changed,
                    "Payment failed signal applied"
                );
            }
            Some(PaymentStatus::Refunded) => {
                let changed = self
                    .repository
                    .set_payment_refunded(order.id, Some(&payment.id))
                    .await
                    .map_err(AppError::DatabaseError)?;
                tracing::info!(
                    order_id = %order.id,
                    gateway_payment_id = %payment.id,
                    changed,
                    "Payment refunded signal applied"
                );
            }
            Some(PaymentStatus::Pending) | None => {
                tracing::debug!(
                    order_id = %order.id,
                    status = %payment.status,
                    "Gateway payment status carries no local transition"
                );
            }
        }
        Ok(())
    }

    /// The transition into `completed`, guarded for exactly-once side
    /// effects. The conditional update is the only serialization point: when
    /// it reports "no document changed" the order was already paid and the
    /// reserve/clear side effects are skipped entirely.
    async fn apply_completion(
        &self,
        order: &Order,
        gateway_order_id: Option<&str>,
        gateway_payment_id: Option<&str>,
        gateway_signature: Option<&str>,
    ) -> Result<CompletionOutcome, AppError> {
        let claimed = self
            .repository
            .claim_order_completion(
                order.id,
                gateway_order_id,
                gateway_payment_id,
                gateway_signature,
            )
            .await
            .map_err(AppError::DatabaseError)?;

        if !claimed {
            self.repository
                .refresh_gateway_fields(order.id, gateway_payment_id, gateway_signature)
                .await
                .map_err(AppError::DatabaseError)?;
            tracing::info!(
                order_id = %order.id,
                "Duplicate completion signal; payment side effects already applied"
            );
            return Ok(CompletionOutcome::AlreadyProcessed);
        }

        // This call won the transition: reserve stock and clear the cart,
        // exactly once for this order.
        if let Err(err) = self.inventory.reserve_all(&order.items).await {
            // The payment is genuinely captured at the gateway, so the order
            // stays paid; fulfillment drops back to pending for manual
            // handling and the cart is left alone.
            tracing::error!(
                order_id = %order.id,
                error = %err,
                "Paid order could not reserve stock; fulfillment needs manual attention"
            );
            self.repository
                .update_order_status(order.id, OrderStatus::Pending)
                .await
                .map_err(AppError::DatabaseError)?;
            return Ok(CompletionOutcome::Applied);
        }

        self.cart.clear(order.user_id).await?;
        tracing::info!(
            order_id = %order.id,
            user_id = %order.user_id,
            "Payment completed: stock reserved, cart cleared"
        );
        Ok(CompletionOutcome::Applied)
    }

    /// Webhook payments are matched by payment id first (set by an earlier
    /// verify), then by the payment's gateway order id (webhook-first
    /// arrival, before any verify call stored the payment id).
    async fn find_order_for_payment(
        &self,
        payment: &GatewayPayment,
    ) -> Result<Option<Order>, AppError> {
        if let Some(order) = self
            .repository
            .get_order_by_gateway_payment_id(&payment.id)
            .await
            .map_err(AppError::DatabaseError)?
        {
            return Ok(Some(order));
        }
        if let Some(gateway_order_id) = &payment.order_id {
            return self
                .repository
                .get_order_by_gateway_order_id(gateway_order_id)
                .await
                .map_err(AppError::DatabaseError);
        }
        Ok(None)
    }

    async fn load_owned_order(&self, caller_id: Uuid, order_id: Uuid) -> Result<Order, AppError> {
        let order = self
            .repository
            .get_order(order_id)
            .await
            .map_err(AppError::DatabaseError)?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Order not found")))?;
        if order.user_id != caller_id {
            return Err(AppError::Forbidden(anyhow::anyhow!(
                "Order belongs to another user"
            )));
        }
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_status_mapping() {
        assert_eq!(map_gateway_status("captured"), Some(PaymentStatus::Completed));
        assert_eq!(map_gateway_status("failed"), Some(PaymentStatus::Failed));
        assert_eq!(map_gateway_status("refunded"), Some(PaymentStatus::Refunded));
        assert_eq!(map_gateway_status("created"), Some(PaymentStatus::Pending));
        assert_eq!(map_gateway_status("authorized"), Some(PaymentStatus::Pending));
        assert_eq!(map_gateway_status("disputed"), None);
    }
}
