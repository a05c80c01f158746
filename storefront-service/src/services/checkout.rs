//! Checkout orchestration: cart → durable order.
//!
//! COD orders are confirmed on the spot: stock is reserved and the cart is
//! cleared before the caller hears back. ONLINE orders are persisted unpaid
//! and untouched otherwise; the reconciliation engine performs the
//! reserve/clear/status transition exactly once at first confirmed payment.

use crate::config::PricingConfig;
use crate::models::{
    Order, OrderItem, OrderStatus, PaymentMethod, PaymentStatus, ShippingAddress,
};
use crate::services::{CartService, InventoryService, StoreRepository};
use mongodb::bson::DateTime;
use store_core::error::AppError;
use uuid::Uuid;

#[derive(Clone)]
pub struct CheckoutService {
    repository: StoreRepository,
    inventory: InventoryService,
    cart: CartService,
    pricing: PricingConfig,
}

fn round_money(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

impl CheckoutService {
    pub fn new(
        repository: StoreRepository,
        inventory: InventoryService,
        cart: CartService,
        pricing: PricingConfig,
    ) -> Self {
        Self {
            repository,
            inventory,
            cart,
            pricing,
        }
    }

    pub async fn place_order(
        &self,
        user_id: Uuid,
        shipping_address: ShippingAddress,
        payment_method: PaymentMethod,
    ) -> Result<Order, AppError> {
        let cart = self
            .repository
            .get_cart_by_user(user_id)
            .await
            .map_err(AppError::DatabaseError)?
            .filter(|cart| !cart.items.is_empty())
            .ok_or(AppError::EmptyCart)?;

        // Early availability pass for precise errors. The final guard is the
        // atomic reserve below (COD) or at payment confirmation (ONLINE).
        for item in &cart.items {
            self.inventory
                .check_available(item.product_id, item.quantity)
                .await?;
        }

        let items: Vec<OrderItem> = cart
            .items
            .iter()
            .map(|item| OrderItem {
                product_id: item.product_id,
                name: item.name.clone(),
                quantity: item.quantity,
                price: item.price,
            })
            .collect();

        let items_price = round_money(
            items
                .iter()
                .map(|item| item.price * item.quantity as f64)
                .sum(),
        );
        let shipping_price = self.pricing.shipping_price;
        let tax_price = round_money(items_price * self.pricing.tax_rate);
        let total_price = round_money(items_price + shipping_price + tax_price);

        let now = DateTime::now();
        let order = Order {
            id: Uuid::new_v4(),
            user_id,
            items,
            shipping_address,
            payment_method,
            items_price,
            shipping_price,
            tax_price,
            total_price,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            is_paid: false,
            paid_at: None,
            gateway_order_id: None,
            gateway_payment_id: None,
            gateway_signature: None,
            created_at: now,
            updated_at: now,
        };

        self.repository
            .insert_order(order.clone())
            .await
            .map_err(AppError::DatabaseError)?;

        match payment_method {
            PaymentMethod::Cod => self.confirm_cod_order(order).await,
            PaymentMethod::Online => {
                // No reservation, no cart clearing: the order stays
                // pending/unpaid until a payment signal arrives.
                tracing::info!(
                    order_id = %order.id,
                    user_id = %user_id,
                    total = order.total_price,
                    "Online order created, awaiting payment"
                );
                Ok(order)
            }
        }
    }

    /// COD confirmation: reserve every line or fail the whole placement.
    /// `reserve_all` compensates partial reservations internally; on failure
    /// the just-created order is deleted so nothing dangles.
    async fn confirm_cod_order(&self, mut order: Order) -> Result<Order, AppError> {
        if let Err(err) = self.inventory.reserve_all(&order.items).await {
            if let Err(delete_err) = self.repository.delete_order(order.id).await {
                tracing::error!(
                    order_id = %order.id,
                    error = %delete_err,
                    "Failed to remove order after reservation failure"
                );
            }
            return Err(err);
        }

        self.cart.clear(order.user_id).await?;
        self.repository
            .update_order_status(order.id, OrderStatus::Processing)
            .await
            .map_err(AppError::DatabaseError)?;
        order.status = OrderStatus::Processing;

        tracing::info!(
            order_id = %order.id,
            user_id = %order.user_id,
            total = order.total_price,
            "COD order confirmed"
        );
        Ok(order)
    }
}
