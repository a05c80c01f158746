//! Stock reservation.
//!
//! A reservation is the atomic decrement of a product's stock, paired exactly
//! once with an order's confirmation. The decrement itself lives in the
//! repository as a decrement-if-sufficient conditional update; this service
//! adds the error taxonomy and the multi-line reserve with compensating
//! releases.

use crate::models::OrderItem;
use crate::services::StoreRepository;
use store_core::error::AppError;
use uuid::Uuid;

#[derive(Clone)]
pub struct InventoryService {
    repository: StoreRepository,
}

impl InventoryService {
    pub fn new(repository: StoreRepository) -> Self {
        Self { repository }
    }

    /// Read-only availability check. The race window between this check and
    /// a later reserve is closed by the reserve's own conditional update;
    /// callers use this for early, precise failures only.
    pub async fn check_available(&self, product_id: Uuid, quantity: i64) -> Result<(), AppError> {
        let product = self
            .repository
            .get_product(product_id)
            .await
            .map_err(AppError::DatabaseError)?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Product not found")))?;

        if product.stock < quantity {
            return Err(AppError::OutOfStock {
                product_id: product_id.to_string(),
                available: product.stock,
            });
        }
        Ok(())
    }

    /// Reserve `quantity` units: decrement stock iff the current stock still
    /// covers it. Re-validates at the moment of mutation, so two concurrent
    /// reservations can never drive stock negative.
    pub async fn reserve(&self, product_id: Uuid, quantity: i64) -> Result<(), AppError> {
        let reserved = self
            .repository
            .reserve_stock(product_id, quantity)
            .await
            .map_err(AppError::DatabaseError)?;
        if reserved {
            tracing::info!(product_id = %product_id, quantity, "Stock reserved");
            return Ok(());
        }

        // The conditional update did not match: either the product is gone
        // or stock ran out between check and reserve.
        match self
            .repository
            .get_product(product_id)
            .await
            .map_err(AppError::DatabaseError)?
        {
            Some(product) => Err(AppError::OutOfStock {
                product_id: product_id.to_string(),
                available: product.stock,
            }),
            None => Err(AppError::NotFound(anyhow::anyhow!("Product not found"))),
        }
    }

    /// Compensating increment.
    pub async fn release(&self, product_id: Uuid, quantity: i64) -> Result<(), AppError> {
        let released = self
            .repository
            .release_stock(product_id, quantity)
            .await
            .map_err(AppError::DatabaseError)?;
        if !released {
            return Err(AppError::NotFound(anyhow::anyhow!("Product not found")));
        }
        tracing::info!(product_id = %product_id, quantity, "Stock released");
        Ok(())
    }

    /// Reserve every line of an order. If a line fails mid-loop the lines
    /// already reserved are released before the failure is returned, leaving
    /// stock exactly as it was.
    pub async fn reserve_all(&self, items: &[OrderItem]) -> Result<(), AppError> {
        let mut reserved: Vec<&OrderItem> = Vec::with_capacity(items.len());
        for item in items {
            if let Err(err) = self.reserve(item.product_id, item.quantity).await {
                for done in reserved {
                    if let Err(release_err) = self.release(done.product_id, done.quantity).await {
                        tracing::error!(
                            product_id = %done.product_id,
                            quantity = done.quantity,
                            error = %release_err,
                            "Failed to release stock while compensating a partial reservation"
                        );
                    }
                }
                return Err(err);
            }
            reserved.push(item);
        }
        Ok(())
    }

}
