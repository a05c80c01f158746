//! Cart aggregate.
//!
//! One mutable cart per user, addressed only by the authenticated owner's id.
//! Line items snapshot the product's price at add-time; the derived `total`
//! is recomputed by `recompute_total` before every persist, never trusted
//! from the client.

use crate::models::{Cart, CartItem};
use crate::services::{InventoryService, StoreRepository};
use mongodb::bson::DateTime;
use store_core::error::AppError;
use uuid::Uuid;

/// Σ(unit price snapshot × quantity).
pub fn recompute_total(items: &[CartItem]) -> f64 {
    items
        .iter()
        .map(|item| item.price * item.quantity as f64)
        .sum()
}

#[derive(Clone)]
pub struct CartService {
    repository: StoreRepository,
    inventory: InventoryService,
}

impl CartService {
    pub fn new(repository: StoreRepository, inventory: InventoryService) -> Self {
        Self {
            repository,
            inventory,
        }
    }

    /// The user's cart, or a fresh empty one. Reading never writes; an empty
    /// cart is only persisted once a mutation happens.
    pub async fn get(&self, user_id: Uuid) -> Result<Cart, AppError> {
        match self
            .repository
            .get_cart_by_user(user_id)
            .await
            .map_err(AppError::DatabaseError)?
        {
            Some(cart) => Ok(cart),
            None => Ok(Self::empty_cart(user_id)),
        }
    }

    pub async fn add_item(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i64,
    ) -> Result<Cart, AppError> {
        if quantity < 1 {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Quantity must be at least 1"
            )));
        }

        let product = self
            .repository
            .get_product(product_id)
            .await
            .map_err(AppError::DatabaseError)?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Product not found")))?;
        if !product.is_active {
            return Err(AppError::NotFound(anyhow::anyhow!("Product not found")));
        }

        let mut cart = self.get(user_id).await?;

        // Merge with an existing line; availability is checked for the
        // merged quantity. This is a read-only check; actual reservation
        // happens at order confirmation.
        if let Some(item) = cart
            .items
            .iter_mut()
            .find(|item| item.product_id == product_id)
        {
            let merged = item.quantity + quantity;
            self.inventory.check_available(product_id, merged).await?;
            item.quantity = merged;
        } else {
            self.inventory.check_available(product_id, quantity).await?;
            cart.items.push(CartItem {
                id: Uuid::new_v4(),
                product_id,
                name: product.name.clone(),
                quantity,
                price: product.price,
            });
        }

        self.persist(&mut cart).await?;
        tracing::info!(user_id = %user_id, product_id = %product_id, quantity, "Cart item added");
        Ok(cart)
    }

    pub async fn update_item(
        &self,
        user_id: Uuid,
        item_id: Uuid,
        quantity: i64,
    ) -> Result<Cart, AppError> {
        if quantity < 1 {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Quantity must be at least 1"
            )));
        }

        let mut cart = self
            .repository
            .get_cart_by_user(user_id)
            .await
            .map_err(AppError::DatabaseError)?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Cart not found")))?;

        let item = cart
            .items
            .iter_mut()
            .find(|item| item.id == item_id)
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Cart item not found")))?;

        self.inventory
            .check_available(item.product_id, quantity)
            .await?;
        item.quantity = quantity;

        self.persist(&mut cart).await?;
        Ok(cart)
    }

    pub async fn remove_item(&self, user_id: Uuid, item_id: Uuid) -> Result<Cart, AppError> {
        let mut cart = self
            .repository
            .get_cart_by_user(user_id)
            .await
            .map_err(AppError::DatabaseError)?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Cart not found")))?;

        let before = cart.items.len();
        cart.items.retain(|item| item.id != item_id);
        if cart.items.len() == before {
            return Err(AppError::NotFound(anyhow::anyhow!("Cart item not found")));
        }

        self.persist(&mut cart).await?;
        Ok(cart)
    }

    /// Empty the cart (post-checkout). The cart document survives.
    pub async fn clear(&self, user_id: Uuid) -> Result<(), AppError> {
        self.repository
            .clear_cart(user_id)
            .await
            .map_err(AppError::DatabaseError)?;
        Ok(())
    }

    async fn persist(&self, cart: &mut Cart) -> Result<(), AppError> {
        cart.total = recompute_total(&cart.items);
        cart.updated_at = DateTime::now();
        self.repository
            .upsert_cart(cart)
            .await
            .map_err(AppError::DatabaseError)?;
        Ok(())
    }

    fn empty_cart(user_id: Uuid) -> Cart {
        let now = DateTime::now();
        Cart {
            id: Uuid::new_v4(),
            user_id,
            items: Vec::new(),
            total: 0.0,
            created_at: now,
            updated_at: now,
        }
    }
}
