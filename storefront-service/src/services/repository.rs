use crate::models::{Cart, Order, OrderStatus, PaymentStatus, Product, User};
use anyhow::Result;
use futures::TryStreamExt;
use mongodb::options::{FindOptions, IndexOptions, ReplaceOptions};
use mongodb::{
    bson::{doc, to_bson, Bson, DateTime},
    Collection, Database, IndexModel,
};
use uuid::Uuid;

/// Mongo-backed store for the storefront.
///
/// Every mutation that guards an invariant — stock never negative, an order
/// paid at most once — is a single conditional update whose filter encodes
/// the precondition. There are no read-modify-write pairs across round trips.
#[derive(Clone)]
pub struct StoreRepository {
    users: Collection<User>,
    products: Collection<Product>,
    carts: Collection<Cart>,
    orders: Collection<Order>,
}

impl StoreRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            users: db.collection("users"),
            products: db.collection("products"),
            carts: db.collection("carts"),
            orders: db.collection("orders"),
        }
    }

    /// Initialize database indexes.
    pub async fn init_indexes(&self) -> Result<()> {
        let unique_email = IndexModel::builder()
            .keys(doc! { "email": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("unique_user_email_idx".to_string())
                    .build(),
            )
            .build();
        self.users.create_indexes([unique_email], None).await?;

        // One cart per user, enforced by the storage layer.
        let unique_cart_owner = IndexModel::builder()
            .keys(doc! { "user_id": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("unique_cart_owner_idx".to_string())
                    .build(),
            )
            .build();
        self.carts.create_indexes([unique_cart_owner], None).await?;

        let active_products = IndexModel::builder()
            .keys(doc! { "is_active": 1, "created_at": -1 })
            .options(
                IndexOptions::builder()
                    .name("active_products_idx".to_string())
                    .build(),
            )
            .build();
        self.products.create_indexes([active_products], None).await?;

        // Reconciliation signals address orders by gateway correlation ids.
        let gateway_order = IndexModel::builder()
            .keys(doc! { "gateway_order_id": 1 })
            .options(
                IndexOptions::builder()
                    .sparse(true)
                    .name("gateway_order_idx".to_string())
                    .build(),
            )
            .build();
        let gateway_payment = IndexModel::builder()
            .keys(doc! { "gateway_payment_id": 1 })
            .options(
                IndexOptions::builder()
                    .sparse(true)
                    .name("gateway_payment_idx".to_string())
                    .build(),
            )
            .build();
        let user_orders = IndexModel::builder()
            .keys(doc! { "user_id": 1, "created_at": -1 })
            .options(
                IndexOptions::builder()
                    .name("user_orders_idx".to_string())
                    .build(),
            )
            .build();
        self.orders
            .create_indexes([gateway_order, gateway_payment, user_orders], None)
            .await?;

        tracing::info!("Storefront indexes initialized");
        Ok(())
    }

    // ---- users ----

    pub async fn insert_user(&self, user: User) -> Result<()> {
        self.users.insert_one(user, None).await?;
        Ok(())
    }

    pub async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        let user = self
            .users
            .find_one(doc! { "_id": id.to_string() }, None)
            .await?;
        Ok(user)
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = self.users.find_one(doc! { "email": email }, None).await?;
        Ok(user)
    }

    pub async fn list_users(&self) -> Result<Vec<User>> {
        let options = FindOptions::builder()
            .sort(doc! { "created_at": -1 })
            .build();
        let cursor = self.users.find(None, options).await?;
        Ok(cursor.try_collect().await?)
    }

    pub async fn delete_user(&self, id: Uuid) -> Result<bool> {
        let result = self
            .users
            .delete_one(doc! { "_id": id.to_string() }, None)
            .await?;
        Ok(result.deleted_count == 1)
    }

    // ---- products ----

    pub async fn insert_product(&self, product: Product) -> Result<()> {
        self.products.insert_one(product, None).await?;
        Ok(())
    }

    pub async fn get_product(&self, id: Uuid) -> Result<Option<Product>> {
        let product = self
            .products
            .find_one(doc! { "_id": id.to_string() }, None)
            .await?;
        Ok(product)
    }

    /// Active products, newest first. Deactivated products are excluded from
    /// listings but stay loadable by id for historic orders.
    pub async fn list_active_products(&self) -> Result<Vec<Product>> {
        let options = FindOptions::builder()
            .sort(doc! { "created_at": -1 })
            .build();
        let cursor = self
            .products
            .find(doc! { "is_active": true }, options)
            .await?;
        Ok(cursor.try_collect().await?)
    }

    pub async fn update_product_fields(
        &self,
        id: Uuid,
        set: mongodb::bson::Document,
    ) -> Result<Option<Product>> {
        let mut set = set;
        set.insert("updated_at", DateTime::now());
        let options = mongodb::options::FindOneAndUpdateOptions::builder()
            .return_document(mongodb::options::ReturnDocument::After)
            .build();
        let product = self
            .products
            .find_one_and_update(doc! { "_id": id.to_string() }, doc! { "$set": set }, options)
            .await?;
        Ok(product)
    }

    /// Soft delete: flips `is_active` off and leaves the record in place.
    pub async fn deactivate_product(&self, id: Uuid) -> Result<Option<Product>> {
        self.update_product_fields(id, doc! { "is_active": false })
            .await
    }

    /// Atomic decrement-if-sufficient. Succeeds only while the current stock
    /// covers `quantity`; concurrent reservations can never drive stock
    /// negative because the precondition and the decrement are one storage
    /// operation.
    pub async fn reserve_stock(&self, id: Uuid, quantity: i64) -> Result<bool> {
        let result = self
            .products
            .update_one(
                doc! { "_id": id.to_string(), "stock": { "$gte": quantity } },
                doc! {
                    "$inc": { "stock": -quantity },
                    "$set": { "updated_at": DateTime::now() },
                },
                None,
            )
            .await?;
        Ok(result.modified_count == 1)
    }

    /// Compensating increment for `reserve_stock`.
    pub async fn release_stock(&self, id: Uuid, quantity: i64) -> Result<bool> {
        let result = self
            .products
            .update_one(
                doc! { "_id": id.to_string() },
                doc! {
                    "$inc": { "stock": quantity },
                    "$set": { "updated_at": DateTime::now() },
                },
                None,
            )
            .await?;
        Ok(result.modified_count == 1)
    }

    // ---- carts ----

    pub async fn get_cart_by_user(&self, user_id: Uuid) -> Result<Option<Cart>> {
        let cart = self
            .carts
            .find_one(doc! { "user_id": user_id.to_string() }, None)
            .await?;
        Ok(cart)
    }

    /// Persist the full cart document, creating it on first mutation. The
    /// unique `user_id` index keeps this one-cart-per-user.
    pub async fn upsert_cart(&self, cart: &Cart) -> Result<()> {
        let options = ReplaceOptions::builder().upsert(true).build();
        self.carts
            .replace_one(
                doc! { "user_id": cart.user_id.to_string() },
                cart,
                options,
            )
            .await?;
        Ok(())
    }

    pub async fn clear_cart(&self, user_id: Uuid) -> Result<()> {
        self.carts
            .update_one(
                doc! { "user_id": user_id.to_string() },
                doc! { "$set": {
                    "items": Bson::Array(Vec::new()),
                    "total": 0.0,
                    "updated_at": DateTime::now(),
                } },
                None,
            )
            .await?;
        Ok(())
    }

    // ---- orders ----

    pub async fn insert_order(&self, order: Order) -> Result<()> {
        self.orders.insert_one(order, None).await?;
        Ok(())
    }

    pub async fn get_order(&self, id: Uuid) -> Result<Option<Order>> {
        let order = self
            .orders
            .find_one(doc! { "_id": id.to_string() }, None)
            .await?;
        Ok(order)
    }

    pub async fn get_order_by_gateway_order_id(&self, gateway_order_id: &str) -> Result<Option<Order>> {
        let order = self
            .orders
            .find_one(doc! { "gateway_order_id": gateway_order_id }, None)
            .await?;
        Ok(order)
    }

    pub async fn get_order_by_gateway_payment_id(
        &self,
        gateway_payment_id: &str,
    ) -> Result<Option<Order>> {
        let order = self
            .orders
            .find_one(doc! { "gateway_payment_id": gateway_payment_id }, None)
            .await?;
        Ok(order)
    }

    pub async fn list_orders_by_user(&self, user_id: Uuid) -> Result<Vec<Order>> {
        let options = FindOptions::builder()
            .sort(doc! { "created_at": -1 })
            .build();
        let cursor = self
            .orders
            .find(doc! { "user_id": user_id.to_string() }, options)
            .await?;
        Ok(cursor.try_collect().await?)
    }

    pub async fn list_all_orders(&self) -> Result<Vec<Order>> {
        let options = FindOptions::builder()
            .sort(doc! { "created_at": -1 })
            .build();
        let cursor = self.orders.find(None, options).await?;
        Ok(cursor.try_collect().await?)
    }

    /// Compensation when order placement fails mid-reservation: the pending
    /// order is removed rather than left dangling.
    pub async fn delete_order(&self, id: Uuid) -> Result<bool> {
        let result = self
            .orders
            .delete_one(doc! { "_id": id.to_string() }, None)
            .await?;
        Ok(result.deleted_count == 1)
    }

    pub async fn update_order_status(&self, id: Uuid, status: OrderStatus) -> Result<bool> {
        let result = self
            .orders
            .update_one(
                doc! { "_id": id.to_string() },
                doc! { "$set": {
                    "status": to_bson(&status)?,
                    "updated_at": DateTime::now(),
                } },
                None,
            )
            .await?;
        // `matched`, not `modified`: setting an order to its current status
        // is a no-op, not a missing order.
        Ok(result.matched_count == 1)
    }

    /// Record the gateway session an order was handed to.
    pub async fn set_gateway_order_id(&self, id: Uuid, gateway_order_id: &str) -> Result<()> {
        self.orders
            .update_one(
                doc! { "_id": id.to_string() },
                doc! { "$set": {
                    "gateway_order_id": gateway_order_id,
                    "updated_at": DateTime::now(),
                } },
                None,
            )
            .await?;
        Ok(())
    }

    /// The idempotence guard: flip the order into `completed`/paid only if it
    /// is not already paid and not refunded. The returned boolean reports
    /// whether *this* call won the transition; the stock-reserve and
    /// cart-clear side effects run exactly when it did.
    pub async fn claim_order_completion(
        &self,
        id: Uuid,
        gateway_order_id: Option<&str>,
        gateway_payment_id: Option<&str>,
        gateway_signature: Option<&str>,
    ) -> Result<bool> {
        let mut set = doc! {
            "is_paid": true,
            "paid_at": DateTime::now(),
            "payment_status": to_bson(&PaymentStatus::Completed)?,
            "status": to_bson(&OrderStatus::Processing)?,
            "updated_at": DateTime::now(),
        };
        if let Some(goid) = gateway_order_id {
            set.insert("gateway_order_id", goid);
        }
        if let Some(gpid) = gateway_payment_id {
            set.insert("gateway_payment_id", gpid);
        }
        if let Some(sig) = gateway_signature {
            set.insert("gateway_signature", sig);
        }

        let result = self
            .orders
            .update_one(
                doc! {
                    "_id": id.to_string(),
                    "is_paid": false,
                    "payment_status": { "$ne": to_bson(&PaymentStatus::Refunded)? },
                },
                doc! { "$set": set },
                None,
            )
            .await?;
        Ok(result.modified_count == 1)
    }

    /// Cosmetic refresh of gateway correlation fields on an already-paid
    /// order (duplicate completion signal). Never touches payment state.
    pub async fn refresh_gateway_fields(
        &self,
        id: Uuid,
        gateway_payment_id: Option<&str>,
        gateway_signature: Option<&str>,
    ) -> Result<()> {
        let mut set = doc! { "updated_at": DateTime::now() };
        if let Some(gpid) = gateway_payment_id {
            set.insert("gateway_payment_id", gpid);
        }
        if let Some(sig) = gateway_signature {
            set.insert("gateway_signature", sig);
        }
        self.orders
            .update_one(doc! { "_id": id.to_string() }, doc! { "$set": set }, None)
            .await?;
        Ok(())
    }

    /// Mark a payment failed. Guarded so a stale failure signal can never
    /// un-pay a completed order or resurrect a refunded one; gateway retries
    /// may still complete a failed order later through
    /// `claim_order_completion`.
    pub async fn set_payment_failed(&self, id: Uuid, gateway_payment_id: Option<&str>) -> Result<bool> {
        let mut set = doc! {
            "payment_status": to_bson(&PaymentStatus::Failed)?,
            "updated_at": DateTime::now(),
        };
        if let Some(gpid) = gateway_payment_id {
            set.insert("gateway_payment_id", gpid);
        }
        let result = self
            .orders
            .update_one(
                doc! {
                    "_id": id.to_string(),
                    "is_paid": false,
                    "payment_status": { "$ne": to_bson(&PaymentStatus::Refunded)? },
                },
                doc! { "$set": set },
                None,
            )
            .await?;
        Ok(result.modified_count == 1)
    }

    /// Mark a payment refunded (terminal). Clears `is_paid` to keep the
    /// `is_paid == true ⇔ payment_status == completed` invariant.
    pub async fn set_payment_refunded(&self, id: Uuid, gateway_payment_id: Option<&str>) -> Result<bool> {
        let mut set = doc! {
            "payment_status": to_bson(&PaymentStatus::Refunded)?,
            "is_paid": false,
            "updated_at": DateTime::now(),
        };
        if let Some(gpid) = gateway_payment_id {
            set.insert("gateway_payment_id", gpid);
        }
        let result = self
            .orders
            .update_one(doc! { "_id": id.to_string() }, doc! { "$set": set }, None)
            .await?;
        Ok(result.modified_count == 1)
    }

    /// Reset payment state to pending (gateway reports no payment yet).
    pub async fn set_payment_pending(&self, id: Uuid) -> Result<bool> {
        let result = self
            .orders
            .update_one(
                doc! {
                    "_id": id.to_string(),
                    "is_paid": false,
                    "payment_status": { "$ne": to_bson(&PaymentStatus::Refunded)? },
                },
                doc! { "$set": {
                    "payment_status": to_bson(&PaymentStatus::Pending)?,
                    "updated_at": DateTime::now(),
                } },
                None,
            )
            .await?;
        Ok(result.modified_count == 1)
    }
}
