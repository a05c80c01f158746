//! Catalog endpoints. Listing shows active products only; admin mutations
//! include the soft delete that keeps records referenceable by old orders.

use crate::dtos::{CreateProductRequest, UpdateProductRequest};
use crate::middleware::AdminUser;
use crate::models::Product;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use mongodb::bson::{doc, DateTime};
use store_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

pub async fn list_products(State(state): State<AppState>) -> Result<Json<Vec<Product>>, AppError> {
    let products = state
        .repository
        .list_active_products()
        .await
        .map_err(AppError::DatabaseError)?;
    Ok(Json(products))
}

pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Product>, AppError> {
    let product = state
        .repository
        .get_product(id)
        .await
        .map_err(AppError::DatabaseError)?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Product not found")))?;
    Ok(Json(product))
}

pub async fn create_product(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(payload): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<Product>), AppError> {
    payload.validate()?;

    let now = DateTime::now();
    let product = Product {
        id: Uuid::new_v4(),
        name: payload.name,
        description: payload.description,
        price: payload.price,
        stock: payload.stock,
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    state
        .repository
        .insert_product(product.clone())
        .await
        .map_err(AppError::DatabaseError)?;

    tracing::info!(product_id = %product.id, "Product created");
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn update_product(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProductRequest>,
) -> Result<Json<Product>, AppError> {
    payload.validate()?;

    let mut set = doc! {};
    if let Some(name) = payload.name {
        set.insert("name", name);
    }
    if let Some(description) = payload.description {
        set.insert("description", description);
    }
    if let Some(price) = payload.price {
        set.insert("price", price);
    }
    if let Some(stock) = payload.stock {
        set.insert("stock", stock);
    }
    if let Some(is_active) = payload.is_active {
        set.insert("is_active", is_active);
    }
    if set.is_empty() {
        return Err(AppError::BadRequest(anyhow::anyhow!("Nothing to update")));
    }

    let product = state
        .repository
        .update_product_fields(id, set)
        .await
        .map_err(AppError::DatabaseError)?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Product not found")))?;
    Ok(Json(product))
}

/// Soft delete: deactivate, never remove.
pub async fn delete_product(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Product>, AppError> {
    let product = state
        .repository
        .deactivate_product(id)
        .await
        .map_err(AppError::DatabaseError)?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Product not found")))?;

    tracing::info!(product_id = %id, "Product deactivated");
    Ok(Json(product))
}
