//! Cart endpoints. The cart is always addressed through the authenticated
//! caller; no cart id ever crosses the API boundary.

use crate::dtos::{AddCartItemRequest, UpdateCartItemRequest};
use crate::middleware::AuthUser;
use crate::models::Cart;
use crate::AppState;
use axum::{
    extract::{Path, State},
    Json,
};
use store_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

pub async fn get_cart(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Cart>, AppError> {
    let cart = state.cart.get(user.user_id).await?;
    Ok(Json(cart))
}

pub async fn add_item(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<AddCartItemRequest>,
) -> Result<Json<Cart>, AppError> {
    payload.validate()?;
    let cart = state
        .cart
        .add_item(user.user_id, payload.product_id, payload.quantity)
        .await?;
    Ok(Json(cart))
}

pub async fn update_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(item_id): Path<Uuid>,
    Json(payload): Json<UpdateCartItemRequest>,
) -> Result<Json<Cart>, AppError> {
    payload.validate()?;
    let cart = state
        .cart
        .update_item(user.user_id, item_id, payload.quantity)
        .await?;
    Ok(Json(cart))
}

pub async fn remove_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(item_id): Path<Uuid>,
) -> Result<Json<Cart>, AppError> {
    let cart = state.cart.remove_item(user.user_id, item_id).await?;
    Ok(Json(cart))
}
