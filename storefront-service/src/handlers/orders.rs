//! Order endpoints: checkout, own-order reads, and the admin fulfillment
//! status update.

use crate::dtos::{PlaceOrderRequest, UpdateOrderStatusRequest};
use crate::middleware::{AdminUser, AuthUser};
use crate::models::Order;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use store_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

pub async fn place_order(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<Order>), AppError> {
    payload.validate()?;

    let order = state
        .checkout
        .place_order(
            user.user_id,
            payload.shipping_address.into(),
            payload.payment_method,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn list_own_orders(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<Order>>, AppError> {
    let orders = state
        .repository
        .list_orders_by_user(user.user_id)
        .await
        .map_err(AppError::DatabaseError)?;
    Ok(Json(orders))
}

pub async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    let order = state
        .repository
        .get_order(id)
        .await
        .map_err(AppError::DatabaseError)?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Order not found")))?;

    if order.user_id != user.user_id && !user.is_admin() {
        return Err(AppError::Forbidden(anyhow::anyhow!(
            "Order belongs to another user"
        )));
    }
    Ok(Json(order))
}

pub async fn list_all_orders(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Vec<Order>>, AppError> {
    let orders = state
        .repository
        .list_all_orders()
        .await
        .map_err(AppError::DatabaseError)?;
    Ok(Json(orders))
}

pub async fn update_order_status(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateOrderStatusRequest>,
) -> Result<Json<Order>, AppError> {
    let updated = state
        .repository
        .update_order_status(id, payload.status)
        .await
        .map_err(AppError::DatabaseError)?;
    if !updated {
        return Err(AppError::NotFound(anyhow::anyhow!("Order not found")));
    }

    let order = state
        .repository
        .get_order(id)
        .await
        .map_err(AppError::DatabaseError)?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Order not found")))?;
    Ok(Json(order))
}
