//! Registration and login.

use crate::dtos::{AuthResponse, LoginRequest, RegisterRequest};
use crate::middleware::auth::issue_token;
use crate::models::{Role, User};
use crate::AppState;
use argon2::password_hash::{rand_core::OsRng, PasswordHash, SaltString};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use axum::{extract::State, http::StatusCode, Json};
use mongodb::bson::DateTime;
use store_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::InternalError(anyhow::anyhow!("Password hashing failed: {}", e)))
}

fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    payload.validate()?;

    if state
        .repository
        .get_user_by_email(&payload.email)
        .await
        .map_err(AppError::DatabaseError)?
        .is_some()
    {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Email is already registered"
        )));
    }

    let user = User {
        id: Uuid::new_v4(),
        name: payload.name.clone(),
        email: payload.email.clone(),
        password_hash: hash_password(&payload.password)?,
        role: Role::User,
        created_at: DateTime::now(),
    };

    state
        .repository
        .insert_user(user.clone())
        .await
        .map_err(AppError::DatabaseError)?;

    tracing::info!(user_id = %user.id, "User registered");

    // Fire-and-forget: a mail failure must never fail the registration.
    state.email.send_welcome_detached(&user.email, &user.name);

    let token = issue_token(&state.config.jwt, user.id, &user.email, user.role)?;
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user: user.into(),
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    payload.validate()?;

    let user = state
        .repository
        .get_user_by_email(&payload.email)
        .await
        .map_err(AppError::DatabaseError)?
        .ok_or_else(|| AppError::AuthError(anyhow::anyhow!("Invalid credentials")))?;

    if !verify_password(&payload.password, &user.password_hash) {
        return Err(AppError::AuthError(anyhow::anyhow!("Invalid credentials")));
    }

    let token = issue_token(&state.config.jwt, user.id, &user.email, user.role)?;
    Ok(Json(AuthResponse {
        token,
        user: user.into(),
    }))
}
