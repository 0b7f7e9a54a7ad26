use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::auth::{AuthStrategy, Credential};
use crate::errors::AppError;
use crate::middleware::auth::{extract_bearer_token, RequireIdentity};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub name: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct PasswordResetRequest {
    pub email: String,
    pub password: String,
}

fn envelope(status: StatusCode, message: &str, data: serde_json::Value) -> Response {
    (status, Json(json!({ "message": message, "data": data }))).into_response()
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<Response, AppError> {
    if state
        .users
        .find_by_email(&req.email)
        .await
        .map_err(AppError::Internal)?
        .is_some()
    {
        tracing::warn!(email = %req.email, "registration attempt with taken email");
        return Err(AppError::EmailTaken);
    }

    let hash = crate::auth::password::hash_password(&req.password).map_err(AppError::Internal)?;
    let user = state
        .users
        .insert(&req.email, &req.name, &hash)
        .await
        .map_err(AppError::Internal)?;

    let token = state
        .codec
        .issue(&user.email, user.role(), Utc::now(), state.config.token_ttl_secs)
        .map_err(AppError::Internal)?;

    Ok(envelope(
        StatusCode::CREATED,
        "User registered successfully",
        json!({ "token": token, "user": { "email": user.email, "name": user.username } }),
    ))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Response, AppError> {
    state
        .limiter
        .check_and_increment(&format!("login:{}", req.email))
        .await?;

    let credential = Credential::Password {
        email: req.email,
        password: req.password,
    };
    let identity = state
        .password_strategy
        .authenticate(&credential, Utc::now())
        .await?;

    let token = state
        .codec
        .issue(&identity.subject, identity.role, Utc::now(), state.config.token_ttl_secs)
        .map_err(AppError::Internal)?;

    tracing::info!(sub = %identity.subject, "login succeeded");
    Ok(envelope(
        StatusCode::OK,
        "Login successful",
        json!({ "token": token, "user": { "email": identity.subject } }),
    ))
}

/// Logout verifies the presented token through the token strategy, then
/// records it as revoked for exactly its remaining lifetime.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let token = extract_bearer_token(&headers).ok_or(AppError::AuthenticationFailure)?;
    let now = Utc::now();

    let credential = Credential::Bearer {
        token: token.clone(),
    };
    let identity = state.token_strategy.authenticate(&credential, now).await?;

    // The verified identity already carries the token's expiry; no second
    // parse is needed to size the revocation record.
    if let Some(expires_at) = identity.expires_at {
        state.revocation.revoke(&token, expires_at, now).await?;
    }

    tracing::info!(sub = %identity.subject, "logout succeeded");
    Ok(envelope(
        StatusCode::OK,
        "User logged out successfully",
        json!({ "email": identity.subject }),
    ))
}

pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PasswordResetRequest>,
) -> Result<Response, AppError> {
    state
        .limiter
        .check_and_increment(&format!("password_reset:{}", req.email))
        .await?;

    let user = state
        .users
        .find_by_email(&req.email)
        .await
        .map_err(AppError::Internal)?
        .ok_or(AppError::EmailNotFound)?;

    let hash = crate::auth::password::hash_password(&req.password).map_err(AppError::Internal)?;
    state
        .users
        .update_password(user.id, &hash)
        .await
        .map_err(AppError::Internal)?;

    tracing::info!(email = %user.email, "password reset");
    Ok(envelope(
        StatusCode::OK,
        "Password reset successfully",
        json!({ "user": { "email": user.email, "name": user.username } }),
    ))
}

pub async fn me(RequireIdentity(identity): RequireIdentity) -> Response {
    envelope(
        StatusCode::OK,
        "OK",
        json!({ "email": identity.subject, "role": identity.role.as_str() }),
    )
}
