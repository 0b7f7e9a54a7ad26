//! Per-request authentication interceptor.
//!
//! Sequencing per request: extract bearer token → revocation check →
//! signature/expiry check → identity attached to request extensions.
//! A missing or non-bearer Authorization header is not a failure here;
//! the request passes through unauthenticated and routes that require an
//! identity reject it via [`RequireIdentity`]. Any failed check
//! short-circuits with the structured `AppError` response so an
//! authentication failure never surfaces as a generic server error.

use std::sync::Arc;

use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::{TimeZone, Utc};

use crate::auth::AuthenticatedIdentity;
use crate::errors::AppError;
use crate::AppState;

pub async fn authenticate(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let Some(token) = extract_bearer_token(req.headers()) else {
        // Anonymous pass-through; authorization is a downstream concern.
        return next.run(req).await;
    };

    let identity = match verify_bearer(&state, &token).await {
        Ok(identity) => identity,
        Err(e) => return e.into_response(),
    };

    tracing::debug!(sub = %identity.subject, "request authenticated");
    req.extensions_mut().insert(identity);
    next.run(req).await
}

async fn verify_bearer(state: &AppState, token: &str) -> Result<AuthenticatedIdentity, AppError> {
    if state.revocation.is_revoked(token).await? {
        return Err(AppError::TokenRevoked);
    }

    let now = Utc::now();
    let claims = state.codec.parse_and_verify(token, now)?;

    Ok(AuthenticatedIdentity {
        subject: claims.sub.clone(),
        role: claims.role.parse().unwrap_or(crate::models::user::Role::User),
        expires_at: Utc.timestamp_opt(claims.exp, 0).single(),
    })
}

/// `Authorization: Bearer <token>` or nothing. A malformed header is
/// treated the same as an absent one at this layer.
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let auth = headers.get("authorization")?.to_str().ok()?;
    let token = auth.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Extractor for routes that require an authenticated caller. Pulls the
/// identity the interceptor attached; absence means the request carried no
/// (valid) credential and maps to `AuthenticationFailure`.
pub struct RequireIdentity(pub AuthenticatedIdentity);

#[async_trait::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for RequireIdentity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedIdentity>()
            .cloned()
            .map(RequireIdentity)
            .ok_or(AppError::AuthenticationFailure)
    }
}
