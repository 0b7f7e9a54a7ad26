pub mod handlers;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::middleware::auth;
use crate::AppState;

/// Assemble the auth surface. Every route runs behind the authentication
/// interceptor; routes that need an identity enforce it via the
/// `RequireIdentity` extractor.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/auth/register", post(handlers::register))
        .route("/api/auth/login", post(handlers::login))
        .route("/api/auth/logout", post(handlers::logout))
        .route("/api/auth/reset-password", post(handlers::reset_password))
        .route("/api/users/me", get(handlers::me))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth::authenticate,
        ))
        .with_state(state)
}
