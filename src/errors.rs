use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    /// Bad credentials or missing subject. The message is deliberately
    /// uniform so callers cannot tell which half of the credential was wrong.
    #[error("invalid email or password")]
    AuthenticationFailure,

    #[error("invalid or expired token")]
    TokenInvalid,

    #[error("token has been invalidated")]
    TokenRevoked,

    #[error("rate limit exceeded, try again in {retry_after_secs} seconds")]
    RateLimitExceeded { retry_after_secs: i64 },

    /// The shared store is unreachable and the configured outage policy
    /// for this check is fail-closed.
    #[error("shared store unavailable")]
    StoreUnavailable,

    #[error("email is already taken")]
    EmailTaken,

    #[error("email not found")]
    EmailNotFound,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, code, msg) = match &self {
            AppError::AuthenticationFailure => (
                StatusCode::BAD_REQUEST,
                "authentication_error",
                "authentication_failure",
                "invalid email or password".to_string(),
            ),
            AppError::TokenInvalid => (
                StatusCode::UNAUTHORIZED,
                "authentication_error",
                "token_invalid",
                "invalid or expired token".to_string(),
            ),
            AppError::TokenRevoked => (
                StatusCode::UNAUTHORIZED,
                "authentication_error",
                "token_revoked",
                "token has been invalidated".to_string(),
            ),
            AppError::RateLimitExceeded { retry_after_secs } => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limit_error",
                "rate_limit_exceeded",
                format!(
                    "Rate limit exceeded. Try again in {} seconds.",
                    retry_after_secs
                ),
            ),
            AppError::StoreUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "store_error",
                "store_unavailable",
                "service temporarily unavailable".to_string(),
            ),
            AppError::EmailTaken => (
                StatusCode::CONFLICT,
                "invalid_request_error",
                "email_taken",
                "email is already taken".to_string(),
            ),
            AppError::EmailNotFound => (
                StatusCode::NOT_FOUND,
                "invalid_request_error",
                "email_not_found",
                "email not found".to_string(),
            ),
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal_server_error",
                    "internal server error".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal_server_error",
                    "internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "message": msg,
                "type": error_type,
                "code": code,
            }
        }));

        let mut response = (status, body).into_response();

        // Add Retry-After header for rate limit errors
        if let AppError::RateLimitExceeded { retry_after_secs } = self {
            if let Ok(v) = axum::http::HeaderValue::from_str(&retry_after_secs.to_string()) {
                response.headers_mut().insert("retry-after", v);
            }
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_response_carries_retry_after_header() {
        let resp = AppError::RateLimitExceeded { retry_after_secs: 7 }.into_response();
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(resp.headers().get("retry-after").unwrap(), "7");
    }

    #[test]
    fn auth_failure_message_is_uniform() {
        // Missing user and wrong password must be indistinguishable.
        assert_eq!(
            AppError::AuthenticationFailure.to_string(),
            "invalid email or password"
        );
    }

    #[test]
    fn revoked_and_invalid_are_distinguishable() {
        assert_ne!(
            AppError::TokenRevoked.to_string(),
            AppError::TokenInvalid.to_string()
        );
    }
}
