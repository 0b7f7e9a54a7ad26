//! Authentication strategies.
//!
//! Login and logout/identity-resolution both funnel through one
//! [`AuthStrategy`] seam so they share failure semantics. The calling code
//! path picks the strategy explicitly — login uses the password strategy,
//! logout and identity resolution use the token strategy; nothing inspects
//! the credential payload to dispatch.

pub mod password;
pub mod token;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::AppError;
use crate::models::user::Role;

/// A credential as presented by a caller. Transient: lives for one
/// authentication call, is never persisted and never logged.
#[derive(Debug, Clone)]
pub enum Credential {
    Password { email: String, password: String },
    Bearer { token: String },
}

/// The outcome of a successful authentication. Created per-request,
/// handed to downstream code explicitly (request extension or return
/// value), discarded at end of request.
#[derive(Debug, Clone)]
pub struct AuthenticatedIdentity {
    pub subject: String,
    pub role: Role,
    /// Natural expiry of the presented token, when one was presented.
    /// Feeds the revocation TTL at logout; `None` for password logins.
    pub expires_at: Option<DateTime<Utc>>,
}

impl AuthenticatedIdentity {
    /// Seconds of token validity left at `now`; `None` without a token.
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> Option<i64> {
        self.expires_at.map(|exp| (exp - now).num_seconds())
    }
}

#[async_trait]
pub trait AuthStrategy: Send + Sync {
    /// Verify `credential`, resolving the subject against the user
    /// directory. The clock is injected so expiry decisions are testable.
    async fn authenticate(
        &self,
        credential: &Credential,
        now: DateTime<Utc>,
    ) -> Result<AuthenticatedIdentity, AppError>;
}
