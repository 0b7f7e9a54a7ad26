use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use super::{AuthStrategy, AuthenticatedIdentity, Credential};
use crate::errors::AppError;
use crate::revocation::RevocationRegistry;
use crate::store::postgres::UserDirectory;
use crate::token::TokenCodec;

/// Bearer-token verification: revocation check, then signature/expiry,
/// then subject resolution against the user directory. The directory
/// lookup catches tokens issued to users who have since been deleted.
pub struct TokenStrategy {
    users: Arc<dyn UserDirectory>,
    codec: Arc<TokenCodec>,
    revocation: Arc<RevocationRegistry>,
}

impl TokenStrategy {
    pub fn new(
        users: Arc<dyn UserDirectory>,
        codec: Arc<TokenCodec>,
        revocation: Arc<RevocationRegistry>,
    ) -> Self {
        Self {
            users,
            codec,
            revocation,
        }
    }
}

#[async_trait]
impl AuthStrategy for TokenStrategy {
    async fn authenticate(
        &self,
        credential: &Credential,
        now: DateTime<Utc>,
    ) -> Result<AuthenticatedIdentity, AppError> {
        let Credential::Bearer { token } = credential else {
            return Err(AppError::Internal(anyhow::anyhow!(
                "token strategy requires a bearer credential"
            )));
        };

        // Revocation first: a revoked token is rejected even though it
        // would still verify cryptographically.
        if self.revocation.is_revoked(token).await? {
            return Err(AppError::TokenRevoked);
        }

        let claims = self.codec.parse_and_verify(token, now)?;

        let user = self
            .users
            .find_by_email(&claims.sub)
            .await
            .map_err(AppError::Internal)?
            .ok_or(AppError::AuthenticationFailure)?;

        Ok(AuthenticatedIdentity {
            subject: user.email.clone(),
            role: user.role(),
            expires_at: Utc.timestamp_opt(claims.exp, 0).single(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutagePolicy;
    use crate::models::user::Role;
    use crate::store::memory::{MemoryKv, MemoryUserDirectory};
    use crate::token::Claims;

    const SECRET: &str = "dGVzdC1zZWNyZXQtbXVzdC1iZS0zMi1ieXRlcy1sb25nISE=";

    struct Fixture {
        strategy: TokenStrategy,
        codec: Arc<TokenCodec>,
        revocation: Arc<RevocationRegistry>,
    }

    fn fixture() -> Fixture {
        let users = Arc::new(MemoryUserDirectory::new());
        users.add("alice@example.com", "alice", "unused-hash");
        fixture_with_users(users)
    }

    fn fixture_with_users(users: Arc<MemoryUserDirectory>) -> Fixture {
        let kv = Arc::new(MemoryKv::new());
        let codec = Arc::new(TokenCodec::new(SECRET, 0).unwrap());
        let revocation = Arc::new(RevocationRegistry::new(kv, OutagePolicy::FailOpen));
        let strategy = TokenStrategy::new(users, codec.clone(), revocation.clone());
        Fixture {
            strategy,
            codec,
            revocation,
        }
    }

    fn at(ts: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(ts, 0).unwrap()
    }

    fn bearer(token: &str) -> Credential {
        Credential::Bearer {
            token: token.into(),
        }
    }

    #[tokio::test]
    async fn valid_token_resolves_identity() {
        let f = fixture();
        let token = f
            .codec
            .issue("alice@example.com", Role::User, at(1_700_000_000), 600)
            .unwrap();

        let identity = f
            .strategy
            .authenticate(&bearer(&token), at(1_700_000_100))
            .await
            .unwrap();
        assert_eq!(identity.subject, "alice@example.com");
        assert_eq!(identity.expires_at, Some(at(1_700_000_600)));
        assert_eq!(identity.remaining_secs(at(1_700_000_100)), Some(500));
    }

    #[tokio::test]
    async fn revoked_token_fails_even_though_it_still_verifies() {
        let f = fixture();
        let now = at(1_700_000_000);
        let token = f.codec.issue("alice@example.com", Role::User, now, 600).unwrap();

        f.revocation.revoke(&token, at(1_700_000_600), now).await.unwrap();

        // The codec alone still accepts it; the strategy must not.
        assert!(f.codec.parse_and_verify(&token, at(1_700_000_100)).is_ok());
        assert!(matches!(
            f.strategy.authenticate(&bearer(&token), at(1_700_000_100)).await,
            Err(AppError::TokenRevoked)
        ));
    }

    #[tokio::test]
    async fn expired_token_is_invalid() {
        let f = fixture();
        let token = f
            .codec
            .issue("alice@example.com", Role::User, at(1_700_000_000), 600)
            .unwrap();
        assert!(matches!(
            f.strategy.authenticate(&bearer(&token), at(1_700_000_600)).await,
            Err(AppError::TokenInvalid)
        ));
    }

    #[tokio::test]
    async fn token_for_a_deleted_user_fails() {
        let users = Arc::new(MemoryUserDirectory::new());
        let f = fixture_with_users(users);
        let token = f
            .codec
            .issue("ghost@example.com", Role::User, at(1_700_000_000), 600)
            .unwrap();
        assert!(matches!(
            f.strategy.authenticate(&bearer(&token), at(1_700_000_100)).await,
            Err(AppError::AuthenticationFailure)
        ));
    }

    #[tokio::test]
    async fn claims_struct_exposes_expiry() {
        let claims = Claims {
            sub: "x".into(),
            role: "USER".into(),
            iat: 0,
            exp: 100,
        };
        assert_eq!(claims.remaining_secs(at(40)), 60);
    }
}
