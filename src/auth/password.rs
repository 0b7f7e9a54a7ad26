use std::sync::Arc;

use argon2::{
    password_hash::{PasswordHasher, SaltString},
    Argon2, PasswordHash, PasswordVerifier,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{AuthStrategy, AuthenticatedIdentity, Credential};
use crate::errors::AppError;
use crate::store::postgres::UserDirectory;

/// Hash a password with Argon2id for storage in the user directory.
pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(rand::thread_rng());
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("failed to hash password: {}", e))?;
    Ok(hash.to_string())
}

/// Verify a password against a stored hash. Argon2 verification is
/// constant-time with respect to the candidate password.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Email + password verification against the user directory.
///
/// A missing user and a wrong password produce the same failure; callers
/// never learn which half of the credential was wrong.
pub struct PasswordStrategy {
    users: Arc<dyn UserDirectory>,
}

impl PasswordStrategy {
    pub fn new(users: Arc<dyn UserDirectory>) -> Self {
        Self { users }
    }
}

#[async_trait]
impl AuthStrategy for PasswordStrategy {
    async fn authenticate(
        &self,
        credential: &Credential,
        _now: DateTime<Utc>,
    ) -> Result<AuthenticatedIdentity, AppError> {
        let Credential::Password { email, password } = credential else {
            return Err(AppError::Internal(anyhow::anyhow!(
                "password strategy requires a password credential"
            )));
        };

        let user = self
            .users
            .find_by_email(email)
            .await
            .map_err(AppError::Internal)?
            .ok_or(AppError::AuthenticationFailure)?;

        if !verify_password(password, &user.password_hash) {
            return Err(AppError::AuthenticationFailure);
        }

        Ok(AuthenticatedIdentity {
            subject: user.email.clone(),
            role: user.role(),
            expires_at: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryUserDirectory;

    fn password_cred(email: &str, password: &str) -> Credential {
        Credential::Password {
            email: email.into(),
            password: password.into(),
        }
    }

    #[test]
    fn hash_and_verify_round_trip() {
        let hash = hash_password("hunter2!").unwrap();
        assert!(verify_password("hunter2!", &hash));
        assert!(!verify_password("hunter3!", &hash));
        assert!(!verify_password("hunter2!", "not-a-phc-hash"));
    }

    #[tokio::test]
    async fn valid_credentials_yield_identity() {
        let users = Arc::new(MemoryUserDirectory::new());
        users.add("alice@example.com", "alice", &hash_password("s3cret!").unwrap());

        let strategy = PasswordStrategy::new(users);
        let identity = strategy
            .authenticate(&password_cred("alice@example.com", "s3cret!"), Utc::now())
            .await
            .unwrap();

        assert_eq!(identity.subject, "alice@example.com");
        assert!(identity.expires_at.is_none());
    }

    #[tokio::test]
    async fn missing_user_and_wrong_password_are_indistinguishable() {
        let users = Arc::new(MemoryUserDirectory::new());
        users.add("alice@example.com", "alice", &hash_password("s3cret!").unwrap());
        let strategy = PasswordStrategy::new(users);

        let wrong_password = strategy
            .authenticate(&password_cred("alice@example.com", "wrong"), Utc::now())
            .await
            .unwrap_err();
        let no_such_user = strategy
            .authenticate(&password_cred("nobody@example.com", "s3cret!"), Utc::now())
            .await
            .unwrap_err();

        assert_eq!(wrong_password.to_string(), no_such_user.to_string());
        assert!(matches!(wrong_password, AppError::AuthenticationFailure));
        assert!(matches!(no_such_user, AppError::AuthenticationFailure));
    }

    #[tokio::test]
    async fn bearer_credential_is_a_caller_bug() {
        let users = Arc::new(MemoryUserDirectory::new());
        let strategy = PasswordStrategy::new(users);
        let err = strategy
            .authenticate(
                &Credential::Bearer { token: "t".into() },
                Utc::now(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }
}
