//! Symmetric bearer-token codec.
//!
//! Issues and verifies HS256 JWTs carrying `{sub, role, iat, exp}`. The
//! codec is pure: the clock is always a parameter, never read internally,
//! so issuance and verification are deterministic and directly testable.
//! Expiry is checked here against the injected clock rather than by the
//! JWT library, with a named leeway for clock skew (default 0).

use base64::Engine;
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::user::Role;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject — the user's stable identifier (email).
    pub sub: String,
    /// Role claim, e.g. "USER" or "ADMIN".
    pub role: String,
    /// Issued at (unix seconds).
    pub iat: i64,
    /// Expiry (unix seconds).
    pub exp: i64,
}

impl Claims {
    /// Seconds of validity left at `now`. Negative once expired.
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> i64 {
        self.exp - now.timestamp()
    }
}

pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    leeway_secs: i64,
}

impl TokenCodec {
    /// Build a codec from a base64-encoded symmetric secret.
    pub fn new(secret_b64: &str, leeway_secs: i64) -> anyhow::Result<Self> {
        let key_bytes = base64::engine::general_purpose::STANDARD
            .decode(secret_b64.trim())
            .map_err(|e| anyhow::anyhow!("signing secret is not valid base64: {}", e))?;
        if key_bytes.len() < 32 {
            anyhow::bail!(
                "signing secret must decode to at least 32 bytes, got {}",
                key_bytes.len()
            );
        }
        Ok(Self {
            encoding: EncodingKey::from_secret(&key_bytes),
            decoding: DecodingKey::from_secret(&key_bytes),
            leeway_secs,
        })
    }

    /// Sign a token for `subject` with `iat = now` and `exp = now + ttl`.
    pub fn issue(
        &self,
        subject: &str,
        role: Role,
        now: DateTime<Utc>,
        ttl_secs: i64,
    ) -> anyhow::Result<String> {
        let claims = Claims {
            sub: subject.to_string(),
            role: role.as_str().to_string(),
            iat: now.timestamp(),
            exp: now.timestamp() + ttl_secs,
        };
        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        Ok(token)
    }

    /// Verify signature and structure, then check expiry against the
    /// injected `now`. Any failure collapses to `TokenInvalid`; callers must
    /// not learn whether the signature or the expiry was at fault.
    pub fn parse_and_verify(&self, raw: &str, now: DateTime<Utc>) -> Result<Claims, AppError> {
        // Expiry is validated manually below so the clock stays injectable.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        let data = jsonwebtoken::decode::<Claims>(raw, &self.decoding, &validation)
            .map_err(|_| AppError::TokenInvalid)?;

        if now.timestamp() >= data.claims.exp + self.leeway_secs {
            return Err(AppError::TokenInvalid);
        }

        Ok(data.claims)
    }
}
