//! Server-side token revocation ("blacklist").
//!
//! Tokens are stateless, so invalidating one before its natural expiry means
//! recording it out-of-band in the shared store. Each marker's TTL equals
//! the token's remaining life at revocation time — a marker never outlives
//! the token it revokes, which bounds the store's footprint.
//!
//! Outage behavior is an explicit policy. The default is fail-open on both
//! paths: logout still succeeds when Redis is down, and a store outage does
//! not lock out all authenticated traffic. The cost is that a revoked token
//! is accepted for the duration of the outage; this availability tradeoff is
//! deliberate and configurable (`AUTHGATE_REVOCATION_OUTAGE_POLICY`).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::config::OutagePolicy;
use crate::errors::AppError;
use crate::store::KvStore;

const KEY_PREFIX: &str = "revocation:";

pub struct RevocationRegistry {
    store: Arc<dyn KvStore>,
    outage_policy: OutagePolicy,
}

impl RevocationRegistry {
    pub fn new(store: Arc<dyn KvStore>, outage_policy: OutagePolicy) -> Self {
        Self {
            store,
            outage_policy,
        }
    }

    /// Record `token` as revoked for exactly its remaining validity, i.e.
    /// until `expires_at`. A token past its expiry needs no record and the
    /// call is a no-op.
    pub async fn revoke(
        &self,
        token: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let ttl = (expires_at - now).num_seconds();
        if ttl <= 0 {
            tracing::debug!("token already expired, skipping revocation record");
            return Ok(());
        }

        let key = revocation_key(token);
        match self.store.set_ex(&key, "revoked", ttl).await {
            Ok(()) => {
                tracing::info!(ttl_secs = ttl, "token revoked");
                Ok(())
            }
            Err(e) => match self.outage_policy {
                OutagePolicy::FailOpen => {
                    tracing::warn!(
                        error = %e,
                        "failed to record revocation: store unreachable, continuing without it"
                    );
                    Ok(())
                }
                OutagePolicy::FailClosed => Err(AppError::StoreUnavailable),
            },
        }
    }

    /// Whether a revocation marker exists for `token`.
    pub async fn is_revoked(&self, token: &str) -> Result<bool, AppError> {
        let key = revocation_key(token);
        match self.store.exists(&key).await {
            Ok(revoked) => Ok(revoked),
            Err(e) => match self.outage_policy {
                OutagePolicy::FailOpen => {
                    tracing::warn!(
                        error = %e,
                        "revocation check failed: store unreachable, treating token as not revoked"
                    );
                    Ok(false)
                }
                OutagePolicy::FailClosed => Err(AppError::StoreUnavailable),
            },
        }
    }
}

/// Markers are keyed by a SHA-256 fingerprint of the raw token, not the
/// token itself: bounded key size, and the store never holds a usable token.
fn revocation_key(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{}{}", KEY_PREFIX, hex::encode(hasher.finalize()))
}
