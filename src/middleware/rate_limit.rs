//! Fixed-window rate limiter backed by the shared store.
//!
//! One atomic INCR+EXPIRE per call: the increment that creates the counter
//! opens the window and fixes its expiry; every later call in the window
//! bumps the same counter. Increment-then-check means the request that
//! crosses the ceiling is the one rejected, and it still counts toward the
//! window — slightly conservative, but there is no check-then-increment race
//! and no compensating decrement.
//!
//! Outage behavior defaults to fail-closed (`StoreUnavailable`, 503): an
//! unreachable store must not silently lift the quota. Configurable via
//! `AUTHGATE_RATE_LIMIT_OUTAGE_POLICY`.

use std::sync::Arc;

use crate::config::OutagePolicy;
use crate::errors::AppError;
use crate::store::KvStore;

const KEY_PREFIX: &str = "ratelimit:";

pub struct RateLimiter {
    store: Arc<dyn KvStore>,
    max_requests: i64,
    window_secs: i64,
    outage_policy: OutagePolicy,
}

impl RateLimiter {
    pub fn new(
        store: Arc<dyn KvStore>,
        max_requests: i64,
        window_secs: i64,
        outage_policy: OutagePolicy,
    ) -> Self {
        Self {
            store,
            max_requests,
            window_secs,
            outage_policy,
        }
    }

    /// Count this call against `caller_key`'s current window and reject it
    /// once the ceiling is exceeded.
    pub async fn check_and_increment(&self, caller_key: &str) -> Result<(), AppError> {
        let key = format!("{}{}", KEY_PREFIX, caller_key);

        let count = match self.store.incr_with_window(&key, self.window_secs).await {
            Ok(count) => count,
            Err(e) => {
                return match self.outage_policy {
                    OutagePolicy::FailClosed => {
                        tracing::warn!(
                            error = %e,
                            caller_key,
                            "rate limit check failed: store unreachable, rejecting"
                        );
                        Err(AppError::StoreUnavailable)
                    }
                    OutagePolicy::FailOpen => {
                        tracing::warn!(
                            error = %e,
                            caller_key,
                            "rate limit check failed: store unreachable, admitting uncounted"
                        );
                        Ok(())
                    }
                };
            }
        };

        if count > self.max_requests {
            // Tell the caller when the window rolls over; if the TTL cannot
            // be read, the full window length is the safe upper bound.
            let retry_after_secs = self
                .store
                .ttl(&key)
                .await
                .ok()
                .flatten()
                .unwrap_or(self.window_secs);
            tracing::debug!(caller_key, count, limit = self.max_requests, "rate limit exceeded");
            return Err(AppError::RateLimitExceeded { retry_after_secs });
        }

        Ok(())
    }
}
