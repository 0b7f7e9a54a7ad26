pub mod memory;
pub mod postgres;
pub mod redis;

use async_trait::async_trait;

/// Abstraction over the shared ephemeral store.
///
/// All mutable cross-request state (revocation markers, rate windows) lives
/// behind this contract so that any number of stateless service instances
/// observe the same state. Nothing is ever mirrored in-process. Correctness
/// is delegated to the backend's atomicity: `incr_with_window` must be atomic
/// per key, and `set_ex`/`exists`/`ttl` must be single operations.
///
/// Any error from these methods means "store unreachable"; callers resolve
/// that immediately through their configured [`OutagePolicy`] — no retries.
///
/// [`OutagePolicy`]: crate::config::OutagePolicy
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Atomically increment the counter at `key`, setting its expiry to
    /// `window_secs` when the increment created the counter. Returns the
    /// post-increment count.
    async fn incr_with_window(&self, key: &str, window_secs: i64) -> anyhow::Result<i64>;

    /// Set `key` to `value` with a TTL of `ttl_secs`.
    async fn set_ex(&self, key: &str, value: &str, ttl_secs: i64) -> anyhow::Result<()>;

    /// Whether `key` currently exists.
    async fn exists(&self, key: &str) -> anyhow::Result<bool>;

    /// Remaining TTL of `key` in seconds. `None` when the key is absent or
    /// has no expiry.
    async fn ttl(&self, key: &str) -> anyhow::Result<Option<i64>>;
}
