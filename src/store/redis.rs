use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use super::KvStore;

/// Redis-backed shared store.
///
/// Every call is bounded by `timeout`; a timeout is indistinguishable from an
/// unreachable store, which is exactly how callers treat it.
#[derive(Clone)]
pub struct RedisKv {
    conn: ConnectionManager,
    timeout: Duration,
}

impl RedisKv {
    pub fn new(conn: ConnectionManager, timeout: Duration) -> Self {
        Self { conn, timeout }
    }

    pub async fn connect(redis_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self::new(conn, timeout))
    }

    async fn bounded<T>(
        &self,
        fut: impl std::future::Future<Output = redis::RedisResult<T>>,
    ) -> anyhow::Result<T> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(res) => Ok(res?),
            Err(_) => anyhow::bail!("redis call timed out after {:?}", self.timeout),
        }
    }
}

#[async_trait]
impl KvStore for RedisKv {
    async fn incr_with_window(&self, key: &str, window_secs: i64) -> anyhow::Result<i64> {
        let mut conn = self.conn.clone();
        // Atomic INCR + EXPIRE. Only the increment that creates the counter
        // establishes the window; later callers inherit it.
        let script = redis::Script::new(
            r#"
            local current = redis.call("INCR", KEYS[1])
            if current == 1 then
                redis.call("EXPIRE", KEYS[1], ARGV[1])
            end
            return current
        "#,
        );
        self.bounded(script.key(key).arg(window_secs).invoke_async(&mut conn))
            .await
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: i64) -> anyhow::Result<()> {
        let mut conn = self.conn.clone();
        self.bounded(conn.set_ex::<_, _, ()>(key, value, ttl_secs.max(1) as u64))
            .await
    }

    async fn exists(&self, key: &str) -> anyhow::Result<bool> {
        let mut conn = self.conn.clone();
        self.bounded(conn.exists(key)).await
    }

    async fn ttl(&self, key: &str) -> anyhow::Result<Option<i64>> {
        let mut conn = self.conn.clone();
        let ttl: i64 = self.bounded(conn.ttl(key)).await?;
        // Redis returns -2 for a missing key and -1 for a key without expiry.
        Ok(if ttl >= 0 { Some(ttl) } else { None })
    }
}
