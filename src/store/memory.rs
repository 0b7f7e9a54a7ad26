use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use super::postgres::UserDirectory;
use super::KvStore;
use crate::models::user::User;

struct Entry {
    value: String,
    count: i64,
    expires_at: Instant,
}

impl Entry {
    fn expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// In-memory store with the same contract as [`RedisKv`].
///
/// Used by tests and by Redis-less local development. Per-key atomicity
/// comes from dashmap's entry locking. The `set_offline` switch makes every
/// operation fail, simulating a store outage.
///
/// [`RedisKv`]: super::redis::RedisKv
#[derive(Default)]
pub struct MemoryKv {
    entries: DashMap<String, Entry>,
    offline: AtomicBool,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the store becoming unreachable (or reachable again).
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> anyhow::Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            anyhow::bail!("store offline");
        }
        Ok(())
    }
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn incr_with_window(&self, key: &str, window_secs: i64) -> anyhow::Result<i64> {
        self.check_online()?;
        let now = Instant::now();
        let mut entry = self.entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: String::new(),
            count: 0,
            expires_at: now + Duration::from_secs(window_secs.max(0) as u64),
        });
        if entry.expired(now) {
            // A fresh window: the expired counter is gone as far as callers
            // can tell, so this increment re-creates it.
            entry.count = 0;
            entry.expires_at = now + Duration::from_secs(window_secs.max(0) as u64);
        }
        entry.count += 1;
        Ok(entry.count)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: i64) -> anyhow::Result<()> {
        self.check_online()?;
        self.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                count: 0,
                expires_at: Instant::now() + Duration::from_secs(ttl_secs.max(0) as u64),
            },
        );
        Ok(())
    }

    async fn exists(&self, key: &str) -> anyhow::Result<bool> {
        self.check_online()?;
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if !entry.expired(now) {
                return Ok(true);
            }
            drop(entry);
            self.entries.remove(key);
        }
        Ok(false)
    }

    async fn ttl(&self, key: &str) -> anyhow::Result<Option<i64>> {
        self.check_online()?;
        let now = Instant::now();
        Ok(self.entries.get(key).and_then(|entry| {
            if entry.expired(now) {
                None
            } else {
                // Round up so a live key never reports zero seconds left,
                // matching Redis's whole-second TTL semantics.
                let remaining = entry.expires_at.duration_since(now);
                let mut secs = remaining.as_secs() as i64;
                if remaining.subsec_nanos() > 0 {
                    secs += 1;
                }
                Some(secs)
            }
        }))
    }
}

impl MemoryKv {
    /// Stored value for `key`, ignoring expiry. Test hook.
    pub fn raw_value(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|e| e.value.clone())
    }
}

/// In-memory [`UserDirectory`] keyed by email. Test and dev double for
/// [`PgUserDirectory`].
///
/// [`PgUserDirectory`]: super::postgres::PgUserDirectory
#[derive(Default)]
pub struct MemoryUserDirectory {
    users: DashMap<String, User>,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, email: &str, username: &str, password_hash: &str) -> User {
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            role: "USER".to_string(),
            created_at: Utc::now(),
        };
        self.users.insert(email.to_string(), user.clone());
        user
    }

    pub fn remove(&self, email: &str) {
        self.users.remove(email);
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        Ok(self.users.get(email).map(|u| u.clone()))
    }

    async fn insert(
        &self,
        email: &str,
        username: &str,
        password_hash: &str,
    ) -> anyhow::Result<User> {
        if self.users.contains_key(email) {
            anyhow::bail!("duplicate email");
        }
        Ok(self.add(email, username, password_hash))
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> anyhow::Result<()> {
        for mut entry in self.users.iter_mut() {
            if entry.id == id {
                entry.password_hash = password_hash.to_string();
                return Ok(());
            }
        }
        anyhow::bail!("no such user")
    }
}
