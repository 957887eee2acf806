//! Distributed locking
//!
//! Named non-blocking TTL locks behind the [`LockService`] trait. The redis
//! implementation uses SET NX PX with a per-acquisition token and a
//! compare-and-delete release, so a lock that expired mid-run is never
//! deleted out from under its next holder.

use crate::errors::{AppError, Result};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{Client, Script};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

const RELEASE_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

/// Non-blocking named TTL locks
#[async_trait]
pub trait LockService: Send + Sync {
    /// Try to take the named lock. `false` means another holder has it.
    async fn acquire(&self, name: &str, ttl: Duration) -> Result<bool>;

    /// Release the named lock if this service instance still holds it.
    async fn release(&self, name: &str) -> Result<()>;
}

/// Redis-backed lock service
pub struct RedisLockService {
    connection: RwLock<MultiplexedConnection>,
    release_script: Script,
    key_prefix: String,
    tokens: Mutex<HashMap<String, String>>,
}

impl RedisLockService {
    pub async fn new(url: &str, key_prefix: impl Into<String>) -> Result<Self> {
        let client = Client::open(url).map_err(|e| AppError::LockError {
            message: format!("Failed to create Redis client: {}", e),
        })?;

        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::LockError {
                message: format!("Failed to connect to Redis: {}", e),
            })?;

        Ok(Self {
            connection: RwLock::new(connection),
            release_script: Script::new(RELEASE_SCRIPT),
            key_prefix: key_prefix.into(),
            tokens: Mutex::new(HashMap::new()),
        })
    }

    fn key(&self, name: &str) -> String {
        format!("{}:lock:{}", self.key_prefix, name)
    }

    fn tokens(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.tokens
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl LockService for RedisLockService {
    async fn acquire(&self, name: &str, ttl: Duration) -> Result<bool> {
        let full_key = self.key(name);
        let token = Uuid::new_v4().to_string();
        let mut conn = self.connection.write().await;

        let set: Option<String> = redis::cmd("SET")
            .arg(&full_key)
            .arg(&token)
            .arg("NX")
            .arg("PX")
            .arg(ttl.as_millis() as u64)
            .query_async(&mut *conn)
            .await
            .map_err(|e| AppError::LockError {
                message: format!("Failed to acquire lock '{}': {}", name, e),
            })?;

        let acquired = set.is_some();
        if acquired {
            self.tokens().insert(name.to_string(), token);
        }

        debug!(lock = name, acquired, "Lock acquisition attempted");
        Ok(acquired)
    }

    async fn release(&self, name: &str) -> Result<()> {
        let Some(token) = self.tokens().remove(name) else {
            return Ok(());
        };

        let full_key = self.key(name);
        let mut conn = self.connection.write().await;

        let released: i32 = self
            .release_script
            .key(&full_key)
            .arg(&token)
            .invoke_async(&mut *conn)
            .await
            .map_err(|e| AppError::LockError {
                message: format!("Failed to release lock '{}': {}", name, e),
            })?;

        if released == 0 {
            debug!(lock = name, "Lock had already expired before release");
        }

        Ok(())
    }
}

/// In-memory lock service for tests and single-node deployments
#[derive(Default)]
pub struct InMemoryLockService {
    holders: Mutex<HashMap<String, Instant>>,
}

impl InMemoryLockService {
    pub fn new() -> Self {
        Self::default()
    }

    fn holders(&self) -> MutexGuard<'_, HashMap<String, Instant>> {
        self.holders
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl LockService for InMemoryLockService {
    async fn acquire(&self, name: &str, ttl: Duration) -> Result<bool> {
        let mut holders = self.holders();
        let now = Instant::now();

        match holders.get(name) {
            Some(deadline) if now < *deadline => Ok(false),
            _ => {
                holders.insert(name.to_string(), now + ttl);
                Ok(true)
            }
        }
    }

    async fn release(&self, name: &str) -> Result<()> {
        self.holders().remove(name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_contention() {
        let locks = InMemoryLockService::new();
        let ttl = Duration::from_secs(60);

        assert!(locks.acquire("sweep", ttl).await.expect("acquire"));
        assert!(!locks.acquire("sweep", ttl).await.expect("acquire"));

        // Other names are independent
        assert!(locks.acquire("other", ttl).await.expect("acquire"));

        locks.release("sweep").await.expect("release");
        assert!(locks.acquire("sweep", ttl).await.expect("acquire"));
    }

    #[tokio::test]
    async fn test_in_memory_expiry_frees_lock() {
        let locks = InMemoryLockService::new();

        assert!(locks.acquire("sweep", Duration::ZERO).await.expect("acquire"));
        assert!(locks.acquire("sweep", Duration::from_secs(60)).await.expect("acquire"));
    }

    #[tokio::test]
    async fn test_release_without_hold_is_noop() {
        let locks = InMemoryLockService::new();
        locks.release("never-held").await.expect("release");
    }
}
