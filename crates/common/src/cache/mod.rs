//! Cache backends for feed responses
//!
//! Provides:
//! - The `CacheStore` trait (string payloads, per-write TTL)
//! - Redis implementation over a multiplexed connection
//! - In-memory implementation for tests and single-node deployments
//! - Cache key builder helpers

use crate::errors::{AppError, Result};
use async_trait::async_trait;
use redis::{aio::MultiplexedConnection, AsyncCommands, Client};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

/// Pluggable cache backend.
///
/// Payloads are the already-serialized response bodies, so a hit returns
/// byte-identical content to the write that stored it.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<bool>;

    async fn exists(&self, key: &str) -> Result<bool>;

    async fn ping(&self) -> Result<()>;
}

/// Redis cache backend
pub struct RedisCache {
    connection: RwLock<MultiplexedConnection>,
    key_prefix: String,
}

impl RedisCache {
    /// Connect to redis and wrap the connection
    pub async fn new(url: &str, key_prefix: impl Into<String>) -> Result<Self> {
        let client = Client::open(url).map_err(|e| AppError::CacheError {
            message: format!("Failed to create Redis client: {}", e),
        })?;

        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::CacheError {
                message: format!("Failed to connect to Redis: {}", e),
            })?;

        Ok(Self {
            connection: RwLock::new(connection),
            key_prefix: key_prefix.into(),
        })
    }

    /// Build a prefixed key
    fn key(&self, key: &str) -> String {
        format!("{}:{}", self.key_prefix, key)
    }
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let full_key = self.key(key);
        let mut conn = self.connection.write().await;

        let value: Option<String> =
            conn.get(&full_key)
                .await
                .map_err(|e| AppError::CacheError {
                    message: format!("Failed to get key '{}': {}", full_key, e),
                })?;

        debug!(key = %full_key, hit = value.is_some(), "Cache read");
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let full_key = self.key(key);
        let mut conn = self.connection.write().await;

        let _: () = conn
            .set_ex(&full_key, value, ttl.as_secs())
            .await
            .map_err(|e| AppError::CacheError {
                message: format!("Failed to set key '{}': {}", full_key, e),
            })?;

        debug!(key = %full_key, ttl_secs = ttl.as_secs(), "Cache set");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let full_key = self.key(key);
        let mut conn = self.connection.write().await;

        let deleted: i32 = conn
            .del(&full_key)
            .await
            .map_err(|e| AppError::CacheError {
                message: format!("Failed to delete key '{}': {}", full_key, e),
            })?;

        Ok(deleted > 0)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let full_key = self.key(key);
        let mut conn = self.connection.write().await;

        let exists: bool = conn
            .exists(&full_key)
            .await
            .map_err(|e| AppError::CacheError {
                message: format!("Failed to check key '{}': {}", full_key, e),
            })?;

        Ok(exists)
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.connection.write().await;
        redis::cmd("PING")
            .query_async::<String>(&mut *conn)
            .await
            .map_err(|e| AppError::CacheError {
                message: format!("Redis ping failed: {}", e),
            })?;
        Ok(())
    }
}

/// In-memory cache backend with per-key expiry
#[derive(Default)]
pub struct InMemoryCache {
    entries: Mutex<HashMap<String, (String, Instant)>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, (String, Instant)>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl CacheStore for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut entries = self.entries();

        match entries.get(key) {
            Some((value, deadline)) if Instant::now() < *deadline => Ok(Some(value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        self.entries()
            .insert(key.to_string(), (value.to_string(), Instant::now() + ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.entries().remove(key).is_some())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

/// Cache key builder helpers
pub mod keys {
    use crate::db::{FeedOrdering, FeedQueryArgs};

    /// Build the cache key for one feed page.
    ///
    /// Shape:
    /// `[<feed_type>_]feed:<view>:<hub|all>:<source|all>:<user_part>:<page>-<page_size>[-<status>][-<ordering>]`
    ///
    /// `user_part` is the literal `none` for viewer-independent views and
    /// otherwise the viewer's id or `anonymous`. The status suffix appears
    /// only when the fundraise filter is set; the ordering suffix only for
    /// non-default orderings.
    pub fn feed_page(args: &FeedQueryArgs, feed_type: Option<&str>) -> String {
        let feed_type_part = feed_type
            .map(|t| format!("{}_", t))
            .unwrap_or_default();

        let hub_part = args.hub_slug.as_deref().unwrap_or("all");
        let source_part = args.source.as_deref().unwrap_or("all");

        let user_part = if args.view.is_viewer_scoped() {
            match args.viewer {
                Some(id) => id.to_string(),
                None => "anonymous".to_string(),
            }
        } else {
            "none".to_string()
        };

        let status_part = args
            .fundraise_status
            .as_ref()
            .map(|s| format!("-{}", s))
            .unwrap_or_default();

        let ordering_part = if args.ordering == FeedOrdering::Latest {
            String::new()
        } else {
            format!("-{}", args.ordering.as_str())
        };

        format!(
            "{}feed:{}:{}:{}:{}:{}-{}{}{}",
            feed_type_part,
            args.view.as_str(),
            hub_part,
            source_part,
            user_part,
            args.page,
            args.page_size,
            status_part,
            ordering_part,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{FeedOrdering, FeedQueryArgs, FeedView};

    fn base_args() -> FeedQueryArgs {
        FeedQueryArgs::default()
    }

    #[test]
    fn test_feed_key_shape() {
        assert_eq!(keys::feed_page(&base_args(), None), "feed:latest:all:all:none:1-20");

        let full = FeedQueryArgs {
            view: FeedView::Following,
            ordering: FeedOrdering::HotScoreV2,
            hub_slug: Some("neuroscience".to_string()),
            source: Some("researchhub".to_string()),
            fundraise_status: Some("OPEN".to_string()),
            viewer: Some(7),
            page: 2,
            page_size: 40,
        };
        assert_eq!(
            keys::feed_page(&full, Some("funding")),
            "funding_feed:following:neuroscience:researchhub:7:2-40-OPEN-hot_score_v2"
        );
    }

    #[test]
    fn test_feed_key_user_part() {
        // Viewer identity never leaks into viewer-independent views
        let mut args = base_args();
        args.viewer = Some(42);
        assert_eq!(keys::feed_page(&args, None), "feed:latest:all:all:none:1-20");

        args.view = FeedView::Following;
        assert_eq!(keys::feed_page(&args, None), "feed:following:all:all:42:1-20");

        args.viewer = None;
        assert_eq!(keys::feed_page(&args, None), "feed:following:all:all:anonymous:1-20");
    }

    #[test]
    fn test_feed_key_varies_per_dimension() {
        let base = keys::feed_page(&base_args(), None);

        let variations = [
            FeedQueryArgs { view: FeedView::Popular, ..base_args() },
            FeedQueryArgs { ordering: FeedOrdering::HotScore, ..base_args() },
            FeedQueryArgs { hub_slug: Some("biology".to_string()), ..base_args() },
            FeedQueryArgs { source: Some("researchhub".to_string()), ..base_args() },
            FeedQueryArgs { fundraise_status: Some("OPEN".to_string()), ..base_args() },
            FeedQueryArgs { page: 2, ..base_args() },
            FeedQueryArgs { page_size: 40, ..base_args() },
        ];

        for varied in &variations {
            assert_ne!(keys::feed_page(varied, None), base, "{:?}", varied);
        }

        assert_ne!(keys::feed_page(&base_args(), Some("funding")), base);

        // Same arguments always derive the same key
        assert_eq!(keys::feed_page(&base_args(), None), base);
    }

    #[tokio::test]
    async fn test_in_memory_round_trip() {
        let cache = InMemoryCache::new();

        assert_eq!(cache.get("a").await.expect("get"), None);

        cache.set("a", "payload", Duration::from_secs(60)).await.expect("set");
        assert_eq!(cache.get("a").await.expect("get"), Some("payload".to_string()));
        assert!(cache.exists("a").await.expect("exists"));

        assert!(cache.delete("a").await.expect("delete"));
        assert!(!cache.delete("a").await.expect("delete"));
        assert_eq!(cache.get("a").await.expect("get"), None);
    }

    #[tokio::test]
    async fn test_in_memory_expiry() {
        let cache = InMemoryCache::new();

        cache.set("a", "payload", Duration::ZERO).await.expect("set");
        assert_eq!(cache.get("a").await.expect("get"), None);
        assert!(!cache.exists("a").await.expect("exists"));
    }
}
