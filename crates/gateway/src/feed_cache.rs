//! Read-through page cache for feed list responses
//!
//! Cached payloads are the serialized response bodies, so a hit returns
//! exactly the bytes the miss produced. Only the first few pages are
//! eligible; everything else always recomputes.

use scholarfeed_common::cache::{keys, CacheStore};
use scholarfeed_common::config::FeedConfig;
use scholarfeed_common::db::FeedQueryArgs;
use scholarfeed_common::errors::Result;
use scholarfeed_common::metrics;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Cache disposition of one feed request, exposed as the SF-Cache header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Miss,
    Hit,
    MissAuth,
    HitAuth,
}

impl CacheStatus {
    fn of(hit: bool, authenticated: bool) -> Self {
        match (hit, authenticated) {
            (false, false) => CacheStatus::Miss,
            (true, false) => CacheStatus::Hit,
            (false, true) => CacheStatus::MissAuth,
            (true, true) => CacheStatus::HitAuth,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Miss => "miss",
            CacheStatus::Hit => "hit",
            CacheStatus::MissAuth => "miss (auth)",
            CacheStatus::HitAuth => "hit (auth)",
        }
    }
}

/// Page cache manager shared across request handlers
#[derive(Clone)]
pub struct FeedCache {
    store: Arc<dyn CacheStore>,
    max_cached_pages: u64,
    ttl: Duration,
    bypass_token: Option<String>,
    feed_type: Option<String>,
}

impl FeedCache {
    pub fn new(store: Arc<dyn CacheStore>, config: &FeedConfig) -> Self {
        Self {
            store,
            max_cached_pages: config.max_cached_pages,
            ttl: Duration::from_secs(config.cache_ttl_secs),
            bypass_token: config.cache_bypass_token.clone(),
            feed_type: config.feed_type.clone(),
        }
    }

    /// Ping the cache backend
    pub async fn ping(&self) -> Result<()> {
        self.store.ping().await
    }

    /// A matching bypass token or a page past the cap skips the cache entirely
    fn eligible(&self, args: &FeedQueryArgs, bypass: Option<&str>) -> bool {
        if args.page > self.max_cached_pages {
            return false;
        }
        match (bypass, &self.bypass_token) {
            (Some(given), Some(expected)) if given == expected => false,
            _ => true,
        }
    }

    /// Serve one feed request through the cache.
    ///
    /// Eligible requests read the cache first and write the computed body on
    /// a miss; ineligible requests run `compute` without touching the cache.
    /// A failing backend is logged and treated as a miss, never surfaced.
    pub async fn get_or_compute<F, Fut>(
        &self,
        args: &FeedQueryArgs,
        feed_type: Option<&str>,
        bypass: Option<&str>,
        compute: F,
    ) -> Result<(String, CacheStatus)>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String>>,
    {
        let authenticated = args.viewer.is_some();

        if !self.eligible(args, bypass) {
            let body = compute().await?;
            return Ok((body, CacheStatus::of(false, authenticated)));
        }

        let prefix = feed_type.or(self.feed_type.as_deref());
        let key = keys::feed_page(args, prefix);

        match self.store.get(&key).await {
            Ok(Some(body)) => {
                metrics::record_cache(true, "feed");
                return Ok((body, CacheStatus::of(true, authenticated)));
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, key = %key, "Cache read failed; serving uncached"),
        }
        metrics::record_cache(false, "feed");

        let body = compute().await?;
        if let Err(e) = self.store.set(&key, &body, self.ttl).await {
            warn!(error = %e, key = %key, "Cache write failed");
        }

        Ok((body, CacheStatus::of(false, authenticated)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scholarfeed_common::cache::InMemoryCache;
    use scholarfeed_common::db::FeedView;

    fn cache_with(config: FeedConfig) -> FeedCache {
        FeedCache::new(Arc::new(InMemoryCache::new()), &config)
    }

    #[test]
    fn test_status_rendering() {
        assert_eq!(CacheStatus::Miss.as_str(), "miss");
        assert_eq!(CacheStatus::Hit.as_str(), "hit");
        assert_eq!(CacheStatus::MissAuth.as_str(), "miss (auth)");
        assert_eq!(CacheStatus::HitAuth.as_str(), "hit (auth)");
    }

    #[tokio::test]
    async fn test_miss_then_hit_is_byte_identical() {
        let cache = cache_with(FeedConfig::default());
        let args = FeedQueryArgs::default();

        let (body, status) = cache
            .get_or_compute(&args, None, None, || async {
                Ok(r#"{"count":1}"#.to_string())
            })
            .await
            .unwrap();
        assert_eq!(status, CacheStatus::Miss);
        assert_eq!(body, r#"{"count":1}"#);

        // The second compute result must never be observed
        let (body, status) = cache
            .get_or_compute(&args, None, None, || async {
                Ok(r#"{"count":2}"#.to_string())
            })
            .await
            .unwrap();
        assert_eq!(status, CacheStatus::Hit);
        assert_eq!(body, r#"{"count":1}"#);
    }

    #[tokio::test]
    async fn test_page_past_cap_never_cached() {
        let cache = cache_with(FeedConfig::default());
        let args = FeedQueryArgs {
            page: 5,
            ..FeedQueryArgs::default()
        };

        for expected in ["a", "b"] {
            let (body, status) = cache
                .get_or_compute(&args, None, None, || async { Ok(expected.to_string()) })
                .await
                .unwrap();
            assert_eq!(status, CacheStatus::Miss);
            assert_eq!(body, expected);
        }
    }

    #[tokio::test]
    async fn test_bypass_token_forces_miss() {
        let cache = cache_with(FeedConfig {
            cache_bypass_token: Some("letmein".to_string()),
            ..FeedConfig::default()
        });
        let args = FeedQueryArgs::default();

        for expected in ["a", "b"] {
            let (body, status) = cache
                .get_or_compute(&args, None, Some("letmein"), || async {
                    Ok(expected.to_string())
                })
                .await
                .unwrap();
            assert_eq!(status, CacheStatus::Miss);
            assert_eq!(body, expected);
        }
    }

    #[tokio::test]
    async fn test_wrong_bypass_token_caches_normally() {
        let cache = cache_with(FeedConfig {
            cache_bypass_token: Some("letmein".to_string()),
            ..FeedConfig::default()
        });
        let args = FeedQueryArgs::default();

        let (_, status) = cache
            .get_or_compute(&args, None, Some("wrong"), || async { Ok("a".to_string()) })
            .await
            .unwrap();
        assert_eq!(status, CacheStatus::Miss);

        let (body, status) = cache
            .get_or_compute(&args, None, Some("wrong"), || async { Ok("b".to_string()) })
            .await
            .unwrap();
        assert_eq!(status, CacheStatus::Hit);
        assert_eq!(body, "a");
    }

    #[tokio::test]
    async fn test_authenticated_statuses() {
        let cache = cache_with(FeedConfig::default());
        let args = FeedQueryArgs {
            view: FeedView::Following,
            viewer: Some(7),
            ..FeedQueryArgs::default()
        };

        let (_, status) = cache
            .get_or_compute(&args, None, None, || async { Ok("a".to_string()) })
            .await
            .unwrap();
        assert_eq!(status, CacheStatus::MissAuth);

        let (_, status) = cache
            .get_or_compute(&args, None, None, || async { Ok("b".to_string()) })
            .await
            .unwrap();
        assert_eq!(status, CacheStatus::HitAuth);
    }
}
