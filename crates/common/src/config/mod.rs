//! Configuration management for ScholarFeed services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config.toml, config.yaml)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Redis configuration
    pub redis: RedisConfig,

    /// Queue configuration (SQS)
    pub queue: QueueConfig,

    /// Authentication configuration
    pub auth: AuthConfig,

    /// Hot score configuration
    #[serde(default)]
    pub scoring: ScoringConfig,

    /// Feed listing and cache configuration
    #[serde(default)]
    pub feed: FeedConfig,

    /// Batch refresher configuration
    #[serde(default)]
    pub refresher: RefresherConfig,

    /// Observability configuration
    pub observability: ObservabilityConfig,

    /// Rate limiting configuration
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Shutdown timeout in seconds
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,

    /// Maximum concurrent requests
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Primary database URL (for writes)
    pub url: String,

    /// Read replica URL (optional, falls back to primary)
    pub read_url: Option<String>,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Idle timeout in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RedisConfig {
    /// Redis URL
    pub url: String,

    /// Pool size
    #[serde(default = "default_redis_pool_size")]
    pub pool_size: u32,

    /// Default TTL in seconds
    #[serde(default = "default_redis_ttl")]
    pub default_ttl_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueueConfig {
    /// SQS rescore queue URL
    pub rescore_queue_url: Option<String>,

    /// Dead letter queue URL
    pub dlq_url: Option<String>,

    /// Maximum messages to receive per poll
    #[serde(default = "default_queue_batch_size")]
    pub batch_size: u32,

    /// Long polling timeout in seconds
    #[serde(default = "default_queue_poll_timeout")]
    pub poll_timeout_secs: u64,

    /// Visibility timeout in seconds
    #[serde(default = "default_visibility_timeout")]
    pub visibility_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    /// JWT secret for token validation
    pub jwt_secret: Option<String>,

    /// Request ID header name
    #[serde(default = "default_request_id_header")]
    pub request_id_header: String,
}

/// Per-signal weights for the v2 algorithm
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SignalWeights {
    #[serde(default = "default_weight_altmetric")]
    pub altmetric: f64,

    #[serde(default = "default_weight_bounty")]
    pub bounty: f64,

    #[serde(default = "default_weight_tip")]
    pub tip: f64,

    #[serde(default = "default_weight_peer_review")]
    pub peer_review: f64,

    #[serde(default = "default_weight_upvote")]
    pub upvote: f64,

    #[serde(default = "default_weight_comment")]
    pub comment: f64,
}

/// Polynomial time decay parameters
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TimeDecayConfig {
    /// Decay exponent
    #[serde(default = "default_gravity")]
    pub gravity: f64,

    /// Hours added to the age before exponentiation
    #[serde(default = "default_base_hours")]
    pub base_hours: f64,
}

/// One step of the freshness boost curve: items younger than
/// `max_age_hours` get at least `multiplier`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FreshnessStep {
    pub max_age_hours: f64,
    pub multiplier: f64,
}

/// Weights for the legacy v1 algorithm
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LegacyWeights {
    #[serde(default = "default_legacy_upvote")]
    pub upvote: f64,

    #[serde(default = "default_legacy_comment")]
    pub comment: f64,

    #[serde(default = "default_legacy_reply")]
    pub reply: f64,

    #[serde(default = "default_legacy_bounty")]
    pub bounty: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScoringConfig {
    /// v2 signal weights
    #[serde(default = "default_signal_weights")]
    pub weights: SignalWeights,

    /// Time decay parameters
    #[serde(default = "default_time_decay")]
    pub time_decay: TimeDecayConfig,

    /// Freshness boost steps, ordered by max_age_hours ascending;
    /// multipliers must be non-increasing
    #[serde(default = "default_freshness_curve")]
    pub freshness_curve: Vec<FreshnessStep>,

    /// Multiplier applied to the bounty component when urgent
    #[serde(default = "default_urgency_multiplier")]
    pub bounty_urgency_multiplier: f64,

    /// An open bounty expiring within this window counts as urgent
    #[serde(default = "default_urgency_window")]
    pub bounty_urgency_window_hours: f64,

    /// Grant/preregistration deadlines within this window make the
    /// item age as freshly created
    #[serde(default = "default_deadline_window")]
    pub deadline_window_hours: f64,

    /// Legacy v1 weights
    #[serde(default = "default_legacy_weights")]
    pub legacy: LegacyWeights,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FeedConfig {
    /// Default page size for feed listings
    #[serde(default = "default_page_size")]
    pub default_page_size: u64,

    /// Maximum allowed page size
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u64,

    /// Only pages 1..=max_cached_pages are cache-eligible
    #[serde(default = "default_max_cached_pages")]
    pub max_cached_pages: u64,

    /// Cached page TTL in seconds
    #[serde(default = "default_feed_cache_ttl")]
    pub cache_ttl_secs: u64,

    /// Health-check credential; a matching disable_cache query
    /// parameter forces a miss
    pub cache_bypass_token: Option<String>,

    /// Optional deployment-level key prefix (e.g. "v3")
    pub feed_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RefresherConfig {
    /// Entries per sweep batch (one bulk write per batch)
    #[serde(default = "default_refresh_batch_size")]
    pub batch_size: u64,

    /// Seconds between sweep starts
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Sweep lock TTL in seconds
    #[serde(default = "default_lock_ttl")]
    pub lock_ttl_secs: u64,

    /// Sweep lock name
    #[serde(default = "default_lock_name")]
    pub lock_name: String,

    /// Fan-out chunk size for bulk rescore events
    #[serde(default = "default_fanout_chunk_size")]
    pub fanout_chunk_size: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Requests per second
    #[serde(default = "default_rate_limit")]
    pub requests_per_second: u32,

    /// Burst capacity
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Enable rate limiting
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_request_timeout() -> u64 { 30 }
fn default_shutdown_timeout() -> u64 { 30 }
fn default_max_concurrent() -> usize { 100 }
fn default_max_connections() -> u32 { 50 }
fn default_min_connections() -> u32 { 5 }
fn default_connect_timeout() -> u64 { 10 }
fn default_idle_timeout() -> u64 { 300 }
fn default_redis_pool_size() -> u32 { 20 }
fn default_redis_ttl() -> u64 { 300 }
fn default_queue_batch_size() -> u32 { 10 }
fn default_queue_poll_timeout() -> u64 { 20 }
fn default_visibility_timeout() -> u64 { 300 }
fn default_request_id_header() -> String { "X-Request-ID".to_string() }
fn default_weight_altmetric() -> f64 { 0.25 }
fn default_weight_bounty() -> f64 { 5.0 }
fn default_weight_tip() -> f64 { 2.0 }
fn default_weight_peer_review() -> f64 { 3.0 }
fn default_weight_upvote() -> f64 { 1.0 }
fn default_weight_comment() -> f64 { 2.0 }
fn default_signal_weights() -> SignalWeights {
    SignalWeights {
        altmetric: default_weight_altmetric(),
        bounty: default_weight_bounty(),
        tip: default_weight_tip(),
        peer_review: default_weight_peer_review(),
        upvote: default_weight_upvote(),
        comment: default_weight_comment(),
    }
}
fn default_gravity() -> f64 { 1.8 }
fn default_base_hours() -> f64 { 2.0 }
fn default_time_decay() -> TimeDecayConfig {
    TimeDecayConfig {
        gravity: default_gravity(),
        base_hours: default_base_hours(),
    }
}
fn default_freshness_curve() -> Vec<FreshnessStep> {
    vec![
        FreshnessStep { max_age_hours: 24.0, multiplier: 4.5 },
        FreshnessStep { max_age_hours: 48.0, multiplier: 2.0 },
    ]
}
fn default_urgency_multiplier() -> f64 { 1.5 }
fn default_urgency_window() -> f64 { 24.0 }
fn default_deadline_window() -> f64 { 168.0 }
fn default_legacy_upvote() -> f64 { 10.0 }
fn default_legacy_comment() -> f64 { 5.0 }
fn default_legacy_reply() -> f64 { 3.0 }
fn default_legacy_bounty() -> f64 { 15.0 }
fn default_legacy_weights() -> LegacyWeights {
    LegacyWeights {
        upvote: default_legacy_upvote(),
        comment: default_legacy_comment(),
        reply: default_legacy_reply(),
        bounty: default_legacy_bounty(),
    }
}
fn default_page_size() -> u64 { 20 }
fn default_max_page_size() -> u64 { 100 }
fn default_max_cached_pages() -> u64 { 4 }
fn default_feed_cache_ttl() -> u64 { 600 }
fn default_refresh_batch_size() -> u64 { 1000 }
fn default_sweep_interval() -> u64 { 28_800 }
fn default_lock_ttl() -> u64 { 7200 }
fn default_lock_name() -> String { crate::HOT_SCORE_REFRESH_LOCK.to_string() }
fn default_fanout_chunk_size() -> usize { 100 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 9090 }
fn default_service_name() -> String { "scholarfeed".to_string() }
fn default_rate_limit() -> u32 { 50 }
fn default_burst() -> u32 { 100 }
fn default_enabled() -> bool { true }

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Start with defaults
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?

            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__SERVER__PORT=8081
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )

            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )
            .build()?;

        config.try_deserialize()
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }

    /// Get the read database URL (falls back to primary)
    pub fn read_database_url(&self) -> &str {
        self.database.read_url.as_deref().unwrap_or(&self.database.url)
    }

    /// Get feed cache TTL as Duration
    pub fn feed_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.feed.cache_ttl_secs)
    }

    /// Get sweep interval as Duration
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.refresher.sweep_interval_secs)
    }

    /// Get sweep lock TTL as Duration
    pub fn sweep_lock_ttl(&self) -> Duration {
        Duration::from_secs(self.refresher.lock_ttl_secs)
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: default_signal_weights(),
            time_decay: default_time_decay(),
            freshness_curve: default_freshness_curve(),
            bounty_urgency_multiplier: default_urgency_multiplier(),
            bounty_urgency_window_hours: default_urgency_window(),
            deadline_window_hours: default_deadline_window(),
            legacy: default_legacy_weights(),
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
            max_cached_pages: default_max_cached_pages(),
            cache_ttl_secs: default_feed_cache_ttl(),
            cache_bypass_token: None,
            feed_type: None,
        }
    }
}

impl Default for RefresherConfig {
    fn default() -> Self {
        Self {
            batch_size: default_refresh_batch_size(),
            sweep_interval_secs: default_sweep_interval(),
            lock_ttl_secs: default_lock_ttl(),
            lock_name: default_lock_name(),
            fanout_chunk_size: default_fanout_chunk_size(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: default_host(),
                port: default_port(),
                request_timeout_secs: default_request_timeout(),
                shutdown_timeout_secs: default_shutdown_timeout(),
                max_concurrent_requests: default_max_concurrent(),
            },
            database: DatabaseConfig {
                url: "postgres://localhost/scholarfeed".to_string(),
                read_url: None,
                max_connections: default_max_connections(),
                min_connections: default_min_connections(),
                connect_timeout_secs: default_connect_timeout(),
                idle_timeout_secs: default_idle_timeout(),
            },
            redis: RedisConfig {
                url: "redis://localhost:6379".to_string(),
                pool_size: default_redis_pool_size(),
                default_ttl_secs: default_redis_ttl(),
            },
            queue: QueueConfig {
                rescore_queue_url: None,
                dlq_url: None,
                batch_size: default_queue_batch_size(),
                poll_timeout_secs: default_queue_poll_timeout(),
                visibility_timeout_secs: default_visibility_timeout(),
            },
            auth: AuthConfig {
                jwt_secret: None,
                request_id_header: default_request_id_header(),
            },
            scoring: ScoringConfig::default(),
            feed: FeedConfig::default(),
            refresher: RefresherConfig::default(),
            observability: ObservabilityConfig {
                log_level: default_log_level(),
                json_logging: default_json_logging(),
                metrics_port: default_metrics_port(),
                service_name: default_service_name(),
            },
            rate_limit: RateLimitConfig {
                requests_per_second: default_rate_limit(),
                burst: default_burst(),
                enabled: default_enabled(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.feed.max_cached_pages, 4);
        assert_eq!(config.feed.cache_ttl_secs, 600);
        assert_eq!(config.refresher.batch_size, 1000);
        assert_eq!(config.refresher.lock_name, "feed:hot-score-refresh");
    }

    #[test]
    fn test_read_database_fallback() {
        let config = AppConfig::default();
        assert_eq!(config.read_database_url(), "postgres://localhost/scholarfeed");
    }

    #[test]
    fn test_freshness_curve_is_non_increasing() {
        let config = ScoringConfig::default();
        let mut last = f64::INFINITY;
        for step in &config.freshness_curve {
            assert!(step.multiplier <= last);
            last = step.multiplier;
        }
    }
}
