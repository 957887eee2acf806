//! ScholarFeed Common Library
//!
//! Shared code for the ScholarFeed services including:
//! - Database models and repository patterns
//! - Hot score computation (signals, v1/v2 algorithms, breakdown)
//! - Error types and handling
//! - Configuration management
//! - Cache and lock abstractions
//! - Rescore queue plumbing
//! - Metrics and observability

pub mod auth;
pub mod cache;
pub mod config;
pub mod db;
pub mod errors;
pub mod lock;
pub mod metrics;
pub mod queue;
pub mod scoring;

// Re-export commonly used types
pub use config::AppConfig;
pub use db::Repository;
pub use errors::{AppError, Result};
pub use lock::LockService;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name of the refresher sweep lock
pub const HOT_SCORE_REFRESH_LOCK: &str = "feed:hot-score-refresh";
