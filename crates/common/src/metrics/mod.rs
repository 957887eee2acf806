//! Metrics and observability utilities
//!
//! Provides Prometheus metrics with SLO-aligned histograms
//! and standardized naming conventions.

use metrics::{
    counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit,
};
use std::time::Instant;

/// Metrics prefix for all ScholarFeed metrics
pub const METRICS_PREFIX: &str = "scholarfeed";

/// SLO-aligned histogram buckets for request latency (in seconds)
/// Targets: P50 < 50ms, P99 < 150ms
pub const LATENCY_BUCKETS: &[f64] = &[
    0.001,  // 1ms
    0.005,  // 5ms
    0.010,  // 10ms
    0.025,  // 25ms
    0.050,  // 50ms - P50 target
    0.075,  // 75ms
    0.100,  // 100ms
    0.150,  // 150ms - P99 target
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
    10.00,  // 10s
];

/// Histogram buckets for sweep durations (in seconds)
pub const SWEEP_BUCKETS: &[f64] = &[
    1.0,    // 1s
    5.0,    // 5s
    15.0,   // 15s
    30.0,   // 30s
    60.0,   // 1m
    120.0,  // 2m
    300.0,  // 5m
    600.0,  // 10m
    1800.0, // 30m
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Request metrics
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    // Feed metrics
    describe_counter!(
        format!("{}_feed_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total feed listings served"
    );

    describe_histogram!(
        format!("{}_feed_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Feed listing latency in seconds"
    );

    // Rescore metrics
    describe_counter!(
        format!("{}_rescore_events_total", METRICS_PREFIX),
        Unit::Count,
        "Total rescore events processed"
    );

    describe_counter!(
        format!("{}_rescore_entries_updated_total", METRICS_PREFIX),
        Unit::Count,
        "Total feed entries updated by rescore events"
    );

    describe_histogram!(
        format!("{}_rescore_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Rescore event processing latency in seconds"
    );

    // Sweep metrics
    describe_counter!(
        format!("{}_sweep_runs_total", METRICS_PREFIX),
        Unit::Count,
        "Total batch refresh sweeps attempted"
    );

    describe_histogram!(
        format!("{}_sweep_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Batch refresh sweep duration in seconds"
    );

    describe_gauge!(
        format!("{}_sweep_entries_processed", METRICS_PREFIX),
        Unit::Count,
        "Entries processed in the last completed sweep"
    );

    // Database metrics
    describe_gauge!(
        format!("{}_db_connections_active", METRICS_PREFIX),
        Unit::Count,
        "Active database connections"
    );

    describe_histogram!(
        format!("{}_db_query_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Database query latency in seconds"
    );

    // Queue metrics
    describe_gauge!(
        format!("{}_queue_depth", METRICS_PREFIX),
        Unit::Count,
        "Number of messages in queue"
    );

    describe_counter!(
        format!("{}_queue_messages_processed_total", METRICS_PREFIX),
        Unit::Count,
        "Total queue messages processed"
    );

    // Cache metrics
    describe_counter!(
        format!("{}_cache_hits_total", METRICS_PREFIX),
        Unit::Count,
        "Total cache hits"
    );

    describe_counter!(
        format!("{}_cache_misses_total", METRICS_PREFIX),
        Unit::Count,
        "Total cache misses"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// Helper to record feed listing metrics
pub fn record_feed(duration_secs: f64, view: &str, cache_status: &str) {
    counter!(
        format!("{}_feed_requests_total", METRICS_PREFIX),
        "view" => view.to_string(),
        "cache" => cache_status.to_string()
    )
    .increment(1);

    histogram!(
        format!("{}_feed_duration_seconds", METRICS_PREFIX),
        "view" => view.to_string()
    )
    .record(duration_secs);
}

/// Helper to record rescore event metrics
pub fn record_rescore(duration_secs: f64, event: &str, updated: usize, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_rescore_events_total", METRICS_PREFIX),
        "event" => event.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    counter!(
        format!("{}_rescore_entries_updated_total", METRICS_PREFIX),
        "event" => event.to_string()
    )
    .increment(updated as u64);

    histogram!(
        format!("{}_rescore_duration_seconds", METRICS_PREFIX),
        "event" => event.to_string()
    )
    .record(duration_secs);
}

/// Helper to record sweep metrics
pub fn record_sweep(duration_secs: f64, processed: usize, outcome: &str) {
    counter!(
        format!("{}_sweep_runs_total", METRICS_PREFIX),
        "outcome" => outcome.to_string()
    )
    .increment(1);

    histogram!(format!("{}_sweep_duration_seconds", METRICS_PREFIX)).record(duration_secs);

    gauge!(format!("{}_sweep_entries_processed", METRICS_PREFIX)).set(processed as f64);
}

/// Helper to record cache metrics
pub fn record_cache(hit: bool, cache_name: &str) {
    if hit {
        counter!(
            format!("{}_cache_hits_total", METRICS_PREFIX),
            "cache" => cache_name.to_string()
        )
        .increment(1);
    } else {
        counter!(
            format!("{}_cache_misses_total", METRICS_PREFIX),
            "cache" => cache_name.to_string()
        )
        .increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latency_buckets() {
        // Verify buckets are sorted and contain SLO targets
        let mut prev = 0.0;
        for &bucket in LATENCY_BUCKETS {
            assert!(bucket > prev);
            prev = bucket;
        }

        // P50 target (50ms) should be in buckets
        assert!(LATENCY_BUCKETS.contains(&0.050));
        // P99 target (150ms) should be in buckets
        assert!(LATENCY_BUCKETS.contains(&0.150));
    }

    #[test]
    fn test_sweep_buckets_sorted() {
        let mut prev = 0.0;
        for &bucket in SWEEP_BUCKETS {
            assert!(bucket > prev);
            prev = bucket;
        }
    }

    #[test]
    fn test_request_metrics() {
        let metrics = RequestMetrics::start("GET", "/v1/feed");
        std::thread::sleep(std::time::Duration::from_millis(10));
        metrics.finish(200);
        // Just verify it runs without panic
    }
}
