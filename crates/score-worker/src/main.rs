//! ScholarFeed Score Worker
//!
//! Keeps hot scores current from two directions:
//! 1. Consumes rescore events from SQS and recomputes the feed entries
//!    each event touches
//! 2. Runs the periodic full-table sweep under a distributed lock so
//!    scores keep decaying even for entries that stop receiving events

mod refresher;
mod rescore;

#[cfg(test)]
mod testutil;

use crate::refresher::BatchRefresher;
use crate::rescore::RescoreProcessor;
use aws_sdk_sqs::types::Message;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use scholarfeed_common::{
    config::AppConfig,
    db::{DbPool, Repository},
    lock::RedisLockService,
    metrics,
    queue::{Queue, RescoreEvent},
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Consecutive failures before the consumer pauses
const MAX_FAILURES: u32 = 5;

/// How long the consumer pauses once the breaker opens
const CIRCUIT_BREAK_DURATION: Duration = Duration::from_secs(30);

/// Idle delay after a failed receive
const RECEIVE_RETRY_DELAY: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = match AppConfig::load() {
        Ok(config) => Arc::new(config),
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    init_tracing(&config);

    info!(
        "Starting ScholarFeed Score Worker v{}",
        scholarfeed_common::VERSION
    );

    // Initialize metrics
    metrics::register_metrics();
    if config.observability.metrics_port > 0 {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
        PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Full(format!(
                    "{}_sweep_duration_seconds",
                    metrics::METRICS_PREFIX
                )),
                metrics::SWEEP_BUCKETS,
            )?
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                metrics::LATENCY_BUCKETS,
            )?
            .with_http_listener(addr)
            .install()?;
        info!(
            port = config.observability.metrics_port,
            "Metrics exporter listening"
        );
    }

    // Initialize database connection
    info!("Connecting to database...");
    let db = DbPool::new(&config.database).await?;
    let store = Arc::new(Repository::new(db));

    // Initialize the sweep lock
    info!("Connecting to lock service...");
    let lock = Arc::new(RedisLockService::new(&config.redis.url, "scholarfeed").await?);

    // Initialize the rescore queue; without one the worker still sweeps
    let queue = match &config.queue.rescore_queue_url {
        Some(url) => {
            info!(url = %url, "Connecting to rescore queue...");
            Some(Arc::new(Queue::new(url.clone(), &config.queue).await?))
        }
        None => {
            warn!("Rescore queue not configured; running sweeps only");
            None
        }
    };

    let processor = RescoreProcessor::new(
        store.clone(),
        config.scoring.clone(),
        config.refresher.fanout_chunk_size,
        queue.clone(),
    );
    let refresher = BatchRefresher::new(
        store,
        lock,
        config.scoring.clone(),
        config.refresher.clone(),
    );

    info!(
        sweep_interval_secs = config.refresher.sweep_interval_secs,
        "Score worker ready, starting main loop..."
    );

    // The first sweep waits a full interval so rolling restarts do not
    // trigger back-to-back table walks
    let mut sweep_timer = tokio::time::interval_at(
        tokio::time::Instant::now() + config.sweep_interval(),
        config.sweep_interval(),
    );
    sweep_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    // Circuit breaker state
    let mut consecutive_failures: u32 = 0;

    loop {
        if consecutive_failures >= MAX_FAILURES {
            warn!(
                failures = consecutive_failures,
                "Circuit breaker open, pausing..."
            );
            tokio::time::sleep(CIRCUIT_BREAK_DURATION).await;
            consecutive_failures = 0;
            info!("Circuit breaker reset, resuming...");
        }

        tokio::select! {
            _ = shutdown_signal() => {
                info!("Shutdown signal received");
                break;
            }
            _ = sweep_timer.tick() => {
                run_sweep(&refresher).await;
            }
            result = next_batch(queue.as_deref()) => {
                let Some(queue) = queue.as_deref() else { continue };
                match result {
                    Ok(messages) => {
                        for message in messages {
                            if handle_message(&processor, queue, &message).await {
                                consecutive_failures = 0;
                            } else {
                                consecutive_failures += 1;
                            }
                        }
                    }
                    Err(e) => {
                        consecutive_failures += 1;
                        error!(error = %e, "Failed to receive messages from queue");
                        tokio::time::sleep(RECEIVE_RETRY_DELAY).await;
                    }
                }
            }
        }
    }

    info!("Score worker shutting down");
    Ok(())
}

/// Initialize the tracing subscriber from observability config
fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));

    if config.observability.json_logging {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}

/// Receive the next message batch, or park forever in sweep-only mode
async fn next_batch(queue: Option<&Queue>) -> scholarfeed_common::Result<Vec<Message>> {
    match queue {
        Some(queue) => queue.receive().await,
        None => std::future::pending().await,
    }
}

/// Process one message; returns `false` when the event failed and will
/// redeliver
///
/// Undecodable messages are deleted rather than retried. They would
/// otherwise redeliver until queue retention expires without ever parsing.
async fn handle_message(processor: &RescoreProcessor, queue: &Queue, message: &Message) -> bool {
    let started = Instant::now();

    let event: RescoreEvent = match Queue::parse_message(message) {
        Ok(event) => event,
        Err(e) => {
            error!(error = %e, "Dropping undecodable message");
            delete_message(queue, message).await;
            return true;
        }
    };

    match processor.process(&event).await {
        Ok(outcome) => {
            metrics::record_rescore(
                started.elapsed().as_secs_f64(),
                event.name(),
                outcome.updated,
                true,
            );
            delete_message(queue, message).await;
            true
        }
        Err(e) => {
            metrics::record_rescore(started.elapsed().as_secs_f64(), event.name(), 0, false);
            error!(
                event = event.name(),
                error = %e,
                "Event processing failed, message will redeliver"
            );
            false
        }
    }
}

async fn delete_message(queue: &Queue, message: &Message) {
    let Some(receipt_handle) = message.receipt_handle() else {
        warn!("Received message without a receipt handle");
        return;
    };
    if let Err(e) = queue.delete(receipt_handle).await {
        error!(error = %e, "Failed to delete message");
    }
}

/// Run one sweep and record its metrics
async fn run_sweep(refresher: &BatchRefresher) {
    let started = Instant::now();
    match refresher.run().await {
        Ok(Some(stats)) => {
            let outcome = if stats.failed_batches > 0 { "partial" } else { "ok" };
            metrics::record_sweep(stats.duration.as_secs_f64(), stats.processed, outcome);
        }
        // Another worker holds the sweep lock
        Ok(None) => {}
        Err(e) => {
            error!(error = %e, "Hot score sweep failed");
            metrics::record_sweep(started.elapsed().as_secs_f64(), 0, "error");
        }
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
