//! Periodic full-table hot score sweep
//!
//! Hot scores decay with age, so entries that stop receiving events still
//! need their stored scores pulled back down. The sweep walks the feed
//! entries table in id order under a distributed lock and rewrites both
//! score columns batch by batch.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use scholarfeed_common::config::{RefresherConfig, ScoringConfig};
use scholarfeed_common::db::models::FeedEntry;
use scholarfeed_common::db::repository::{FeedScoreStore, ScoreUpdate};
use scholarfeed_common::errors::Result;
use scholarfeed_common::lock::LockService;
use scholarfeed_common::scoring;
use tracing::{debug, error, info, instrument, warn};

/// Totals for one sweep run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RefreshStats {
    /// Entries read from the table
    pub processed: usize,
    /// Entries whose scores were rewritten
    pub updated: usize,
    /// Entries skipped (unknown kind, item gone or removed)
    pub skipped: usize,
    /// Batches whose bulk write failed
    pub failed_batches: usize,
    pub duration: Duration,
}

/// Recomputes hot scores for every feed entry in the table
pub struct BatchRefresher {
    store: Arc<dyn FeedScoreStore>,
    lock: Arc<dyn LockService>,
    scoring: ScoringConfig,
    config: RefresherConfig,
}

impl BatchRefresher {
    pub fn new(
        store: Arc<dyn FeedScoreStore>,
        lock: Arc<dyn LockService>,
        scoring: ScoringConfig,
        config: RefresherConfig,
    ) -> Self {
        Self {
            store,
            lock,
            scoring,
            config,
        }
    }

    /// Run one sweep, or return `None` when another worker holds the lock
    ///
    /// The lock is released on every exit path; a crashed holder is covered
    /// by the lock TTL.
    #[instrument(name = "hot_score_sweep", skip(self))]
    pub async fn run(&self) -> Result<Option<RefreshStats>> {
        let started = Instant::now();
        let ttl = Duration::from_secs(self.config.lock_ttl_secs);
        if !self.lock.acquire(&self.config.lock_name, ttl).await? {
            info!("Sweep already running elsewhere; skipping");
            return Ok(None);
        }

        let result = self.sweep().await;

        if let Err(e) = self.lock.release(&self.config.lock_name).await {
            warn!(error = %e, "Failed to release sweep lock; TTL will expire it");
        }

        let mut stats = result?;
        stats.duration = started.elapsed();
        info!(
            processed = stats.processed,
            updated = stats.updated,
            skipped = stats.skipped,
            failed_batches = stats.failed_batches,
            duration_ms = stats.duration.as_millis() as u64,
            "Hot score sweep finished"
        );
        Ok(Some(stats))
    }

    /// Cursor walk over the table, one bulk write per batch
    ///
    /// A failed write is counted and the walk moves on; the affected
    /// entries keep their stale scores until the next sweep.
    async fn sweep(&self) -> Result<RefreshStats> {
        let mut stats = RefreshStats::default();
        let mut cursor = 0i64;
        let now = Utc::now();

        loop {
            let entries = self
                .store
                .entries_after(cursor, self.config.batch_size)
                .await?;
            if entries.is_empty() {
                break;
            }
            if let Some(last) = entries.last() {
                cursor = last.id;
            }

            let mut updates = Vec::with_capacity(entries.len());
            for entry in &entries {
                stats.processed += 1;
                match self.prepare_update(entry, now).await {
                    Some(update) => updates.push(update),
                    None => stats.skipped += 1,
                }
            }
            if updates.is_empty() {
                continue;
            }

            match self.store.bulk_update_scores(&updates).await {
                Ok(written) => stats.updated += written as usize,
                Err(e) => {
                    stats.failed_batches += 1;
                    error!(
                        error = %e,
                        batch_len = updates.len(),
                        "Bulk score write failed; continuing"
                    );
                }
            }
        }

        Ok(stats)
    }

    /// Recompute one entry, or `None` when it should be skipped
    async fn prepare_update(&self, entry: &FeedEntry, now: DateTime<Utc>) -> Option<ScoreUpdate> {
        let Some(kind) = entry.kind() else {
            debug!(
                entry_id = entry.id,
                content_kind = %entry.content_kind,
                "Unknown content kind; skipping"
            );
            return None;
        };

        match self.store.item_is_live(kind, entry.item_id).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(entry_id = entry.id, "Item is gone or removed; skipping");
                return None;
            }
            Err(e) => {
                warn!(entry_id = entry.id, error = %e, "Item resolution failed; skipping");
                return None;
            }
        }

        let scores = scoring::score_entry(
            kind,
            &entry.content,
            &entry.metrics,
            entry.action_date.with_timezone(&Utc),
            now,
            &self.scoring,
        );
        Some(ScoreUpdate {
            entry_id: entry.id,
            hot_score: scores.hot_score,
            hot_score_v2: scores.hot_score_v2,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{self, InMemoryStore};
    use scholarfeed_common::db::models::ContentKind;
    use scholarfeed_common::lock::InMemoryLockService;

    fn refresher_with(
        store: Arc<InMemoryStore>,
        lock: Arc<InMemoryLockService>,
        batch_size: u64,
    ) -> BatchRefresher {
        let config = RefresherConfig {
            batch_size,
            ..RefresherConfig::default()
        };
        BatchRefresher::new(store, lock, ScoringConfig::default(), config)
    }

    #[tokio::test]
    async fn test_sweep_counts_and_writes() {
        let store = Arc::new(InMemoryStore::new());
        store.insert_entry(testutil::entry(1, ContentKind::Paper, 10));
        store.insert_entry(testutil::entry(2, ContentKind::Post, 20));
        let mut odd = testutil::entry(3, ContentKind::Paper, 30);
        odd.content_kind = "WIDGET".to_string();
        store.insert_entry(odd);
        // Post 20 is never marked live, so its entry is skipped
        store.mark_live(ContentKind::Paper, 10);

        let lock = Arc::new(InMemoryLockService::new());
        let stats = refresher_with(store.clone(), lock, 100)
            .run()
            .await
            .unwrap()
            .expect("lock is free");

        assert_eq!(stats.processed, 3);
        assert_eq!(stats.updated, 1);
        assert_eq!(stats.skipped, 2);
        assert_eq!(stats.failed_batches, 0);
        assert!(stats.duration > Duration::ZERO);
        assert!(store.scores(1).unwrap().1 > 0);
        assert_eq!(store.scores(2), Some((0, 0)));
    }

    #[tokio::test]
    async fn test_contended_lock_skips_run() {
        let store = Arc::new(InMemoryStore::new());
        store.insert_entry(testutil::entry(1, ContentKind::Paper, 10));
        store.mark_live(ContentKind::Paper, 10);

        let lock = Arc::new(InMemoryLockService::new());
        let config = RefresherConfig::default();
        assert!(lock
            .acquire(&config.lock_name, Duration::from_secs(60))
            .await
            .unwrap());

        let result = refresher_with(store.clone(), lock, 100).run().await.unwrap();

        assert_eq!(result, None);
        assert_eq!(store.scores(1), Some((0, 0)));
    }

    #[tokio::test]
    async fn test_lock_released_after_run() {
        let store = Arc::new(InMemoryStore::new());
        let lock = Arc::new(InMemoryLockService::new());

        let stats = refresher_with(store, lock.clone(), 100)
            .run()
            .await
            .unwrap()
            .expect("lock is free");
        assert_eq!(stats.processed, 0);

        // An empty-table run still frees the sweep lock
        let config = RefresherConfig::default();
        assert!(lock
            .acquire(&config.lock_name, Duration::from_secs(1))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_failed_batch_does_not_stop_sweep() {
        let store = Arc::new(InMemoryStore::new());
        for id in 1..=5 {
            store.insert_entry(testutil::entry(id, ContentKind::Paper, id + 100));
            store.mark_live(ContentKind::Paper, id + 100);
        }
        store.fail_next_bulk_updates(1);

        let lock = Arc::new(InMemoryLockService::new());
        let stats = refresher_with(store.clone(), lock, 2)
            .run()
            .await
            .unwrap()
            .expect("lock is free");

        // Batches land as [1,2], [3,4], [5]; only the first write fails
        assert_eq!(stats.processed, 5);
        assert_eq!(stats.failed_batches, 1);
        assert_eq!(stats.updated, 3);
        assert_eq!(store.scores(1), Some((0, 0)));
        assert!(store.scores(3).unwrap().0 > 0);
        assert!(store.scores(5).unwrap().0 > 0);
    }
}
