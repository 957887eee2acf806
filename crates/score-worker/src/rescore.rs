//! Event-driven rescoring
//!
//! Consumes engagement events and recomputes hot scores for the feed
//! entries each event touches. Producers send whatever context they have
//! on hand; anything missing (a comment's parent, a bounty's document) is
//! resolved from the database before the entry ids are collected.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use scholarfeed_common::config::ScoringConfig;
use scholarfeed_common::db::models::ContentKind;
use scholarfeed_common::db::repository::FeedScoreStore;
use scholarfeed_common::errors::Result;
use scholarfeed_common::queue::{Queue, RescoreEvent};
use scholarfeed_common::scoring;
use tracing::{debug, error, info, instrument, warn};

/// Counters for one processed event
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RescoreOutcome {
    /// Feed entries the event resolved to
    pub matched: usize,
    /// Entries whose scores were written
    pub updated: usize,
    /// Entries passed over without an error (vanished rows, unknown kinds)
    pub skipped: usize,
    /// Entries whose recompute or write failed
    pub failed: usize,
}

/// Applies rescore events to the feed entry store
pub struct RescoreProcessor {
    store: Arc<dyn FeedScoreStore>,
    scoring: ScoringConfig,
    fanout_chunk_size: usize,
    queue: Option<Arc<Queue>>,
}

impl RescoreProcessor {
    pub fn new(
        store: Arc<dyn FeedScoreStore>,
        scoring: ScoringConfig,
        fanout_chunk_size: usize,
        queue: Option<Arc<Queue>>,
    ) -> Self {
        Self {
            store,
            scoring,
            fanout_chunk_size,
            queue,
        }
    }

    /// Process a single event end to end
    ///
    /// Per-entry failures are counted rather than propagated; one bad row
    /// must not block the other entries an event touches. An `Err` here
    /// means the event itself could not be handled and should be retried.
    #[instrument(skip(self, event), fields(event = event.name()))]
    pub async fn process(&self, event: &RescoreEvent) -> Result<RescoreOutcome> {
        if let RescoreEvent::UserVerified { user_id } = event {
            return self.fan_out(*user_id).await;
        }

        let entry_ids = self.resolve(event).await?;
        if entry_ids.is_empty() {
            debug!("Event resolved to no feed entries");
            return Ok(RescoreOutcome::default());
        }

        let outcome = self.rescore_entries(&entry_ids).await;
        info!(
            matched = outcome.matched,
            updated = outcome.updated,
            skipped = outcome.skipped,
            failed = outcome.failed,
            "Rescore event processed"
        );
        Ok(outcome)
    }

    /// Resolve an event to the distinct feed entry ids it affects
    async fn resolve(&self, event: &RescoreEvent) -> Result<Vec<i64>> {
        let mut ids = match event {
            RescoreEvent::VoteCast { kind, item_id }
            | RescoreEvent::ContentEdited { kind, item_id } => self
                .store
                .entries_for_item(*kind, *item_id)
                .await?
                .iter()
                .map(|e| e.id)
                .collect(),
            RescoreEvent::EntryTouched { entry_id } => vec![*entry_id],
            RescoreEvent::CommentPosted {
                comment_id,
                parent_comment_id,
                unified_document_id,
            } => {
                self.resolve_comment(*comment_id, *parent_comment_id, *unified_document_id)
                    .await?
            }
            RescoreEvent::BountyChanged {
                bounty_id,
                target_kind,
                target_item_id,
                unified_document_id,
            } => {
                self.resolve_bounty(
                    *bounty_id,
                    *target_kind,
                    *target_item_id,
                    *unified_document_id,
                )
                .await?
            }
            // Fanned out in process() before resolution
            RescoreEvent::UserVerified { .. } => Vec::new(),
        };

        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }

    /// A comment bumps its own entries, its parent's, and its document's
    async fn resolve_comment(
        &self,
        comment_id: i64,
        parent_comment_id: Option<i64>,
        unified_document_id: Option<i64>,
    ) -> Result<Vec<i64>> {
        // One row lookup covers both missing context fields
        let comment = if parent_comment_id.is_none() || unified_document_id.is_none() {
            self.store.find_comment(comment_id).await?
        } else {
            None
        };
        let parent_id = parent_comment_id.or_else(|| comment.as_ref().and_then(|c| c.parent_id));
        let unified_document_id = unified_document_id
            .or_else(|| comment.as_ref().and_then(|c| c.unified_document_id));

        let mut ids: Vec<i64> = self
            .store
            .entries_for_item(ContentKind::Comment, comment_id)
            .await?
            .iter()
            .map(|e| e.id)
            .collect();
        if let Some(parent_id) = parent_id {
            ids.extend(
                self.store
                    .entries_for_item(ContentKind::Comment, parent_id)
                    .await?
                    .iter()
                    .map(|e| e.id),
            );
        }
        if let Some(doc_id) = unified_document_id {
            ids.extend(
                self.store
                    .entries_for_unified_document(doc_id)
                    .await?
                    .iter()
                    .map(|e| e.id),
            );
        }
        Ok(ids)
    }

    /// A bounty change touches the bounty's entries, its target item's,
    /// and the document both hang off
    async fn resolve_bounty(
        &self,
        bounty_id: i64,
        target_kind: ContentKind,
        target_item_id: i64,
        unified_document_id: Option<i64>,
    ) -> Result<Vec<i64>> {
        let mut ids: Vec<i64> = self
            .store
            .entries_for_item(ContentKind::Bounty, bounty_id)
            .await?
            .iter()
            .map(|e| e.id)
            .collect();
        ids.extend(
            self.store
                .entries_for_item(target_kind, target_item_id)
                .await?
                .iter()
                .map(|e| e.id),
        );

        let unified_document_id = match unified_document_id {
            Some(id) => Some(id),
            None => self
                .store
                .find_bounty(bounty_id)
                .await?
                .and_then(|b| b.unified_document_id),
        };
        if let Some(doc_id) = unified_document_id {
            ids.extend(
                self.store
                    .entries_for_unified_document(doc_id)
                    .await?
                    .iter()
                    .map(|e| e.id),
            );
        }
        Ok(ids)
    }

    /// Expand a user-level event into per-entry events on the queue
    ///
    /// Verification can touch thousands of a user's entries, so the work is
    /// re-enqueued in chunks instead of recomputed inline on this consumer.
    async fn fan_out(&self, user_id: i64) -> Result<RescoreOutcome> {
        let entry_ids = self.store.entry_ids_for_user(user_id).await?;
        if entry_ids.is_empty() {
            debug!(user_id, "User has no feed entries to rescore");
            return Ok(RescoreOutcome::default());
        }

        let Some(queue) = &self.queue else {
            warn!(
                user_id,
                entries = entry_ids.len(),
                "No queue configured; dropping user fan-out"
            );
            return Ok(RescoreOutcome::default());
        };

        for chunk in entry_ids.chunks(self.fanout_chunk_size) {
            let events: Vec<RescoreEvent> = chunk
                .iter()
                .map(|&entry_id| RescoreEvent::EntryTouched { entry_id })
                .collect();
            queue.send_batch(&events).await?;
        }

        info!(
            user_id,
            entries = entry_ids.len(),
            "User rescore fanned out to queue"
        );
        Ok(RescoreOutcome {
            matched: entry_ids.len(),
            ..RescoreOutcome::default()
        })
    }

    async fn rescore_entries(&self, entry_ids: &[i64]) -> RescoreOutcome {
        let now = Utc::now();
        let mut outcome = RescoreOutcome {
            matched: entry_ids.len(),
            ..RescoreOutcome::default()
        };

        for &entry_id in entry_ids {
            match self.rescore_one(entry_id, now).await {
                Ok(true) => outcome.updated += 1,
                Ok(false) => outcome.skipped += 1,
                Err(e) => {
                    outcome.failed += 1;
                    error!(entry_id, error = %e, "Entry rescore failed");
                }
            }
        }
        outcome
    }

    /// Recompute and persist one entry's scores
    ///
    /// `Ok(false)` is a silent skip: the row is gone or its kind column
    /// holds something unparseable.
    async fn rescore_one(&self, entry_id: i64, now: DateTime<Utc>) -> Result<bool> {
        let Some(entry) = self.store.find_entry(entry_id).await? else {
            debug!(entry_id, "Entry vanished before rescore");
            return Ok(false);
        };
        let Some(kind) = entry.kind() else {
            warn!(
                entry_id,
                content_kind = %entry.content_kind,
                "Unknown content kind; skipping"
            );
            return Ok(false);
        };

        let scores = scoring::score_entry(
            kind,
            &entry.content,
            &entry.metrics,
            entry.action_date.with_timezone(&Utc),
            now,
            &self.scoring,
        );
        self.store
            .update_entry_scores(entry.id, scores.hot_score, scores.hot_score_v2)
            .await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{self, InMemoryStore};

    fn processor(store: Arc<InMemoryStore>) -> RescoreProcessor {
        RescoreProcessor::new(store, ScoringConfig::default(), 100, None)
    }

    #[tokio::test]
    async fn test_vote_rescores_matching_entries() {
        let store = Arc::new(InMemoryStore::new());
        store.insert_entry(testutil::entry(1, ContentKind::Paper, 10));
        store.insert_entry(testutil::entry(2, ContentKind::Paper, 10));
        store.insert_entry(testutil::entry(3, ContentKind::Paper, 11));

        let outcome = processor(store.clone())
            .process(&RescoreEvent::VoteCast {
                kind: ContentKind::Paper,
                item_id: 10,
            })
            .await
            .unwrap();

        assert_eq!(outcome.matched, 2);
        assert_eq!(outcome.updated, 2);
        assert_eq!(outcome.failed, 0);

        let (v1, v2) = store.scores(1).unwrap();
        assert!(v1 > 0);
        assert!(v2 > 0);
        // The entry on the untouched item keeps its stored scores
        assert_eq!(store.scores(3), Some((0, 0)));
    }

    #[tokio::test]
    async fn test_event_with_no_entries() {
        let store = Arc::new(InMemoryStore::new());
        let outcome = tokio_test::assert_ok!(
            processor(store)
                .process(&RescoreEvent::VoteCast {
                    kind: ContentKind::Post,
                    item_id: 99,
                })
                .await
        );
        assert_eq!(outcome, RescoreOutcome::default());
    }

    #[tokio::test]
    async fn test_comment_event_resolves_thread_and_document() {
        let store = Arc::new(InMemoryStore::new());
        // Comment 50 replies to comment 40 on unified document 7
        store.insert_comment(testutil::comment(50, Some(40), Some(7)));

        let mut own = testutil::entry(1, ContentKind::Comment, 50);
        own.unified_document_id = Some(7);
        store.insert_entry(own);
        store.insert_entry(testutil::entry(2, ContentKind::Comment, 40));
        let mut doc = testutil::entry(3, ContentKind::Paper, 10);
        doc.unified_document_id = Some(7);
        store.insert_entry(doc);

        // Producer sent no context; both fields resolve from the comment row,
        // and entry 1 appearing via two paths is still counted once
        let outcome = processor(store)
            .process(&RescoreEvent::CommentPosted {
                comment_id: 50,
                parent_comment_id: None,
                unified_document_id: None,
            })
            .await
            .unwrap();

        assert_eq!(outcome.matched, 3);
        assert_eq!(outcome.updated, 3);
    }

    #[tokio::test]
    async fn test_bounty_event_resolves_target_and_document() {
        let store = Arc::new(InMemoryStore::new());
        store.insert_bounty(testutil::bounty(200, ContentKind::Paper, 10, Some(7)));
        store.insert_entry(testutil::entry(1, ContentKind::Bounty, 200));
        store.insert_entry(testutil::entry(2, ContentKind::Paper, 10));
        let mut doc = testutil::entry(3, ContentKind::Post, 33);
        doc.unified_document_id = Some(7);
        store.insert_entry(doc);

        let outcome = processor(store)
            .process(&RescoreEvent::BountyChanged {
                bounty_id: 200,
                target_kind: ContentKind::Paper,
                target_item_id: 10,
                unified_document_id: None,
            })
            .await
            .unwrap();

        assert_eq!(outcome.matched, 3);
        assert_eq!(outcome.updated, 3);
    }

    #[tokio::test]
    async fn test_unknown_content_kind_skipped() {
        let store = Arc::new(InMemoryStore::new());
        let mut odd = testutil::entry(9, ContentKind::Paper, 1);
        odd.content_kind = "WIDGET".to_string();
        store.insert_entry(odd);

        let outcome = processor(store.clone())
            .process(&RescoreEvent::EntryTouched { entry_id: 9 })
            .await
            .unwrap();

        assert_eq!(outcome.matched, 1);
        assert_eq!(outcome.skipped, 1);
        assert_eq!(outcome.updated, 0);
        assert_eq!(store.scores(9), Some((0, 0)));
    }

    #[tokio::test]
    async fn test_vanished_entry_skipped() {
        let store = Arc::new(InMemoryStore::new());
        let outcome = processor(store)
            .process(&RescoreEvent::EntryTouched { entry_id: 404 })
            .await
            .unwrap();

        assert_eq!(outcome.matched, 1);
        assert_eq!(outcome.skipped, 1);
    }

    #[tokio::test]
    async fn test_write_failure_does_not_block_siblings() {
        let store = Arc::new(InMemoryStore::new());
        store.insert_entry(testutil::entry(1, ContentKind::Paper, 10));
        store.insert_entry(testutil::entry(2, ContentKind::Paper, 10));
        store.fail_updates_for(1);

        let outcome = processor(store.clone())
            .process(&RescoreEvent::VoteCast {
                kind: ContentKind::Paper,
                item_id: 10,
            })
            .await
            .unwrap();

        assert_eq!(outcome.matched, 2);
        assert_eq!(outcome.updated, 1);
        assert_eq!(outcome.failed, 1);
        assert!(store.scores(2).unwrap().0 > 0);
    }

    #[tokio::test]
    async fn test_user_event_without_queue_is_dropped() {
        let store = Arc::new(InMemoryStore::new());
        let mut entry = testutil::entry(1, ContentKind::Paper, 10);
        entry.user_id = Some(77);
        store.insert_entry(entry);

        let worker = processor(store.clone());
        let outcome = worker
            .process(&RescoreEvent::UserVerified { user_id: 77 })
            .await
            .unwrap();
        assert_eq!(outcome, RescoreOutcome::default());
        // Nothing is recomputed inline on this consumer
        assert_eq!(store.scores(1), Some((0, 0)));

        // A user with no entries short-circuits before the queue check
        let outcome = worker
            .process(&RescoreEvent::UserVerified { user_id: 123 })
            .await
            .unwrap();
        assert_eq!(outcome, RescoreOutcome::default());
    }
}
