//! In-memory `FeedScoreStore` and row builders for worker tests

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use scholarfeed_common::db::models::{Bounty, Comment, ContentKind, FeedEntry};
use scholarfeed_common::db::repository::{FeedScoreStore, ScoreUpdate};
use scholarfeed_common::errors::{AppError, Result};

/// Store backed by hash maps, with injectable write failures
#[derive(Default)]
pub struct InMemoryStore {
    entries: Mutex<HashMap<i64, FeedEntry>>,
    comments: Mutex<HashMap<i64, Comment>>,
    bounties: Mutex<HashMap<i64, Bounty>>,
    live: Mutex<HashSet<(ContentKind, i64)>>,
    failing_updates: Mutex<HashSet<i64>>,
    failing_bulk_writes: Mutex<u32>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_entry(&self, entry: FeedEntry) {
        self.entries.lock().unwrap().insert(entry.id, entry);
    }

    pub fn insert_comment(&self, comment: Comment) {
        self.comments.lock().unwrap().insert(comment.id, comment);
    }

    pub fn insert_bounty(&self, bounty: Bounty) {
        self.bounties.lock().unwrap().insert(bounty.id, bounty);
    }

    pub fn mark_live(&self, kind: ContentKind, item_id: i64) {
        self.live.lock().unwrap().insert((kind, item_id));
    }

    /// Make `update_entry_scores` fail for one entry id
    pub fn fail_updates_for(&self, entry_id: i64) {
        self.failing_updates.lock().unwrap().insert(entry_id);
    }

    /// Make the next `count` bulk writes fail
    pub fn fail_next_bulk_updates(&self, count: u32) {
        *self.failing_bulk_writes.lock().unwrap() = count;
    }

    pub fn scores(&self, entry_id: i64) -> Option<(i64, i64)> {
        self.entries
            .lock()
            .unwrap()
            .get(&entry_id)
            .map(|e| (e.hot_score, e.hot_score_v2))
    }
}

#[async_trait]
impl FeedScoreStore for InMemoryStore {
    async fn find_entry(&self, id: i64) -> Result<Option<FeedEntry>> {
        Ok(self.entries.lock().unwrap().get(&id).cloned())
    }

    async fn entries_for_item(&self, kind: ContentKind, item_id: i64) -> Result<Vec<FeedEntry>> {
        let mut matched: Vec<FeedEntry> = self
            .entries
            .lock()
            .unwrap()
            .values()
            .filter(|e| e.kind() == Some(kind) && e.item_id == item_id)
            .cloned()
            .collect();
        matched.sort_by_key(|e| e.id);
        Ok(matched)
    }

    async fn entries_for_unified_document(
        &self,
        unified_document_id: i64,
    ) -> Result<Vec<FeedEntry>> {
        let mut matched: Vec<FeedEntry> = self
            .entries
            .lock()
            .unwrap()
            .values()
            .filter(|e| e.unified_document_id == Some(unified_document_id))
            .cloned()
            .collect();
        matched.sort_by_key(|e| e.id);
        Ok(matched)
    }

    async fn entry_ids_for_user(&self, user_id: i64) -> Result<Vec<i64>> {
        let mut ids: Vec<i64> = self
            .entries
            .lock()
            .unwrap()
            .values()
            .filter(|e| e.user_id == Some(user_id))
            .map(|e| e.id)
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    async fn entries_after(&self, cursor: i64, limit: u64) -> Result<Vec<FeedEntry>> {
        let mut matched: Vec<FeedEntry> = self
            .entries
            .lock()
            .unwrap()
            .values()
            .filter(|e| e.id > cursor)
            .cloned()
            .collect();
        matched.sort_by_key(|e| e.id);
        matched.truncate(limit as usize);
        Ok(matched)
    }

    async fn item_is_live(&self, kind: ContentKind, item_id: i64) -> Result<bool> {
        Ok(self.live.lock().unwrap().contains(&(kind, item_id)))
    }

    async fn update_entry_scores(
        &self,
        entry_id: i64,
        hot_score: i64,
        hot_score_v2: i64,
    ) -> Result<()> {
        if self.failing_updates.lock().unwrap().contains(&entry_id) {
            return Err(AppError::Internal {
                message: format!("injected write failure for entry {}", entry_id),
            });
        }
        if let Some(entry) = self.entries.lock().unwrap().get_mut(&entry_id) {
            entry.hot_score = hot_score;
            entry.hot_score_v2 = hot_score_v2;
        }
        Ok(())
    }

    async fn bulk_update_scores(&self, updates: &[ScoreUpdate]) -> Result<u64> {
        {
            let mut failing = self.failing_bulk_writes.lock().unwrap();
            if *failing > 0 {
                *failing -= 1;
                return Err(AppError::Internal {
                    message: "injected bulk write failure".to_string(),
                });
            }
        }

        let mut entries = self.entries.lock().unwrap();
        let mut written = 0;
        for update in updates {
            if let Some(entry) = entries.get_mut(&update.entry_id) {
                entry.hot_score = update.hot_score;
                entry.hot_score_v2 = update.hot_score_v2;
                written += 1;
            }
        }
        Ok(written)
    }

    async fn find_comment(&self, id: i64) -> Result<Option<Comment>> {
        Ok(self.comments.lock().unwrap().get(&id).cloned())
    }

    async fn find_bounty(&self, id: i64) -> Result<Option<Bounty>> {
        Ok(self.bounties.lock().unwrap().get(&id).cloned())
    }
}

/// Feed entry with engaged metrics so recomputed scores come out nonzero
pub fn entry(id: i64, kind: ContentKind, item_id: i64) -> FeedEntry {
    let now = Utc::now().fixed_offset();
    FeedEntry {
        id,
        content_kind: kind.as_str().to_string(),
        item_id,
        unified_document_id: None,
        action: "PUBLISH".to_string(),
        action_date: now,
        content: serde_json::json!({"created_date": now.to_rfc3339()}),
        metrics: serde_json::json!({"votes": 25, "replies": 4}),
        hot_score: 0,
        hot_score_v2: 0,
        user_id: None,
        created_at: now,
        updated_at: now,
    }
}

pub fn comment(id: i64, parent_id: Option<i64>, unified_document_id: Option<i64>) -> Comment {
    Comment {
        id,
        parent_id,
        unified_document_id,
        created_by_id: None,
        is_removed: false,
        created_date: Utc::now().fixed_offset(),
    }
}

pub fn bounty(
    id: i64,
    target_kind: ContentKind,
    target_item_id: i64,
    unified_document_id: Option<i64>,
) -> Bounty {
    Bounty {
        id,
        status: "OPEN".to_string(),
        amount: 100.0,
        item_content_kind: target_kind.as_str().to_string(),
        item_id: target_item_id,
        unified_document_id,
        expiration_date: None,
        created_by_id: None,
        created_date: Utc::now().fixed_offset(),
    }
}
