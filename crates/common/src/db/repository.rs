//! Repository pattern for database operations
//!
//! Provides a clean interface for all data access operations
//! with proper error handling. The score-maintenance subset is also
//! exposed through the [`FeedScoreStore`] trait so the worker can run
//! against an in-memory store in tests.

use crate::db::models::*;
use crate::db::DbPool;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use sea_orm::sea_query::{Expr, Query};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, DbBackend, EntityTrait, JoinType,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait, Statement,
};
use serde::{Deserialize, Serialize};

/// Feed view selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedView {
    #[default]
    Latest,
    Popular,
    Following,
}

impl FeedView {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedView::Latest => "latest",
            FeedView::Popular => "popular",
            FeedView::Following => "following",
        }
    }

    /// Whether the result set depends on who is asking
    pub fn is_viewer_scoped(&self) -> bool {
        matches!(self, FeedView::Following)
    }
}

/// Ranking column selector (A/B surface between the two score columns)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedOrdering {
    #[default]
    Latest,
    HotScore,
    HotScoreV2,
}

impl FeedOrdering {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedOrdering::Latest => "latest",
            FeedOrdering::HotScore => "hot_score",
            FeedOrdering::HotScoreV2 => "hot_score_v2",
        }
    }
}

/// Parameters for one feed listing query
#[derive(Debug, Clone)]
pub struct FeedQueryArgs {
    pub view: FeedView,
    pub ordering: FeedOrdering,
    pub hub_slug: Option<String>,
    pub source: Option<String>,
    pub fundraise_status: Option<String>,
    pub viewer: Option<i64>,
    /// 1-based page number
    pub page: u64,
    pub page_size: u64,
}

impl Default for FeedQueryArgs {
    fn default() -> Self {
        Self {
            view: FeedView::default(),
            ordering: FeedOrdering::default(),
            hub_slug: None,
            source: None,
            fundraise_status: None,
            viewer: None,
            page: 1,
            page_size: 20,
        }
    }
}

impl FeedQueryArgs {
    /// The ranking column actually applied. The popular view is score-ranked
    /// even when no explicit ordering was requested.
    pub fn effective_ordering(&self) -> FeedOrdering {
        if self.view == FeedView::Popular && self.ordering == FeedOrdering::Latest {
            FeedOrdering::HotScore
        } else {
            self.ordering
        }
    }
}

/// One page of feed entries plus the total match count
#[derive(Debug, Clone)]
pub struct FeedPage {
    pub total: u64,
    pub entries: Vec<FeedEntry>,
}

/// One row of a bulk score write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreUpdate {
    pub entry_id: i64,
    pub hot_score: i64,
    pub hot_score_v2: i64,
}

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get the read connection
    fn read_conn(&self) -> &DatabaseConnection {
        self.pool.read()
    }

    /// Get the write connection
    fn write_conn(&self) -> &DatabaseConnection {
        self.pool.write()
    }

    // ========================================================================
    // Health Check
    // ========================================================================

    /// Ping the database
    pub async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }

    // ========================================================================
    // Feed Listing
    // ========================================================================

    /// Paged feed listing for one view with all filters applied.
    ///
    /// Latest and Following collapse to the newest entry per
    /// (content kind, item); Popular restricts to papers and posts and
    /// collapses to the newest entry per unified document.
    pub async fn list_feed(&self, args: &FeedQueryArgs) -> Result<FeedPage> {
        let mut query = FeedEntryEntity::find();

        let hub_id = match args.hub_slug {
            Some(ref slug) => {
                let hub = self
                    .find_hub_by_slug(slug)
                    .await?
                    .ok_or_else(|| AppError::HubNotFound { slug: slug.clone() })?;
                Some(hub.id)
            }
            None => None,
        };

        let followed = match (args.view, args.viewer) {
            (FeedView::Following, Some(viewer)) => self.followed_hub_ids(viewer).await?,
            // Anonymous or empty follow set falls back to the unfiltered feed
            _ => Vec::new(),
        };

        if hub_id.is_some() || !followed.is_empty() {
            query = query
                .join(JoinType::InnerJoin, FeedEntryRelation::FeedEntryHubs.def())
                .distinct();

            if let Some(id) = hub_id {
                query = query.filter(FeedEntryHubColumn::HubId.eq(id));
            }
            if !followed.is_empty() {
                query = query.filter(FeedEntryHubColumn::HubId.is_in(followed));
            }
        }

        // Papers are ingested from external indexes; "researchhub" means
        // content that originated on the platform itself
        if args.source.as_deref() == Some("researchhub") {
            query = query.filter(FeedEntryColumn::ContentKind.ne(ContentKind::Paper.as_str()));
        }

        if let Some(ref status) = args.fundraise_status {
            query = query.filter(Expr::cust_with_values(
                "content -> 'fundraise' ->> 'status' = ?",
                [status.to_uppercase()],
            ));
        }

        if args.view == FeedView::Popular {
            let ranked_kinds = vec![ContentKind::Paper.as_str(), ContentKind::Post.as_str()];
            query = query.filter(FeedEntryColumn::ContentKind.is_in(ranked_kinds.clone()));

            // A document can have several entries (publish + open); rank the
            // newest entry per unified document
            let newest_per_document = Query::select()
                .expr(Expr::col(FeedEntryColumn::Id).max())
                .from(FeedEntryEntity)
                .and_where(Expr::col(FeedEntryColumn::ContentKind).is_in(ranked_kinds))
                .group_by_col(FeedEntryColumn::UnifiedDocumentId)
                .to_owned();
            query = query.filter(FeedEntryColumn::Id.in_subquery(newest_per_document));
        } else {
            let newest_per_item = Query::select()
                .expr(Expr::col(FeedEntryColumn::Id).max())
                .from(FeedEntryEntity)
                .group_by_columns([FeedEntryColumn::ContentKind, FeedEntryColumn::ItemId])
                .to_owned();
            query = query.filter(FeedEntryColumn::Id.in_subquery(newest_per_item));
        }

        query = match args.effective_ordering() {
            FeedOrdering::Latest => query.order_by_desc(FeedEntryColumn::ActionDate),
            FeedOrdering::HotScore => query.order_by_desc(FeedEntryColumn::HotScore),
            FeedOrdering::HotScoreV2 => query.order_by_desc(FeedEntryColumn::HotScoreV2),
        };
        query = query.order_by_desc(FeedEntryColumn::Id);

        let page = args.page.max(1);
        let page_size = args.page_size.max(1);

        let paginator = query.paginate(self.read_conn(), page_size);
        let total = paginator.num_items().await?;
        let entries = paginator.fetch_page(page - 1).await?;

        Ok(FeedPage { total, entries })
    }

    // ========================================================================
    // Feed Entry Lookups
    // ========================================================================

    /// Find a feed entry by ID
    pub async fn find_entry(&self, id: i64) -> Result<Option<FeedEntry>> {
        FeedEntryEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// All entries pointing at one content item
    pub async fn entries_for_item(
        &self,
        kind: ContentKind,
        item_id: i64,
    ) -> Result<Vec<FeedEntry>> {
        FeedEntryEntity::find()
            .filter(FeedEntryColumn::ContentKind.eq(kind.as_str()))
            .filter(FeedEntryColumn::ItemId.eq(item_id))
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// All entries under one unified document
    pub async fn entries_for_unified_document(
        &self,
        unified_document_id: i64,
    ) -> Result<Vec<FeedEntry>> {
        FeedEntryEntity::find()
            .filter(FeedEntryColumn::UnifiedDocumentId.eq(unified_document_id))
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// IDs of every entry created by one user
    pub async fn entry_ids_for_user(&self, user_id: i64) -> Result<Vec<i64>> {
        FeedEntryEntity::find()
            .select_only()
            .column(FeedEntryColumn::Id)
            .filter(FeedEntryColumn::UserId.eq(user_id))
            .order_by_asc(FeedEntryColumn::Id)
            .into_tuple::<i64>()
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Feed entries in ascending ID order after a cursor
    pub async fn entries_after(&self, cursor: i64, limit: u64) -> Result<Vec<FeedEntry>> {
        FeedEntryEntity::find()
            .filter(FeedEntryColumn::Id.gt(cursor))
            .order_by_asc(FeedEntryColumn::Id)
            .limit(limit)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    // ========================================================================
    // Score Updates
    // ========================================================================

    /// Persist both score columns for one entry
    pub async fn update_entry_scores(
        &self,
        entry_id: i64,
        hot_score: i64,
        hot_score_v2: i64,
    ) -> Result<()> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            "UPDATE feed_entries SET hot_score = $1, hot_score_v2 = $2, updated_at = NOW() \
             WHERE id = $3",
            vec![hot_score.into(), hot_score_v2.into(), entry_id.into()],
        );

        self.write_conn().execute(stmt).await?;
        Ok(())
    }

    /// Persist a batch of score pairs in a single statement.
    ///
    /// Returns the number of rows actually updated (entries deleted since
    /// the batch was read simply do not match).
    pub async fn bulk_update_scores(&self, updates: &[ScoreUpdate]) -> Result<u64> {
        if updates.is_empty() {
            return Ok(0);
        }

        let mut rows = Vec::with_capacity(updates.len());
        let mut values: Vec<sea_orm::Value> = Vec::with_capacity(updates.len() * 3);

        for (i, update) in updates.iter().enumerate() {
            let base = i * 3;
            rows.push(format!(
                "(${}::bigint, ${}::bigint, ${}::bigint)",
                base + 1,
                base + 2,
                base + 3
            ));
            values.push(update.entry_id.into());
            values.push(update.hot_score.into());
            values.push(update.hot_score_v2.into());
        }

        let sql = format!(
            "UPDATE feed_entries AS fe \
             SET hot_score = v.hot_score, hot_score_v2 = v.hot_score_v2, updated_at = NOW() \
             FROM (VALUES {}) AS v(id, hot_score, hot_score_v2) \
             WHERE fe.id = v.id",
            rows.join(", ")
        );

        let result = self
            .write_conn()
            .execute(Statement::from_sql_and_values(DbBackend::Postgres, &sql, values))
            .await?;

        Ok(result.rows_affected())
    }

    // ========================================================================
    // Hub Operations
    // ========================================================================

    /// Find a hub by slug
    pub async fn find_hub_by_slug(&self, slug: &str) -> Result<Option<Hub>> {
        HubEntity::find()
            .filter(HubColumn::Slug.eq(slug))
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// IDs of hubs one user follows
    pub async fn followed_hub_ids(&self, user_id: i64) -> Result<Vec<i64>> {
        UserHubFollowEntity::find()
            .select_only()
            .column(UserHubFollowColumn::HubId)
            .filter(UserHubFollowColumn::UserId.eq(user_id))
            .into_tuple::<i64>()
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    // ========================================================================
    // Content Item Resolution
    // ========================================================================

    /// Whether the underlying content item still exists and is visible
    pub async fn item_is_live(&self, kind: ContentKind, item_id: i64) -> Result<bool> {
        let live = match kind {
            ContentKind::Paper => PaperEntity::find_by_id(item_id)
                .one(self.read_conn())
                .await?
                .map(|paper| !paper.is_removed)
                .unwrap_or(false),
            ContentKind::Post => PostEntity::find_by_id(item_id)
                .one(self.read_conn())
                .await?
                .map(|post| !post.is_removed)
                .unwrap_or(false),
            ContentKind::Comment => CommentEntity::find_by_id(item_id)
                .one(self.read_conn())
                .await?
                .map(|comment| !comment.is_removed)
                .unwrap_or(false),
            ContentKind::Bounty => BountyEntity::find_by_id(item_id)
                .one(self.read_conn())
                .await?
                .is_some(),
        };

        Ok(live)
    }

    /// Find a comment by ID
    pub async fn find_comment(&self, id: i64) -> Result<Option<Comment>> {
        CommentEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Find a bounty by ID
    pub async fn find_bounty(&self, id: i64) -> Result<Option<Bounty>> {
        BountyEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }
}

/// Score-maintenance surface of the repository.
///
/// The worker depends on this trait rather than on [`Repository`] so its
/// processing logic can be exercised against an in-memory store.
#[async_trait]
pub trait FeedScoreStore: Send + Sync {
    async fn find_entry(&self, id: i64) -> Result<Option<FeedEntry>>;

    async fn entries_for_item(&self, kind: ContentKind, item_id: i64) -> Result<Vec<FeedEntry>>;

    async fn entries_for_unified_document(
        &self,
        unified_document_id: i64,
    ) -> Result<Vec<FeedEntry>>;

    async fn entry_ids_for_user(&self, user_id: i64) -> Result<Vec<i64>>;

    async fn entries_after(&self, cursor: i64, limit: u64) -> Result<Vec<FeedEntry>>;

    async fn item_is_live(&self, kind: ContentKind, item_id: i64) -> Result<bool>;

    async fn update_entry_scores(
        &self,
        entry_id: i64,
        hot_score: i64,
        hot_score_v2: i64,
    ) -> Result<()>;

    async fn bulk_update_scores(&self, updates: &[ScoreUpdate]) -> Result<u64>;

    async fn find_comment(&self, id: i64) -> Result<Option<Comment>>;

    async fn find_bounty(&self, id: i64) -> Result<Option<Bounty>>;
}

#[async_trait]
impl FeedScoreStore for Repository {
    async fn find_entry(&self, id: i64) -> Result<Option<FeedEntry>> {
        Repository::find_entry(self, id).await
    }

    async fn entries_for_item(&self, kind: ContentKind, item_id: i64) -> Result<Vec<FeedEntry>> {
        Repository::entries_for_item(self, kind, item_id).await
    }

    async fn entries_for_unified_document(
        &self,
        unified_document_id: i64,
    ) -> Result<Vec<FeedEntry>> {
        Repository::entries_for_unified_document(self, unified_document_id).await
    }

    async fn entry_ids_for_user(&self, user_id: i64) -> Result<Vec<i64>> {
        Repository::entry_ids_for_user(self, user_id).await
    }

    async fn entries_after(&self, cursor: i64, limit: u64) -> Result<Vec<FeedEntry>> {
        Repository::entries_after(self, cursor, limit).await
    }

    async fn item_is_live(&self, kind: ContentKind, item_id: i64) -> Result<bool> {
        Repository::item_is_live(self, kind, item_id).await
    }

    async fn update_entry_scores(
        &self,
        entry_id: i64,
        hot_score: i64,
        hot_score_v2: i64,
    ) -> Result<()> {
        Repository::update_entry_scores(self, entry_id, hot_score, hot_score_v2).await
    }

    async fn bulk_update_scores(&self, updates: &[ScoreUpdate]) -> Result<u64> {
        Repository::bulk_update_scores(self, updates).await
    }

    async fn find_comment(&self, id: i64) -> Result<Option<Comment>> {
        Repository::find_comment(self, id).await
    }

    async fn find_bounty(&self, id: i64) -> Result<Option<Bounty>> {
        Repository::find_bounty(self, id).await
    }
}
