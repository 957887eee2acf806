//! Feed entry entity
//!
//! One row per (content item, feed action). The `content` and `metrics`
//! columns hold the denormalized JSON snapshots that scoring reads; both
//! hot score columns are maintained side by side for ranking comparison.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Kind of content item a feed entry points at
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContentKind {
    Paper,
    Post,
    Comment,
    Bounty,
}

impl ContentKind {
    pub const ALL: [ContentKind; 4] = [
        ContentKind::Paper,
        ContentKind::Post,
        ContentKind::Comment,
        ContentKind::Bounty,
    ];

    /// Parse the stored column value. Unknown strings yield `None` so
    /// callers can treat corrupt rows as unresolvable instead of guessing.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PAPER" => Some(ContentKind::Paper),
            "POST" => Some(ContentKind::Post),
            "COMMENT" => Some(ContentKind::Comment),
            "BOUNTY" => Some(ContentKind::Bounty),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Paper => "PAPER",
            ContentKind::Post => "POST",
            ContentKind::Comment => "COMMENT",
            ContentKind::Bounty => "BOUNTY",
        }
    }
}

impl From<ContentKind> for String {
    fn from(kind: ContentKind) -> Self {
        kind.as_str().to_string()
    }
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Feed action that created the entry
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeedAction {
    Open,
    Publish,
}

impl FeedAction {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "OPEN" => Some(FeedAction::Open),
            "PUBLISH" => Some(FeedAction::Publish),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FeedAction::Open => "OPEN",
            FeedAction::Publish => "PUBLISH",
        }
    }
}

impl From<FeedAction> for String {
    fn from(action: FeedAction) -> Self {
        action.as_str().to_string()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "feed_entries")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    #[sea_orm(column_type = "Text")]
    pub content_kind: String,

    pub item_id: i64,

    pub unified_document_id: Option<i64>,

    #[sea_orm(column_type = "Text")]
    pub action: String,

    pub action_date: DateTimeWithTimeZone,

    /// Denormalized item snapshot as JSONB
    #[sea_orm(column_type = "JsonBinary")]
    pub content: serde_json::Value,

    /// Denormalized aggregate counters as JSONB
    #[sea_orm(column_type = "JsonBinary")]
    pub metrics: serde_json::Value,

    pub hot_score: i64,

    pub hot_score_v2: i64,

    pub user_id: Option<i64>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    /// Get the content kind as an enum; `None` for unknown column values
    pub fn kind(&self) -> Option<ContentKind> {
        ContentKind::parse(&self.content_kind)
    }

    /// Get the feed action as an enum
    pub fn feed_action(&self) -> Option<FeedAction> {
        FeedAction::parse(&self.action)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::feed_entry_hub::Entity")]
    FeedEntryHubs,
}

impl Related<super::feed_entry_hub::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FeedEntryHubs.def()
    }
}

impl Related<super::hub::Entity> for Entity {
    fn to() -> RelationDef {
        super::feed_entry_hub::Relation::Hub.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::feed_entry_hub::Relation::FeedEntry.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_kind_round_trip() {
        for kind in ContentKind::ALL {
            assert_eq!(ContentKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ContentKind::parse("HUB"), None);
        assert_eq!(ContentKind::parse("paper"), None);
    }

    #[test]
    fn test_feed_action_round_trip() {
        assert_eq!(FeedAction::parse("OPEN"), Some(FeedAction::Open));
        assert_eq!(FeedAction::parse("PUBLISH"), Some(FeedAction::Publish));
        assert_eq!(FeedAction::parse("CONTRIBUTE"), None);
        assert_eq!(String::from(FeedAction::Publish), "PUBLISH");
    }
}
