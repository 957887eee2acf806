//! Hub entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "hubs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    #[sea_orm(column_type = "Text")]
    pub name: String,

    #[sea_orm(column_type = "Text", unique)]
    pub slug: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::feed_entry_hub::Entity")]
    FeedEntryHubs,

    #[sea_orm(has_many = "super::user_hub_follow::Entity")]
    Follows,
}

impl Related<super::feed_entry_hub::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FeedEntryHubs.def()
    }
}

impl Related<super::user_hub_follow::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Follows.def()
    }
}

impl Related<super::feed_entry::Entity> for Entity {
    fn to() -> RelationDef {
        super::feed_entry_hub::Relation::FeedEntry.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::feed_entry_hub::Relation::Hub.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
