//! Feed entry / hub join table

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "feed_entry_hubs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub feed_entry_id: i64,

    #[sea_orm(primary_key, auto_increment = false)]
    pub hub_id: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::feed_entry::Entity",
        from = "Column::FeedEntryId",
        to = "super::feed_entry::Column::Id"
    )]
    FeedEntry,

    #[sea_orm(
        belongs_to = "super::hub::Entity",
        from = "Column::HubId",
        to = "super::hub::Column::Id"
    )]
    Hub,
}

impl Related<super::feed_entry::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FeedEntry.def()
    }
}

impl Related<super::hub::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Hub.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
