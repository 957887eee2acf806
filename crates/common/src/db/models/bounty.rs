//! Bounty item entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "bounties")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// Lifecycle status (OPEN, CLOSED, EXPIRED)
    #[sea_orm(column_type = "Text")]
    pub status: String,

    #[sea_orm(column_type = "Double")]
    pub amount: f64,

    /// Kind of the item the bounty is attached to
    #[sea_orm(column_type = "Text")]
    pub item_content_kind: String,

    pub item_id: i64,

    pub unified_document_id: Option<i64>,

    pub expiration_date: Option<DateTimeWithTimeZone>,

    pub created_by_id: Option<i64>,

    pub created_date: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
