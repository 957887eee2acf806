//! Paper item entity
//!
//! Authoritative row the refresher checks feed entries against. Only the
//! columns the feed side reads are mapped.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "papers")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub unified_document_id: Option<i64>,

    #[sea_orm(column_type = "Text")]
    pub title: String,

    pub is_removed: bool,

    pub uploaded_by_id: Option<i64>,

    pub created_date: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
