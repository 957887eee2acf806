//! Post item entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "posts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub unified_document_id: Option<i64>,

    #[sea_orm(column_type = "Text")]
    pub title: String,

    /// Document type tag (e.g. DISCUSSION, GRANT, PREREGISTRATION)
    #[sea_orm(column_type = "Text")]
    pub document_type: String,

    pub is_removed: bool,

    pub created_by_id: Option<i64>,

    pub created_date: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
