//! Post report entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "report")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// The reported post.
    pub post_id: String,
    /// The user who submitted the report.
    pub reporter_id: String,
    /// Reason given by the reporter.
    #[sea_orm(column_type = "Text")]
    pub reason: String,
    /// Whether an administrator has reviewed the report.
    pub is_reviewed: bool,
    /// Soft-delete flag. Deleted reports no longer block a new report.
    pub is_deleted: bool,
    /// When the report was created.
    pub created_at: DateTimeWithTimeZone,
    /// When the report was reviewed.
    pub reviewed_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::post::Entity",
        from = "Column::PostId",
        to = "super::post::Column::Id"
    )]
    Post,
}

impl Related<super::post::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Post.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
