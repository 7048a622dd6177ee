//! Subscription entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Subscription plan.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionPlan {
    #[sea_orm(string_value = "free")]
    #[default]
    Free,
    #[sea_orm(string_value = "premium")]
    Premium,
}

/// Subscription lifecycle status.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    #[sea_orm(string_value = "active")]
    #[default]
    Active,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
    #[sea_orm(string_value = "expired")]
    Expired,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "subscription")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(indexed)]
    pub user_id: String,

    pub plan: SubscriptionPlan,

    /// Amount paid in minor units
    pub price_cents: i64,

    /// ISO 4217 currency code
    pub currency: String,

    /// Payment provider order reference
    #[sea_orm(nullable, unique)]
    pub order_ref: Option<String>,

    pub status: SubscriptionStatus,

    /// At most one active subscription per user
    #[sea_orm(default_value = true)]
    pub is_active: bool,

    pub start_date: DateTimeWithTimeZone,

    /// `None` for plans without a fixed end
    #[sea_orm(nullable)]
    pub end_date: Option<DateTimeWithTimeZone>,

    pub created_at: DateTimeWithTimeZone,

    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeWithTimeZone>,
}

impl Model {
    /// Whether the subscription period has ended at `now`.
    #[must_use]
    pub fn has_expired(&self, now: DateTimeWithTimeZone) -> bool {
        self.end_date.is_some_and(|end| now > end)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
