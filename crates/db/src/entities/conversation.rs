//! Direct conversation entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "conversation")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Lexicographically smaller participant ID
    pub user_a_id: String,

    /// Lexicographically larger participant ID
    pub user_b_id: String,

    pub created_at: DateTimeWithTimeZone,

    /// Time of the latest message
    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    /// Whether `user_id` takes part in this conversation.
    #[must_use]
    pub fn has_participant(&self, user_id: &str) -> bool {
        self.user_a_id == user_id || self.user_b_id == user_id
    }

    /// The participant that is not `user_id`.
    #[must_use]
    pub fn other_participant(&self, user_id: &str) -> &str {
        if self.user_a_id == user_id {
            &self.user_b_id
        } else {
            &self.user_a_id
        }
    }
}

/// Order a participant pair the way it is stored.
#[must_use]
pub fn ordered_pair<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
    if a <= b { (a, b) } else { (b, a) }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::message::Entity")]
    Messages,
}

impl Related<super::message::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Messages.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
