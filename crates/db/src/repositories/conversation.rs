//! Conversation repository.

use std::sync::Arc;

use crate::entities::{Conversation, conversation};
use livenest_common::{AppError, AppResult};
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
    Set, sea_query::OnConflict,
};

/// Conversation repository for database operations.
#[derive(Clone)]
pub struct ConversationRepository {
    db: Arc<DatabaseConnection>,
}

impl ConversationRepository {
    /// Create a new conversation repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a conversation by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<conversation::Model>> {
        Conversation::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a conversation by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<conversation::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Conversation {id}")))
    }

    /// Find the conversation between two users, in either order.
    pub async fn find_by_pair(
        &self,
        user_id: &str,
        other_id: &str,
    ) -> AppResult<Option<conversation::Model>> {
        let (a, b) = conversation::ordered_pair(user_id, other_id);
        Conversation::find()
            .filter(conversation::Column::UserAId.eq(a))
            .filter(conversation::Column::UserBId.eq(b))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Return the conversation between two users, creating it if needed.
    ///
    /// The boolean is `true` when this call created the conversation. Two
    /// concurrent callers for the same pair converge on one row through the
    /// unique `(user_a_id, user_b_id)` index.
    pub async fn find_or_create(
        &self,
        new_id: String,
        user_id: &str,
        other_id: &str,
    ) -> AppResult<(conversation::Model, bool)> {
        if let Some(existing) = self.find_by_pair(user_id, other_id).await? {
            return Ok((existing, false));
        }

        let (a, b) = conversation::ordered_pair(user_id, other_id);
        let now = chrono::Utc::now().fixed_offset();
        let model = conversation::ActiveModel {
            id: Set(new_id),
            user_a_id: Set(a.to_string()),
            user_b_id: Set(b.to_string()),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let inserted = Conversation::insert(model)
            .on_conflict(
                OnConflict::columns([
                    conversation::Column::UserAId,
                    conversation::Column::UserBId,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let conversation = self
            .find_by_pair(user_id, other_id)
            .await?
            .ok_or_else(|| AppError::Internal("Conversation vanished after insert".to_string()))?;

        Ok((conversation, inserted > 0))
    }

    /// Conversations a user takes part in, most recently active first.
    pub async fn find_by_user(
        &self,
        user_id: &str,
        limit: u64,
    ) -> AppResult<Vec<conversation::Model>> {
        Conversation::find()
            .filter(
                Condition::any()
                    .add(conversation::Column::UserAId.eq(user_id))
                    .add(conversation::Column::UserBId.eq(user_id)),
            )
            .order_by_desc(conversation::Column::UpdatedAt)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn create_test_conversation(id: &str, a: &str, b: &str) -> conversation::Model {
        let now = Utc::now();
        conversation::Model {
            id: id.to_string(),
            user_a_id: a.to_string(),
            user_b_id: b.to_string(),
            created_at: now.into(),
            updated_at: now.into(),
        }
    }

    #[test]
    fn test_ordered_pair() {
        assert_eq!(conversation::ordered_pair("b", "a"), ("a", "b"));
        assert_eq!(conversation::ordered_pair("a", "b"), ("a", "b"));
    }

    #[tokio::test]
    async fn test_find_or_create_returns_existing() {
        let existing = create_test_conversation("c1", "a", "b");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[existing]])
                .into_connection(),
        );

        let repo = ConversationRepository::new(db);
        let (conversation, created) = repo.find_or_create("c2".to_string(), "b", "a").await.unwrap();

        assert_eq!(conversation.id, "c1");
        assert!(!created);
    }

    #[tokio::test]
    async fn test_find_or_create_inserts_new() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<conversation::Model>::new()])
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }])
                .append_query_results([[create_test_conversation("c2", "a", "b")]])
                .into_connection(),
        );

        let repo = ConversationRepository::new(db);
        let (conversation, created) = repo.find_or_create("c2".to_string(), "b", "a").await.unwrap();

        assert_eq!(conversation.id, "c2");
        assert_eq!(conversation.other_participant("b"), "a");
        assert!(created);
    }
}
