//! Message repository.

use std::sync::Arc;

use crate::entities::{Conversation, Message, conversation, message};
use livenest_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, TransactionTrait, sea_query::Expr,
};

/// Message repository for database operations.
#[derive(Clone)]
pub struct MessageRepository {
    db: Arc<DatabaseConnection>,
}

impl MessageRepository {
    /// Create a new message repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Insert a message and bump its conversation's `updated_at`, in one
    /// transaction.
    pub async fn create(&self, model: message::ActiveModel) -> AppResult<message::Model> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let created = model
            .insert(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Conversation::update_many()
            .col_expr(
                conversation::Column::UpdatedAt,
                Expr::value(created.created_at),
            )
            .filter(conversation::Column::Id.eq(created.conversation_id.as_str()))
            .exec(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(created)
    }

    /// Messages in a conversation, newest first (paginated by ID).
    pub async fn find_by_conversation(
        &self,
        conversation_id: &str,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<message::Model>> {
        let mut query = Message::find()
            .filter(message::Column::ConversationId.eq(conversation_id))
            .order_by_desc(message::Column::Id);

        if let Some(id) = until_id {
            query = query.filter(message::Column::Id.lt(id));
        }

        query
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// The newest message of a conversation.
    pub async fn find_latest(&self, conversation_id: &str) -> AppResult<Option<message::Model>> {
        Message::find()
            .filter(message::Column::ConversationId.eq(conversation_id))
            .order_by_desc(message::Column::Id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, IntoActiveModel, MockDatabase, MockExecResult};

    fn create_test_message(id: &str, conversation_id: &str) -> message::Model {
        message::Model {
            id: id.to_string(),
            conversation_id: conversation_id.to_string(),
            sender_id: "a".to_string(),
            text: "hi".to_string(),
            created_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_create_bumps_conversation() {
        let msg = create_test_message("m1", "c1");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[msg.clone()]])
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }])
                .into_connection(),
        );

        let repo = MessageRepository::new(db);
        let created = repo.create(msg.into_active_model()).await.unwrap();

        assert_eq!(created.id, "m1");
    }

    #[tokio::test]
    async fn test_find_by_conversation() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[
                    create_test_message("m2", "c1"),
                    create_test_message("m1", "c1"),
                ]])
                .into_connection(),
        );

        let repo = MessageRepository::new(db);
        let result = repo.find_by_conversation("c1", 20, None).await.unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(result[0].id, "m2");
    }
}
