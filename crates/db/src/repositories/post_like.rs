//! Post like repository.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::entities::{PostLike, post_like};
use livenest_common::{AppError, AppResult};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, FromQueryResult, PaginatorTrait, QueryFilter,
    QuerySelect, Set, TransactionTrait,
    sea_query::{Expr, OnConflict},
};

#[derive(Debug, FromQueryResult)]
struct LikeCount {
    post_id: String,
    count: i64,
}

/// Post like repository for database operations.
#[derive(Clone)]
pub struct PostLikeRepository {
    db: Arc<DatabaseConnection>,
}

impl PostLikeRepository {
    /// Create a new post like repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Flip a user's membership in a post's like set.
    ///
    /// Set-remove first; if nothing was removed, set-add with
    /// `ON CONFLICT DO NOTHING`. No count is ever written, so concurrent
    /// toggles by different users cannot lose updates.
    ///
    /// Returns `true` if the user now likes the post.
    pub async fn toggle(&self, like_id: String, user_id: &str, post_id: &str) -> AppResult<bool> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let removed = PostLike::delete_many()
            .filter(post_like::Column::UserId.eq(user_id))
            .filter(post_like::Column::PostId.eq(post_id))
            .exec(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let liked = if removed.rows_affected > 0 {
            false
        } else {
            let like = post_like::ActiveModel {
                id: Set(like_id),
                user_id: Set(user_id.to_string()),
                post_id: Set(post_id.to_string()),
                created_at: Set(chrono::Utc::now().into()),
            };
            PostLike::insert(like)
                .on_conflict(
                    OnConflict::columns([post_like::Column::UserId, post_like::Column::PostId])
                        .do_nothing()
                        .to_owned(),
                )
                .exec_without_returning(&txn)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
            true
        };

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(liked)
    }

    /// Check if a user likes a post.
    pub async fn is_liked(&self, user_id: &str, post_id: &str) -> AppResult<bool> {
        let found = PostLike::find()
            .filter(post_like::Column::UserId.eq(user_id))
            .filter(post_like::Column::PostId.eq(post_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(found.is_some())
    }

    /// Size of a post's like set.
    pub async fn count_by_post(&self, post_id: &str) -> AppResult<u64> {
        PostLike::find()
            .filter(post_like::Column::PostId.eq(post_id))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Like set sizes for several posts. Posts without likes are absent.
    pub async fn count_by_posts(&self, post_ids: &[String]) -> AppResult<HashMap<String, u64>> {
        if post_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = PostLike::find()
            .select_only()
            .column(post_like::Column::PostId)
            .column_as(Expr::col(post_like::Column::Id).count(), "count")
            .filter(post_like::Column::PostId.is_in(post_ids.to_vec()))
            .group_by(post_like::Column::PostId)
            .into_model::<LikeCount>()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|row| (row.post_id, u64::try_from(row.count).unwrap_or_default()))
            .collect())
    }

    /// Which of `post_ids` the user likes.
    pub async fn liked_post_ids(
        &self,
        user_id: &str,
        post_ids: &[String],
    ) -> AppResult<HashSet<String>> {
        if post_ids.is_empty() {
            return Ok(HashSet::new());
        }

        let rows = PostLike::find()
            .filter(post_like::Column::UserId.eq(user_id))
            .filter(post_like::Column::PostId.is_in(post_ids.to_vec()))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(rows.into_iter().map(|like| like.post_id).collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use maplit::btreemap;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn create_test_like(id: &str, user_id: &str, post_id: &str) -> post_like::Model {
        post_like::Model {
            id: id.to_string(),
            user_id: user_id.to_string(),
            post_id: post_id.to_string(),
            created_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_toggle_adds_when_absent() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([
                    MockExecResult {
                        last_insert_id: 0,
                        rows_affected: 0,
                    },
                    MockExecResult {
                        last_insert_id: 0,
                        rows_affected: 1,
                    },
                ])
                .into_connection(),
        );

        let repo = PostLikeRepository::new(db);
        assert!(repo.toggle("l1".to_string(), "u1", "p1").await.unwrap());
    }

    #[tokio::test]
    async fn test_toggle_removes_when_present() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }])
                .into_connection(),
        );

        let repo = PostLikeRepository::new(db);
        assert!(!repo.toggle("l1".to_string(), "u1", "p1").await.unwrap());
    }

    #[tokio::test]
    async fn test_count_by_post() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([vec![
                    btreemap! { "num_items" => sea_orm::Value::BigInt(Some(3)) },
                ]])
                .into_connection(),
        );

        let repo = PostLikeRepository::new(db);
        assert_eq!(repo.count_by_post("p1").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_count_by_posts() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([vec![
                    btreemap! {
                        "post_id" => sea_orm::Value::String(Some(Box::new("p1".to_string()))),
                        "count" => sea_orm::Value::BigInt(Some(2)),
                    },
                ]])
                .into_connection(),
        );

        let repo = PostLikeRepository::new(db);
        let counts = repo
            .count_by_posts(&["p1".to_string(), "p2".to_string()])
            .await
            .unwrap();

        assert_eq!(counts.get("p1"), Some(&2));
        assert_eq!(counts.get("p2"), None);
    }

    #[tokio::test]
    async fn test_liked_post_ids() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_like("l1", "u1", "p2")]])
                .into_connection(),
        );

        let repo = PostLikeRepository::new(db);
        let liked = repo
            .liked_post_ids("u1", &["p1".to_string(), "p2".to_string()])
            .await
            .unwrap();

        assert!(liked.contains("p2"));
        assert!(!liked.contains("p1"));
    }
}
