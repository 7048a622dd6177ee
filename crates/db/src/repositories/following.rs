//! Following repository.

use std::sync::Arc;

use crate::entities::{Following, User, following, user};
use livenest_common::{AppError, AppResult};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait, sea_query::OnConflict,
};

/// Following repository for database operations.
#[derive(Clone)]
pub struct FollowingRepository {
    db: Arc<DatabaseConnection>,
}

impl FollowingRepository {
    /// Create a new following repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a following relationship by follower and followee.
    pub async fn find_by_pair(
        &self,
        follower_id: &str,
        followee_id: &str,
    ) -> AppResult<Option<following::Model>> {
        Following::find()
            .filter(following::Column::FollowerId.eq(follower_id))
            .filter(following::Column::FolloweeId.eq(followee_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Check if a user is following another user.
    pub async fn is_following(&self, follower_id: &str, followee_id: &str) -> AppResult<bool> {
        Ok(self.find_by_pair(follower_id, followee_id).await?.is_some())
    }

    /// Flip the follow edge between two users.
    ///
    /// Runs in one transaction that locks both user rows in ascending id
    /// order, so concurrent toggles on the same pair serialize. The edge is a
    /// single row: removing it clears both sides at once, and inserting it
    /// uses `ON CONFLICT DO NOTHING` against the `(follower_id, followee_id)`
    /// unique index.
    ///
    /// Returns `true` if the follower now follows the followee. A missing or
    /// deleted followee is `UserNotFound`.
    pub async fn toggle(
        &self,
        edge_id: String,
        follower_id: &str,
        followee_id: &str,
    ) -> AppResult<bool> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let locked = User::find()
            .filter(user::Column::Id.is_in([follower_id, followee_id]))
            .order_by_asc(user::Column::Id)
            .lock_exclusive()
            .all(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let followee_exists = locked
            .iter()
            .any(|u| u.id == followee_id && !u.is_deleted);
        if !followee_exists {
            return Err(AppError::UserNotFound(followee_id.to_string()));
        }

        let removed = Following::delete_many()
            .filter(following::Column::FollowerId.eq(follower_id))
            .filter(following::Column::FolloweeId.eq(followee_id))
            .exec(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let now_following = if removed.rows_affected > 0 {
            false
        } else {
            let edge = following::ActiveModel {
                id: Set(edge_id),
                follower_id: Set(follower_id.to_string()),
                followee_id: Set(followee_id.to_string()),
                created_at: Set(chrono::Utc::now().into()),
            };
            Following::insert(edge)
                .on_conflict(
                    OnConflict::columns([
                        following::Column::FollowerId,
                        following::Column::FolloweeId,
                    ])
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

        Ok(now_following)
    }

    /// IDs of every user a user follows.
    pub async fn following_ids(&self, user_id: &str) -> AppResult<Vec<String>> {
        let rows = Following::find()
            .filter(following::Column::FollowerId.eq(user_id))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(rows.into_iter().map(|f| f.followee_id).collect())
    }

    /// Get users that a user is following (paginated).
    pub async fn find_following(
        &self,
        user_id: &str,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<following::Model>> {
        let mut query = Following::find()
            .filter(following::Column::FollowerId.eq(user_id))
            .order_by_desc(following::Column::Id);

        if let Some(id) = until_id {
            query = query.filter(following::Column::Id.lt(id));
        }

        query
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get users that are following a user (paginated).
    pub async fn find_followers(
        &self,
        user_id: &str,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<following::Model>> {
        let mut query = Following::find()
            .filter(following::Column::FolloweeId.eq(user_id))
            .order_by_desc(following::Column::Id);

        if let Some(id) = until_id {
            query = query.filter(following::Column::Id.lt(id));
        }

        query
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count followers of a user.
    pub async fn count_followers(&self, user_id: &str) -> AppResult<u64> {
        Following::find()
            .filter(following::Column::FolloweeId.eq(user_id))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count following of a user.
    pub async fn count_following(&self, user_id: &str) -> AppResult<u64> {
        Following::find()
            .filter(following::Column::FollowerId.eq(user_id))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
