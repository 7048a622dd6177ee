//! Post repository.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::entities::{Post, post};
use livenest_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, sea_query::Expr,
};

/// Post repository for database operations.
#[derive(Clone)]
pub struct PostRepository {
    db: Arc<DatabaseConnection>,
}

impl PostRepository {
    /// Create a new post repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a post by ID, including soft-deleted posts.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<post::Model>> {
        Post::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a post by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<post::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::PostNotFound(id.to_string()))
    }

    /// Create a new post.
    pub async fn create(&self, model: post::ActiveModel) -> AppResult<post::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Update a post.
    pub async fn update(&self, model: post::ActiveModel) -> AppResult<post::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Posts by a user that are not deleted, newest first.
    pub async fn find_by_user(
        &self,
        user_id: &str,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<post::Model>> {
        Post::find()
            .filter(post::Column::UserId.eq(user_id))
            .filter(post::Column::IsDeleted.eq(false))
            .order_by_desc(post::Column::CreatedAt)
            .limit(limit)
            .offset(offset)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count a user's posts that are not deleted.
    pub async fn count_by_user(&self, user_id: &str) -> AppResult<u64> {
        Post::find()
            .filter(post::Column::UserId.eq(user_id))
            .filter(post::Column::IsDeleted.eq(false))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Posts written by any of `author_ids` that are not deleted, newest first.
    pub async fn find_by_authors(
        &self,
        author_ids: &[String],
        limit: u64,
    ) -> AppResult<Vec<post::Model>> {
        if author_ids.is_empty() {
            return Ok(vec![]);
        }

        Post::find()
            .filter(post::Column::UserId.is_in(author_ids.to_vec()))
            .filter(post::Column::IsDeleted.eq(false))
            .order_by_desc(post::Column::CreatedAt)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Distinct tags used on a user's posts that are not deleted.
    pub async fn tags_of_user(&self, user_id: &str) -> AppResult<BTreeSet<String>> {
        let rows: Vec<serde_json::Value> = Post::find()
            .select_only()
            .column(post::Column::Tags)
            .filter(post::Column::UserId.eq(user_id))
            .filter(post::Column::IsDeleted.eq(false))
            .into_tuple()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(rows
            .into_iter()
            .filter_map(|tags| serde_json::from_value::<Vec<String>>(tags).ok())
            .flatten()
            .collect())
    }

    /// Posts by other authors sharing at least one of `tags`, newest first.
    ///
    /// Uses JSONB containment (`tags @> '["tag"]'`) for each tag.
    pub async fn find_by_any_tag(
        &self,
        tags: &BTreeSet<String>,
        exclude_user_id: &str,
        limit: u64,
    ) -> AppResult<Vec<post::Model>> {
        if tags.is_empty() {
            return Ok(vec![]);
        }

        let mut any_tag = Condition::any();
        for tag in tags {
            let tag_json = serde_json::json!([tag]).to_string();
            any_tag = any_tag.add(Expr::cust_with_values(
                r#""post"."tags" @> $1::jsonb"#,
                [tag_json],
            ));
        }

        Post::find()
            .filter(any_tag)
            .filter(post::Column::UserId.ne(exclude_user_id))
            .filter(post::Column::IsDeleted.eq(false))
            .order_by_desc(post::Column::CreatedAt)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Most recent posts by other authors that are not deleted.
    pub async fn find_recent_excluding(
        &self,
        exclude_user_id: &str,
        limit: u64,
    ) -> AppResult<Vec<post::Model>> {
        Post::find()
            .filter(post::Column::UserId.ne(exclude_user_id))
            .filter(post::Column::IsDeleted.eq(false))
            .order_by_desc(post::Column::CreatedAt)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
