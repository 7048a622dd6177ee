//! Subscription repository.

use std::sync::Arc;

use crate::entities::{Subscription, User, subscription, user};
use livenest_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait, sea_query::Expr,
};

/// Subscription repository for database operations.
#[derive(Clone)]
pub struct SubscriptionRepository {
    db: Arc<DatabaseConnection>,
}

impl SubscriptionRepository {
    /// Create a new subscription repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// The user's active subscription, if any.
    pub async fn find_active_by_user(
        &self,
        user_id: &str,
    ) -> AppResult<Option<subscription::Model>> {
        Subscription::find()
            .filter(subscription::Column::UserId.eq(user_id))
            .filter(subscription::Column::IsActive.eq(true))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a subscription by payment order reference.
    pub async fn find_by_order_ref(
        &self,
        order_ref: &str,
    ) -> AppResult<Option<subscription::Model>> {
        Subscription::find()
            .filter(subscription::Column::OrderRef.eq(order_ref))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// All of a user's subscriptions, newest first.
    pub async fn find_by_user(
        &self,
        user_id: &str,
        limit: u64,
    ) -> AppResult<Vec<subscription::Model>> {
        Subscription::find()
            .filter(subscription::Column::UserId.eq(user_id))
            .order_by_desc(subscription::Column::CreatedAt)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Record a captured subscription and set the subscriber's premium flag.
    ///
    /// Both writes happen in one transaction.
    pub async fn activate(
        &self,
        model: subscription::ActiveModel,
        user_id: &str,
    ) -> AppResult<subscription::Model> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let created = model
            .insert(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        User::update_many()
            .col_expr(user::Column::IsPremium, Expr::value(true))
            .col_expr(
                user::Column::UpdatedAt,
                Expr::value(chrono::Utc::now().fixed_offset()),
            )
            .filter(user::Column::Id.eq(user_id))
            .exec(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(created)
    }

    /// Move an active subscription to a terminal status and clear the
    /// subscriber's premium flag, in one transaction.
    pub async fn close(
        &self,
        subscription: subscription::Model,
        status: subscription::SubscriptionStatus,
    ) -> AppResult<subscription::Model> {
        let user_id = subscription.user_id.clone();
        let now = chrono::Utc::now().fixed_offset();

        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let mut active = subscription.into_active_model();
        active.status = Set(status);
        active.is_active = Set(false);
        active.updated_at = Set(Some(now));
        let closed = active
            .update(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        User::update_many()
            .col_expr(user::Column::IsPremium, Expr::value(false))
            .col_expr(user::Column::UpdatedAt, Expr::value(now))
            .filter(user::Column::Id.eq(user_id))
            .exec(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(closed)
    }
}
