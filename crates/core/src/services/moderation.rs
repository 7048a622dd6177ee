//! Moderation service: reports, account blocking and user listing.

use chrono::Utc;
use livenest_common::{AppError, AppResult, IdGenerator};
use livenest_db::{
    entities::{report, user},
    repositories::{PostRepository, ReportRepository, UserRepository},
};
use sea_orm::{IntoActiveModel, Set};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::services::pagination::Page;
use crate::services::visibility::Viewer;

/// Input for reporting a post.
#[derive(Debug, Deserialize, Validate)]
pub struct ReportInput {
    #[validate(length(min = 1, max = 500))]
    pub reason: String,
}

/// One page of accounts with the total number of live accounts.
#[derive(Debug, Clone, Serialize)]
pub struct UserPage {
    pub users: Vec<user::Model>,
    pub total: u64,
}

/// Moderation service for business logic.
#[derive(Clone)]
pub struct ModerationService {
    report_repo: ReportRepository,
    post_repo: PostRepository,
    user_repo: UserRepository,
    id_gen: IdGenerator,
}

impl ModerationService {
    /// Create a new moderation service.
    #[must_use]
    pub const fn new(
        report_repo: ReportRepository,
        post_repo: PostRepository,
        user_repo: UserRepository,
    ) -> Self {
        Self {
            report_repo,
            post_repo,
            user_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// File a report against a post. A user can hold one live report per post.
    pub async fn report(
        &self,
        reporter: &Viewer,
        post_id: &str,
        input: ReportInput,
    ) -> AppResult<report::Model> {
        input.validate()?;
        let reason = input.reason.trim().to_string();
        if reason.is_empty() {
            return Err(AppError::Validation("Report reason is empty".to_string()));
        }

        let post = self.post_repo.get_by_id(post_id).await?;
        if post.is_deleted {
            return Err(AppError::PostNotFound(post_id.to_string()));
        }

        if self
            .report_repo
            .find_live(post_id, &reporter.id)
            .await?
            .is_some()
        {
            return Err(AppError::InvalidOperation(
                "You have already reported this post".to_string(),
            ));
        }

        let model = report::ActiveModel {
            id: Set(self.id_gen.generate()),
            post_id: Set(post_id.to_string()),
            reporter_id: Set(reporter.id.clone()),
            reason: Set(reason),
            is_reviewed: Set(false),
            is_deleted: Set(false),
            created_at: Set(Utc::now().fixed_offset()),
            reviewed_at: Set(None),
        };

        let created = self.report_repo.create(model).await.map_err(|e| match e {
            AppError::Database(msg) if msg.contains("duplicate key") => {
                AppError::InvalidOperation("You have already reported this post".to_string())
            }
            other => other,
        })?;

        tracing::info!(report_id = %created.id, post_id = %post_id, "Post reported");
        Ok(created)
    }

    /// Live reports, newest first.
    pub async fn list_reports(
        &self,
        viewer: &Viewer,
        include_reviewed: bool,
        page: Page,
    ) -> AppResult<Vec<report::Model>> {
        require_admin(viewer)?;
        self.report_repo
            .list(include_reviewed, page.limit(), page.offset())
            .await
    }

    /// Mark a report as reviewed.
    pub async fn mark_reviewed(&self, viewer: &Viewer, report_id: &str) -> AppResult<report::Model> {
        require_admin(viewer)?;
        let report = self.report_repo.get_by_id(report_id).await?;

        let mut active = report.into_active_model();
        active.is_reviewed = Set(true);
        active.reviewed_at = Set(Some(Utc::now().fixed_offset()));
        self.report_repo.update(active).await
    }

    /// Soft-delete a report.
    pub async fn delete_report(&self, viewer: &Viewer, report_id: &str) -> AppResult<()> {
        require_admin(viewer)?;
        let report = self.report_repo.get_by_id(report_id).await?;

        let mut active = report.into_active_model();
        active.is_deleted = Set(true);
        self.report_repo.update(active).await?;
        Ok(())
    }

    /// Block an account. Blocked users cannot sign in or act.
    pub async fn block_user(&self, viewer: &Viewer, user_id: &str) -> AppResult<user::Model> {
        require_admin(viewer)?;
        if viewer.id == user_id {
            return Err(AppError::InvalidOperation(
                "Cannot block yourself".to_string(),
            ));
        }
        self.set_blocked(user_id, true).await
    }

    /// Lift a block.
    pub async fn unblock_user(&self, viewer: &Viewer, user_id: &str) -> AppResult<user::Model> {
        require_admin(viewer)?;
        self.set_blocked(user_id, false).await
    }

    /// Live accounts, newest first.
    pub async fn list_users(&self, viewer: &Viewer, page: Page) -> AppResult<UserPage> {
        require_admin(viewer)?;
        let users = self.user_repo.list(page.limit(), page.offset()).await?;
        let total = self.user_repo.count().await?;
        Ok(UserPage { users, total })
    }

    async fn set_blocked(&self, user_id: &str, blocked: bool) -> AppResult<user::Model> {
        let user = self.user_repo.get_existing(user_id).await?;

        let mut active = user.into_active_model();
        active.is_blocked = Set(blocked);
        active.updated_at = Set(Some(Utc::now().fixed_offset()));
        let updated = self.user_repo.update(active).await?;

        tracing::info!(user_id = %user_id, blocked, "Changed block state");
        Ok(updated)
    }
}

fn require_admin(viewer: &Viewer) -> AppResult<()> {
    if viewer.is_admin {
        Ok(())
    } else {
        Err(AppError::Forbidden("Administrator access required".to_string()))
    }
}
