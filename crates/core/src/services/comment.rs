//! Comment service.

use chrono::Utc;
use livenest_common::{AppError, AppResult, IdGenerator};
use livenest_db::{
    entities::comment,
    repositories::{CommentRepository, PostRepository},
};
use sea_orm::{IntoActiveModel, Set};
use serde::Deserialize;
use validator::Validate;

use crate::services::presenter::{CommentView, PostPresenter};
use crate::services::visibility::{Viewer, can_delete_comment, can_view};

/// Comment text input, used for both adding and editing.
#[derive(Debug, Deserialize, Validate)]
pub struct CommentInput {
    #[validate(length(min = 1, max = 500))]
    pub text: String,
}

impl CommentInput {
    fn validated_text(&self) -> AppResult<String> {
        self.validate()?;
        let text = self.text.trim();
        if text.is_empty() {
            return Err(AppError::Validation("Comment text is empty".to_string()));
        }
        Ok(text.to_string())
    }
}

/// Comment service for business logic.
#[derive(Clone)]
pub struct CommentService {
    comment_repo: CommentRepository,
    post_repo: PostRepository,
    presenter: PostPresenter,
    id_gen: IdGenerator,
}

impl CommentService {
    /// Create a new comment service.
    #[must_use]
    pub const fn new(
        comment_repo: CommentRepository,
        post_repo: PostRepository,
        presenter: PostPresenter,
    ) -> Self {
        Self {
            comment_repo,
            post_repo,
            presenter,
            id_gen: IdGenerator::new(),
        }
    }

    /// Comment on a live post.
    pub async fn add(
        &self,
        viewer: &Viewer,
        post_id: &str,
        input: CommentInput,
    ) -> AppResult<CommentView> {
        let text = input.validated_text()?;

        let post = self.post_repo.get_by_id(post_id).await?;
        if post.is_deleted {
            return Err(AppError::PostNotFound(post_id.to_string()));
        }

        let now = Utc::now().fixed_offset();
        let model = comment::ActiveModel {
            id: Set(self.id_gen.generate()),
            post_id: Set(post.id),
            user_id: Set(viewer.id.clone()),
            text: Set(text),
            is_deleted: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let created = self.comment_repo.create(model).await?;

        tracing::debug!(comment_id = %created.id, post_id = %post_id, "Created comment");

        self.present(created).await
    }

    /// Live comments of a post the viewer can see, oldest first.
    pub async fn list(&self, viewer: &Viewer, post_id: &str) -> AppResult<Vec<CommentView>> {
        let post = self.post_repo.get_by_id(post_id).await?;
        can_view(viewer, &post, Utc::now())?;

        let comments = self.comment_repo.find_by_post(post_id).await?;
        self.presenter.present_comments(comments).await
    }

    /// Replace a comment's text. Only its author may edit it.
    pub async fn edit(
        &self,
        viewer: &Viewer,
        comment_id: &str,
        input: CommentInput,
    ) -> AppResult<CommentView> {
        let text = input.validated_text()?;

        let comment = self.comment_repo.get_by_id(comment_id).await?;
        if comment.user_id != viewer.id {
            return Err(AppError::Forbidden(
                "Only the author can edit this comment".to_string(),
            ));
        }

        let mut active = comment.into_active_model();
        active.text = Set(text);
        active.updated_at = Set(Utc::now().fixed_offset());
        let updated = self.comment_repo.update(active).await?;

        self.present(updated).await
    }

    /// Soft-delete a comment.
    pub async fn delete(&self, viewer: &Viewer, comment_id: &str) -> AppResult<()> {
        let comment = self.comment_repo.get_by_id(comment_id).await?;
        let post = self.post_repo.get_by_id(&comment.post_id).await?;

        if !can_delete_comment(viewer, &comment, &post.user_id) {
            return Err(AppError::Forbidden(
                "Not allowed to delete this comment".to_string(),
            ));
        }

        let mut active = comment.into_active_model();
        active.is_deleted = Set(true);
        active.updated_at = Set(Utc::now().fixed_offset());
        self.comment_repo.update(active).await?;

        tracing::info!(comment_id = %comment_id, by = %viewer.id, "Deleted comment");
        Ok(())
    }

    async fn present(&self, comment: comment::Model) -> AppResult<CommentView> {
        let id = comment.id.clone();
        self.presenter
            .present_comments(vec![comment])
            .await?
            .pop()
            .ok_or_else(|| AppError::NotFound(format!("Comment {id}")))
    }
}
