//! Visibility policy for soft-deleted content.

use chrono::{DateTime, Duration, Utc};
use livenest_common::{AppError, AppResult};
use livenest_db::entities::{comment, post, user};

/// How long an author can still see a post after deleting it.
pub const DELETE_GRACE_WINDOW: Duration = Duration::hours(1);

/// Gap between `created_at` and `updated_at` below which a comment is not
/// considered edited.
pub const EDIT_THRESHOLD: Duration = Duration::seconds(1);

/// The identity a request acts as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Viewer {
    pub id: String,
    pub is_admin: bool,
}

impl Viewer {
    /// A regular user.
    #[must_use]
    pub fn user(id: &str) -> Self {
        Self {
            id: id.to_string(),
            is_admin: false,
        }
    }

    /// An administrator.
    #[must_use]
    pub fn admin(id: &str) -> Self {
        Self {
            id: id.to_string(),
            is_admin: true,
        }
    }
}

impl From<&user::Model> for Viewer {
    fn from(user: &user::Model) -> Self {
        Self {
            id: user.id.clone(),
            is_admin: user.is_admin(),
        }
    }
}

/// Decide whether `viewer` may see `post` at `now`.
///
/// Live posts are visible to everyone. A soft-deleted post is visible to
/// admins, and to its author until [`DELETE_GRACE_WINDOW`] has passed since
/// `updated_at`.
pub fn can_view(viewer: &Viewer, post: &post::Model, now: DateTime<Utc>) -> AppResult<()> {
    if !post.is_deleted || viewer.is_admin {
        return Ok(());
    }

    if post.user_id == viewer.id {
        let deleted_for = now.signed_duration_since(post.updated_at.with_timezone(&Utc));
        if deleted_for <= DELETE_GRACE_WINDOW {
            return Ok(());
        }
    }

    Err(AppError::Forbidden("This post has been deleted".to_string()))
}

/// Whether a comment has been edited since it was written.
#[must_use]
pub fn is_edited(comment: &comment::Model) -> bool {
    comment.updated_at.signed_duration_since(comment.created_at) > EDIT_THRESHOLD
}

/// Comment author, the owning post's author, or an admin may delete.
#[must_use]
pub fn can_delete_comment(viewer: &Viewer, comment: &comment::Model, post_author_id: &str) -> bool {
    viewer.is_admin || comment.user_id == viewer.id || post_author_id == viewer.id
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn deleted_post(author: &str, deleted_at: DateTime<Utc>) -> post::Model {
        post::Model {
            id: "p1".to_string(),
            user_id: author.to_string(),
            text: "bye".to_string(),
            media: json!([]),
            tags: json!([]),
            is_deleted: true,
            created_at: (deleted_at - Duration::days(1)).into(),
            updated_at: deleted_at.into(),
        }
    }

    fn comment_with_gap(gap: Duration) -> comment::Model {
        let created = Utc::now();
        comment::Model {
            id: "c1".to_string(),
            post_id: "p1".to_string(),
            user_id: "author".to_string(),
            text: "hi".to_string(),
            is_deleted: false,
            created_at: created.into(),
            updated_at: (created + gap).into(),
        }
    }

    #[test]
    fn test_live_post_visible_to_anyone() {
        let mut post = deleted_post("author", Utc::now());
        post.is_deleted = false;

        assert!(can_view(&Viewer::user("stranger"), &post, Utc::now()).is_ok());
    }

    #[test]
    fn test_owner_sees_deleted_post_within_grace_window() {
        let deleted_at = Utc::now();
        let post = deleted_post("author", deleted_at);
        let owner = Viewer::user("author");

        assert!(can_view(&owner, &post, deleted_at + Duration::minutes(59)).is_ok());
        assert!(can_view(&owner, &post, deleted_at + Duration::hours(1)).is_ok());
    }

    #[test]
    fn test_owner_forbidden_after_grace_window() {
        let deleted_at = Utc::now();
        let post = deleted_post("author", deleted_at);

        let result = can_view(
            &Viewer::user("author"),
            &post,
            deleted_at + Duration::hours(1) + Duration::seconds(1),
        );

        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[test]
    fn test_admin_sees_deleted_post_any_time() {
        let deleted_at = Utc::now() - Duration::days(30);
        let post = deleted_post("author", deleted_at);

        assert!(can_view(&Viewer::admin("mod"), &post, Utc::now()).is_ok());
    }

    #[test]
    fn test_stranger_forbidden_on_deleted_post() {
        let deleted_at = Utc::now();
        let post = deleted_post("author", deleted_at);

        let result = can_view(&Viewer::user("stranger"), &post, deleted_at);

        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[test]
    fn test_comment_edit_threshold() {
        assert!(!is_edited(&comment_with_gap(Duration::milliseconds(400))));
        assert!(!is_edited(&comment_with_gap(Duration::seconds(1))));
        assert!(is_edited(&comment_with_gap(Duration::milliseconds(1500))));
    }

    #[test]
    fn test_comment_delete_permissions() {
        let comment = comment_with_gap(Duration::zero());

        assert!(can_delete_comment(&Viewer::user("author"), &comment, "post_owner"));
        assert!(can_delete_comment(&Viewer::user("post_owner"), &comment, "post_owner"));
        assert!(can_delete_comment(&Viewer::admin("mod"), &comment, "post_owner"));
        assert!(!can_delete_comment(&Viewer::user("stranger"), &comment, "post_owner"));
    }
}
