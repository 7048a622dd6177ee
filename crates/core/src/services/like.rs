//! Like service.

use chrono::Utc;
use livenest_common::{AppResult, IdGenerator};
use livenest_db::repositories::{PostLikeRepository, PostRepository};
use serde::Serialize;

use crate::services::visibility::{Viewer, can_view};

/// Outcome of a like toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeState {
    pub liked: bool,
    pub like_count: u64,
}

/// Like service for business logic.
#[derive(Clone)]
pub struct LikeService {
    post_repo: PostRepository,
    like_repo: PostLikeRepository,
    id_gen: IdGenerator,
}

impl LikeService {
    /// Create a new like service.
    #[must_use]
    pub const fn new(post_repo: PostRepository, like_repo: PostLikeRepository) -> Self {
        Self {
            post_repo,
            like_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Add the viewer to the post's like set, or remove them if present.
    ///
    /// The returned count is read back from the like set after the toggle.
    pub async fn toggle_like(&self, viewer: &Viewer, post_id: &str) -> AppResult<LikeState> {
        let post = self.post_repo.get_by_id(post_id).await?;
        can_view(viewer, &post, Utc::now())?;

        let liked = self
            .like_repo
            .toggle(self.id_gen.generate(), &viewer.id, post_id)
            .await?;
        let like_count = self.like_repo.count_by_post(post_id).await?;

        tracing::debug!(user_id = %viewer.id, post_id = %post_id, liked, "Toggled like");

        Ok(LikeState { liked, like_count })
    }
}
