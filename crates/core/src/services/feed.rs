//! Feed assembly.
//!
//! A viewer's feed is either the newest posts of the authors they follow, or,
//! when that yields nothing, a recommendation built from the tags of their
//! own posts. The two are never mixed.

use livenest_common::AppResult;
use livenest_db::repositories::{FollowingRepository, PostRepository};
use serde::Serialize;

use crate::services::pagination::clamp_limit;
use crate::services::presenter::{FeedPost, PostPresenter};
use crate::services::visibility::Viewer;

/// Where the posts of a feed page came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedSource {
    Followed,
    Recommended,
}

/// One page of a viewer's feed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Feed {
    pub source: FeedSource,
    pub posts: Vec<FeedPost>,
}

/// Feed service.
#[derive(Clone)]
pub struct FeedService {
    following_repo: FollowingRepository,
    post_repo: PostRepository,
    presenter: PostPresenter,
}

impl FeedService {
    /// Create a new feed service.
    #[must_use]
    pub const fn new(
        following_repo: FollowingRepository,
        post_repo: PostRepository,
        presenter: PostPresenter,
    ) -> Self {
        Self {
            following_repo,
            post_repo,
            presenter,
        }
    }

    /// Assemble the viewer's feed. `page_size` defaults to 20 and is clamped
    /// to `1..=100`.
    pub async fn get_feed(&self, viewer: &Viewer, page_size: Option<u64>) -> AppResult<Feed> {
        let limit = clamp_limit(page_size);

        let followed_ids = self.following_repo.following_ids(&viewer.id).await?;
        let followed = self.post_repo.find_by_authors(&followed_ids, limit).await?;
        if !followed.is_empty() {
            return Ok(Feed {
                source: FeedSource::Followed,
                posts: self.presenter.present(&viewer.id, followed).await?,
            });
        }

        let tags = self.post_repo.tags_of_user(&viewer.id).await?;
        let recommended = if tags.is_empty() {
            self.post_repo
                .find_recent_excluding(&viewer.id, limit)
                .await?
        } else {
            self.post_repo
                .find_by_any_tag(&tags, &viewer.id, limit)
                .await?
        };

        tracing::debug!(
            viewer_id = %viewer.id,
            follows = followed_ids.len(),
            tags = tags.len(),
            count = recommended.len(),
            "Serving recommended feed"
        );

        Ok(Feed {
            source: FeedSource::Recommended,
            posts: self.presenter.present(&viewer.id, recommended).await?,
        })
    }
}
