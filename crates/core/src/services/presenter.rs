//! Read models for posts.

use std::collections::HashMap;

use chrono::{DateTime, FixedOffset};
use livenest_common::{AppResult, StoredMedia};
use livenest_db::{
    entities::{comment, post, user},
    repositories::{PostLikeRepository, UserRepository},
};
use serde::Serialize;

use crate::services::visibility::is_edited;

/// Public summary of a user, embedded in posts, comments and messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorSummary {
    pub id: String,
    pub username: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
}

impl From<&user::Model> for AuthorSummary {
    fn from(user: &user::Model) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            name: user.name.clone(),
            avatar_url: user.avatar_url.clone(),
        }
    }
}

/// A post as it appears in feeds and listings.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedPost {
    pub id: String,
    pub author: AuthorSummary,
    pub text: String,
    pub media: Vec<StoredMedia>,
    pub tags: Vec<String>,
    pub like_count: u64,
    /// Whether the viewer is in the post's like set
    pub liked: bool,
    pub is_deleted: bool,
    pub created_at: DateTime<FixedOffset>,
    pub updated_at: DateTime<FixedOffset>,
}

/// A live comment with its author.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    pub id: String,
    pub post_id: String,
    pub author: AuthorSummary,
    pub text: String,
    pub edited: bool,
    pub created_at: DateTime<FixedOffset>,
    pub updated_at: DateTime<FixedOffset>,
}

impl CommentView {
    #[must_use]
    pub fn new(comment: comment::Model, author: AuthorSummary) -> Self {
        let edited = is_edited(&comment);
        Self {
            id: comment.id,
            post_id: comment.post_id,
            author,
            text: comment.text,
            edited,
            created_at: comment.created_at,
            updated_at: comment.updated_at,
        }
    }
}

/// Resolves authors and like sets for batches of posts.
#[derive(Clone)]
pub struct PostPresenter {
    user_repo: UserRepository,
    like_repo: PostLikeRepository,
}

impl PostPresenter {
    /// Create a new presenter.
    #[must_use]
    pub const fn new(user_repo: UserRepository, like_repo: PostLikeRepository) -> Self {
        Self {
            user_repo,
            like_repo,
        }
    }

    /// Build feed items for `posts`, keeping their order.
    ///
    /// Three queries regardless of batch size: authors, like counts and the
    /// viewer's likes.
    pub async fn present(
        &self,
        viewer_id: &str,
        posts: Vec<post::Model>,
    ) -> AppResult<Vec<FeedPost>> {
        if posts.is_empty() {
            return Ok(vec![]);
        }

        let mut author_ids: Vec<String> = posts.iter().map(|p| p.user_id.clone()).collect();
        author_ids.sort();
        author_ids.dedup();
        let post_ids: Vec<String> = posts.iter().map(|p| p.id.clone()).collect();

        let authors = self.authors(&author_ids).await?;
        let counts = self.like_repo.count_by_posts(&post_ids).await?;
        let liked = self.like_repo.liked_post_ids(viewer_id, &post_ids).await?;

        Ok(posts
            .into_iter()
            .filter_map(|post| {
                let Some(author) = authors.get(&post.user_id).cloned() else {
                    tracing::warn!(post_id = %post.id, "Post author missing, skipping");
                    return None;
                };
                let like_count = counts.get(&post.id).copied().unwrap_or_default();
                let liked = liked.contains(&post.id);
                Some(feed_post(post, author, like_count, liked))
            })
            .collect())
    }

    /// Attach authors to comments, keeping their order. Deleted comments
    /// are dropped.
    pub async fn present_comments(
        &self,
        comments: Vec<comment::Model>,
    ) -> AppResult<Vec<CommentView>> {
        let mut author_ids: Vec<String> = comments.iter().map(|c| c.user_id.clone()).collect();
        author_ids.sort();
        author_ids.dedup();

        let authors = self.authors(&author_ids).await?;

        Ok(comments
            .into_iter()
            .filter(|c| !c.is_deleted)
            .filter_map(|c| {
                let author = authors.get(&c.user_id).cloned()?;
                Some(CommentView::new(c, author))
            })
            .collect())
    }

    /// Summaries for `ids`, in the same order. Unknown IDs are skipped.
    pub async fn summaries(&self, ids: &[String]) -> AppResult<Vec<AuthorSummary>> {
        let authors = self.authors(ids).await?;
        Ok(ids.iter().filter_map(|id| authors.get(id).cloned()).collect())
    }

    async fn authors(&self, ids: &[String]) -> AppResult<HashMap<String, AuthorSummary>> {
        Ok(self
            .user_repo
            .find_by_ids(ids)
            .await?
            .iter()
            .map(|u| (u.id.clone(), AuthorSummary::from(u)))
            .collect())
    }

    /// Build the feed item for a single post.
    pub async fn present_one(&self, viewer_id: &str, post: post::Model) -> AppResult<FeedPost> {
        let author = self.user_repo.get_by_id(&post.user_id).await?;
        let like_count = self.like_repo.count_by_post(&post.id).await?;
        let liked = self.like_repo.is_liked(viewer_id, &post.id).await?;
        Ok(feed_post(post, AuthorSummary::from(&author), like_count, liked))
    }
}

pub(crate) fn feed_post(
    post: post::Model,
    author: AuthorSummary,
    like_count: u64,
    liked: bool,
) -> FeedPost {
    let media = serde_json::from_value(post.media.clone()).unwrap_or_default();
    let tags = post.tag_list();
    FeedPost {
        id: post.id,
        author,
        text: post.text,
        media,
        tags,
        like_count,
        liked,
        is_deleted: post.is_deleted,
        created_at: post.created_at,
        updated_at: post.updated_at,
    }
}
