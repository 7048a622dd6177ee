//! Post service.

use std::sync::Arc;

use chrono::Utc;
use livenest_common::{
    AppError, AppResult, IdGenerator, MediaStore, StoredMedia, storage::is_supported_media,
};
use livenest_db::{
    entities::post,
    repositories::{CommentRepository, PostRepository, UserRepository},
};
use sea_orm::{IntoActiveModel, Set};
use serde::{Deserialize, Serialize};
use serde_json::json;
use validator::Validate;

use crate::services::pagination::Page;
use crate::services::presenter::{AuthorSummary, CommentView, FeedPost, PostPresenter, feed_post};
use crate::services::visibility::{Viewer, can_view};

/// Maximum number of tags on a post.
pub const MAX_TAGS: usize = 10;

/// Maximum length of a single tag, in characters.
pub const MAX_TAG_LENGTH: usize = 50;

/// Maximum number of media files on a post.
pub const MAX_MEDIA: usize = 10;

const MEDIA_FOLDER: &str = "posts";

/// An uploaded file waiting to be stored.
#[derive(Debug, Clone)]
pub struct MediaUpload {
    pub data: Vec<u8>,
    pub content_type: String,
}

/// Input for creating a post.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct CreatePostInput {
    #[validate(length(max = 500))]
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Input for editing a post. Absent fields are left unchanged.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdatePostInput {
    #[validate(length(max = 500))]
    pub text: Option<String>,
    pub tags: Option<Vec<String>>,
}

/// A post with its live comments.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FullPost {
    #[serde(flatten)]
    pub post: FeedPost,
    pub comments: Vec<CommentView>,
}

/// Normalize user-supplied tags: trim, strip leading `#`, lowercase and
/// de-duplicate, keeping first-seen order. Blank tags are dropped.
pub fn normalize_tags(raw: &[String]) -> AppResult<Vec<String>> {
    let mut tags: Vec<String> = Vec::with_capacity(raw.len());
    for tag in raw {
        let tag = tag.trim().trim_start_matches('#').trim().to_lowercase();
        if tag.is_empty() || tags.contains(&tag) {
            continue;
        }
        if tag.chars().count() > MAX_TAG_LENGTH {
            return Err(AppError::Validation(format!(
                "Tags must be at most {MAX_TAG_LENGTH} characters"
            )));
        }
        tags.push(tag);
    }

    if tags.len() > MAX_TAGS {
        return Err(AppError::Validation(format!(
            "A post can have at most {MAX_TAGS} tags"
        )));
    }
    Ok(tags)
}

/// Post service for business logic.
#[derive(Clone)]
pub struct PostService {
    post_repo: PostRepository,
    comment_repo: CommentRepository,
    user_repo: UserRepository,
    presenter: PostPresenter,
    storage: Arc<dyn MediaStore>,
    id_gen: IdGenerator,
}

impl PostService {
    /// Create a new post service.
    #[must_use]
    pub const fn new(
        post_repo: PostRepository,
        comment_repo: CommentRepository,
        user_repo: UserRepository,
        presenter: PostPresenter,
        storage: Arc<dyn MediaStore>,
    ) -> Self {
        Self {
            post_repo,
            comment_repo,
            user_repo,
            presenter,
            storage,
            id_gen: IdGenerator::new(),
        }
    }

    /// Publish a new post, storing its media first.
    pub async fn create(
        &self,
        viewer: &Viewer,
        input: CreatePostInput,
        media: Vec<MediaUpload>,
    ) -> AppResult<FeedPost> {
        input.validate()?;
        let tags = normalize_tags(&input.tags)?;
        let text = input.text.unwrap_or_default().trim().to_string();

        if text.is_empty() && media.is_empty() {
            return Err(AppError::InvalidOperation(
                "A post needs text or media".to_string(),
            ));
        }
        if media.len() > MAX_MEDIA {
            return Err(AppError::Validation(format!(
                "A post can have at most {MAX_MEDIA} media files"
            )));
        }
        if let Some(bad) = media.iter().find(|m| !is_supported_media(&m.content_type)) {
            return Err(AppError::InvalidOperation(format!(
                "Unsupported media type: {}",
                bad.content_type
            )));
        }

        let author = self.user_repo.get_existing(&viewer.id).await?;
        if author.is_blocked {
            return Err(AppError::Forbidden("Account is blocked".to_string()));
        }

        let stored = self.upload_all(&media).await?;

        let now = Utc::now().fixed_offset();
        let model = post::ActiveModel {
            id: Set(self.id_gen.generate()),
            user_id: Set(author.id.clone()),
            text: Set(text),
            media: Set(json!(stored)),
            tags: Set(json!(tags)),
            is_deleted: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let created = match self.post_repo.create(model).await {
            Ok(created) => created,
            Err(e) => {
                self.discard(&stored).await;
                return Err(e);
            }
        };

        tracing::info!(post_id = %created.id, user_id = %author.id, media = stored.len(), "Created post");

        Ok(feed_post(created, AuthorSummary::from(&author), 0, false))
    }

    /// A single post with its live comments.
    pub async fn get(&self, viewer: &Viewer, post_id: &str) -> AppResult<FullPost> {
        let post = self.post_repo.get_by_id(post_id).await?;
        can_view(viewer, &post, Utc::now())?;

        let comments = self.comment_repo.find_by_post(post_id).await?;
        let comments = self.presenter.present_comments(comments).await?;
        let post = self.presenter.present_one(&viewer.id, post).await?;

        Ok(FullPost { post, comments })
    }

    /// Edit the text or tags of a live post. Only its author may edit it.
    pub async fn update(
        &self,
        viewer: &Viewer,
        post_id: &str,
        input: UpdatePostInput,
    ) -> AppResult<FeedPost> {
        input.validate()?;
        let tags = input.tags.as_deref().map(normalize_tags).transpose()?;

        let post = self.post_repo.get_by_id(post_id).await?;
        if post.is_deleted {
            return Err(AppError::PostNotFound(post_id.to_string()));
        }
        if post.user_id != viewer.id {
            return Err(AppError::Forbidden(
                "Only the author can edit this post".to_string(),
            ));
        }

        let has_media = post
            .media
            .as_array()
            .is_some_and(|media| !media.is_empty());
        let mut active = post.into_active_model();

        if let Some(text) = input.text {
            let text = text.trim().to_string();
            if text.is_empty() && !has_media {
                return Err(AppError::InvalidOperation(
                    "A post needs text or media".to_string(),
                ));
            }
            active.text = Set(text);
        }
        if let Some(tags) = tags {
            active.tags = Set(json!(tags));
        }
        active.updated_at = Set(Utc::now().fixed_offset());

        let updated = self.post_repo.update(active).await?;
        self.presenter.present_one(&viewer.id, updated).await
    }

    /// Soft-delete a post. The author or an admin may delete it.
    ///
    /// Setting `updated_at` starts the author's grace window.
    pub async fn delete(&self, viewer: &Viewer, post_id: &str) -> AppResult<()> {
        let post = self.post_repo.get_by_id(post_id).await?;
        if post.is_deleted {
            return Err(AppError::PostNotFound(post_id.to_string()));
        }
        if post.user_id != viewer.id && !viewer.is_admin {
            return Err(AppError::Forbidden(
                "Not allowed to delete this post".to_string(),
            ));
        }

        let mut active = post.into_active_model();
        active.is_deleted = Set(true);
        active.updated_at = Set(Utc::now().fixed_offset());
        self.post_repo.update(active).await?;

        tracing::info!(post_id = %post_id, by = %viewer.id, "Deleted post");
        Ok(())
    }

    /// A user's live posts, newest first.
    pub async fn list_by_user(
        &self,
        viewer: &Viewer,
        user_id: &str,
        page: Page,
    ) -> AppResult<Vec<FeedPost>> {
        self.user_repo.get_existing(user_id).await?;
        let posts = self
            .post_repo
            .find_by_user(user_id, page.limit(), page.offset())
            .await?;
        self.presenter.present(&viewer.id, posts).await
    }

    async fn upload_all(&self, media: &[MediaUpload]) -> AppResult<Vec<StoredMedia>> {
        let mut stored = Vec::with_capacity(media.len());
        for upload in media {
            match self
                .storage
                .upload(&upload.data, MEDIA_FOLDER, &upload.content_type)
                .await
            {
                Ok(item) => stored.push(item),
                Err(e) => {
                    self.discard(&stored).await;
                    return Err(e);
                }
            }
        }
        Ok(stored)
    }

    async fn discard(&self, stored: &[StoredMedia]) {
        for item in stored {
            if let Err(e) = self.storage.delete(&item.id).await {
                tracing::warn!(error = %e, media_id = %item.id, "Failed to remove orphaned media");
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::presenter::tests::{test_post, test_user};
    use livenest_db::entities::comment;
    use livenest_db::repositories::PostLikeRepository;
    use maplit::btreemap;
    use sea_orm::{DatabaseBackend, MockDatabase, Value};
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryStore {
        uploads: Mutex<Vec<String>>,
        deletes: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl MediaStore for MemoryStore {
        async fn upload(
            &self,
            _data: &[u8],
            folder: &str,
            _content_type: &str,
        ) -> AppResult<StoredMedia> {
            let mut uploads = self.uploads.lock().unwrap();
            let id = format!("{folder}/{}.png", uploads.len());
            uploads.push(id.clone());
            Ok(StoredMedia {
                url: format!("/files/{id}"),
                id,
            })
        }

        async fn delete(&self, id: &str) -> AppResult<()> {
            self.deletes.lock().unwrap().push(id.to_string());
            Ok(())
        }
    }

    struct Dbs {
        post: MockDatabase,
        comment: MockDatabase,
        user: MockDatabase,
        presenter_user: MockDatabase,
        like: MockDatabase,
    }

    impl Default for Dbs {
        fn default() -> Self {
            Self {
                post: MockDatabase::new(DatabaseBackend::Postgres),
                comment: MockDatabase::new(DatabaseBackend::Postgres),
                user: MockDatabase::new(DatabaseBackend::Postgres),
                presenter_user: MockDatabase::new(DatabaseBackend::Postgres),
                like: MockDatabase::new(DatabaseBackend::Postgres),
            }
        }
    }

    fn service(dbs: Dbs, store: Arc<MemoryStore>) -> PostService {
        PostService::new(
            PostRepository::new(Arc::new(dbs.post.into_connection())),
            CommentRepository::new(Arc::new(dbs.comment.into_connection())),
            UserRepository::new(Arc::new(dbs.user.into_connection())),
            PostPresenter::new(
                UserRepository::new(Arc::new(dbs.presenter_user.into_connection())),
                PostLikeRepository::new(Arc::new(dbs.like.into_connection())),
            ),
            store,
        )
    }

    fn png() -> MediaUpload {
        MediaUpload {
            data: vec![0x89, b'P', b'N', b'G'],
            content_type: "image/png".to_string(),
        }
    }

    #[test]
    fn test_normalize_tags() {
        let raw = vec![
            " #Music ".to_string(),
            "music".to_string(),
            "".to_string(),
            "Art".to_string(),
        ];
        assert_eq!(normalize_tags(&raw).unwrap(), vec!["music", "art"]);
    }

    #[test]
    fn test_normalize_tags_limits() {
        let too_many: Vec<String> = (0..11).map(|i| format!("t{i}")).collect();
        assert!(matches!(
            normalize_tags(&too_many),
            Err(AppError::Validation(_))
        ));

        let too_long = vec!["x".repeat(51)];
        assert!(matches!(
            normalize_tags(&too_long),
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_create_post_with_media() {
        let mut created = test_post("p1", "a", &["music"]);
        created.media = json!([{ "id": "posts/0.png", "url": "/files/posts/0.png" }]);
        let dbs = Dbs {
            user: MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[test_user("a")]]),
            post: MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[created]]),
            ..Dbs::default()
        };
        let store = Arc::new(MemoryStore::default());

        let post = service(dbs, store.clone())
            .create(
                &Viewer::user("a"),
                CreatePostInput {
                    text: Some("hello".to_string()),
                    tags: vec!["#Music".to_string()],
                },
                vec![png()],
            )
            .await
            .unwrap();

        assert_eq!(post.author.id, "a");
        assert_eq!(post.like_count, 0);
        assert_eq!(post.media.len(), 1);
        assert_eq!(store.uploads.lock().unwrap().as_slice(), ["posts/0.png"]);
    }

    #[tokio::test]
    async fn test_create_empty_post_is_rejected() {
        let store = Arc::new(MemoryStore::default());
        let result = service(Dbs::default(), store)
            .create(&Viewer::user("a"), CreatePostInput::default(), vec![])
            .await;

        assert!(matches!(result, Err(AppError::InvalidOperation(_))));
    }

    #[tokio::test]
    async fn test_create_rejects_long_text() {
        let store = Arc::new(MemoryStore::default());
        let result = service(Dbs::default(), store)
            .create(
                &Viewer::user("a"),
                CreatePostInput {
                    text: Some("x".repeat(501)),
                    tags: vec![],
                },
                vec![],
            )
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_blocked_author_cannot_post() {
        let mut author = test_user("a");
        author.is_blocked = true;
        let dbs = Dbs {
            user: MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[author]]),
            ..Dbs::default()
        };
        let store = Arc::new(MemoryStore::default());

        let result = service(dbs, store.clone())
            .create(
                &Viewer::user("a"),
                CreatePostInput {
                    text: Some("hi".to_string()),
                    tags: vec![],
                },
                vec![png()],
            )
            .await;

        assert!(matches!(result, Err(AppError::Forbidden(_))));
        assert!(store.uploads.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_returns_live_comments() {
        let dbs = Dbs {
            post: MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[test_post("p1", "b", &[])]]),
            comment: MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[
                comment::Model {
                    id: "c1".to_string(),
                    post_id: "p1".to_string(),
                    user_id: "a".to_string(),
                    text: "nice".to_string(),
                    is_deleted: false,
                    created_at: Utc::now().into(),
                    updated_at: Utc::now().into(),
                },
            ]]),
            presenter_user: MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[test_user("a")]])
                .append_query_results([[test_user("b")]]),
            like: MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[btreemap! { "num_items" => Value::BigInt(Some(3)) }]])
                .append_query_results([Vec::<livenest_db::entities::post_like::Model>::new()]),
            ..Dbs::default()
        };

        let full = service(dbs, Arc::new(MemoryStore::default()))
            .get(&Viewer::user("a"), "p1")
            .await
            .unwrap();

        assert_eq!(full.post.id, "p1");
        assert_eq!(full.post.like_count, 3);
        assert!(!full.post.liked);
        assert_eq!(full.comments.len(), 1);
        assert_eq!(full.comments[0].author.id, "a");
    }

    #[tokio::test]
    async fn test_author_sees_recently_deleted_post() {
        let mut post = test_post("p1", "a", &[]);
        post.is_deleted = true;
        post.updated_at = (Utc::now() - chrono::Duration::minutes(30)).into();
        let dbs = Dbs {
            post: MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[post]]),
            comment: MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<comment::Model>::new()]),
            presenter_user: MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[test_user("a")]]),
            like: MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[btreemap! { "num_items" => Value::BigInt(Some(0)) }]])
                .append_query_results([Vec::<livenest_db::entities::post_like::Model>::new()]),
            ..Dbs::default()
        };

        let full = service(dbs, Arc::new(MemoryStore::default()))
            .get(&Viewer::user("a"), "p1")
            .await
            .unwrap();

        assert!(full.post.is_deleted);
    }

    #[tokio::test]
    async fn test_author_loses_deleted_post_after_grace_window() {
        let mut post = test_post("p1", "a", &[]);
        post.is_deleted = true;
        post.updated_at = (Utc::now() - chrono::Duration::minutes(61)).into();
        let dbs = Dbs {
            post: MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[post]]),
            ..Dbs::default()
        };

        let result = service(dbs, Arc::new(MemoryStore::default()))
            .get(&Viewer::user("a"), "p1")
            .await;

        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_update_by_non_author_is_forbidden() {
        let dbs = Dbs {
            post: MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[test_post("p1", "b", &[])]]),
            ..Dbs::default()
        };

        let result = service(dbs, Arc::new(MemoryStore::default()))
            .update(
                &Viewer::user("a"),
                "p1",
                UpdatePostInput {
                    text: Some("edited".to_string()),
                    tags: None,
                },
            )
            .await;

        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_admin_can_delete_any_post() {
        let mut deleted = test_post("p1", "b", &[]);
        deleted.is_deleted = true;
        let dbs = Dbs {
            post: MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[test_post("p1", "b", &[])]])
                .append_query_results([[deleted]]),
            ..Dbs::default()
        };

        service(dbs, Arc::new(MemoryStore::default()))
            .delete(&Viewer::admin("root"), "p1")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_stranger_cannot_delete_post() {
        let dbs = Dbs {
            post: MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[test_post("p1", "b", &[])]]),
            ..Dbs::default()
        };

        let result = service(dbs, Arc::new(MemoryStore::default()))
            .delete(&Viewer::user("a"), "p1")
            .await;

        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }
}
