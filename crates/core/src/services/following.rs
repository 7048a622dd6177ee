//! Following service.

use crate::services::event_publisher::{
    EventPublisherService, events, publish_best_effort, user_channel,
};
use crate::services::visibility::Viewer;
use livenest_common::{AppError, AppResult, IdGenerator};
use livenest_db::repositories::FollowingRepository;
use serde::Serialize;
use serde_json::json;

/// Outcome of a follow toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowState {
    pub following: bool,
}

/// Following service for business logic.
#[derive(Clone)]
pub struct FollowingService {
    following_repo: FollowingRepository,
    event_publisher: Option<EventPublisherService>,
    id_gen: IdGenerator,
}

impl FollowingService {
    /// Create a new following service.
    #[must_use]
    pub const fn new(following_repo: FollowingRepository) -> Self {
        Self {
            following_repo,
            event_publisher: None,
            id_gen: IdGenerator::new(),
        }
    }

    /// Set the event publisher.
    pub fn set_event_publisher(&mut self, event_publisher: EventPublisherService) {
        self.event_publisher = Some(event_publisher);
    }

    /// Follow `target_id` if the viewer does not follow them yet, unfollow
    /// otherwise.
    pub async fn toggle_follow(&self, viewer: &Viewer, target_id: &str) -> AppResult<FollowState> {
        if viewer.id == target_id {
            return Err(AppError::InvalidOperation(
                "Cannot follow yourself".to_string(),
            ));
        }

        let following = self
            .following_repo
            .toggle(self.id_gen.generate(), &viewer.id, target_id)
            .await?;

        tracing::info!(
            follower_id = %viewer.id,
            followee_id = %target_id,
            following,
            "Toggled follow"
        );

        if following {
            publish_best_effort(
                self.event_publisher.as_ref(),
                &user_channel(target_id),
                events::FOLLOW,
                json!({ "followerId": viewer.id }),
            )
            .await;
        }

        Ok(FollowState { following })
    }

    /// Whether `follower_id` follows `followee_id`.
    pub async fn is_following(&self, follower_id: &str, followee_id: &str) -> AppResult<bool> {
        self.following_repo
            .is_following(follower_id, followee_id)
            .await
    }
}
