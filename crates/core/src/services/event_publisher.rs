//! Event publisher service.
//!
//! Provides an abstraction for publishing real-time events.
//! Implementations live in the realtime crate (in-process broadcast and
//! Redis Pub/Sub).

use async_trait::async_trait;
use livenest_common::AppResult;
use std::sync::Arc;

/// Event names published on user channels.
pub mod events {
    /// Someone followed the channel owner.
    pub const FOLLOW: &str = "follow";
    /// A conversation with the channel owner was started.
    pub const NEW_CONVERSATION: &str = "new-conversation";
    /// A message arrived in one of the owner's conversations.
    pub const NEW_MESSAGE: &str = "new-message";
    /// The owner's subscription changed.
    pub const SUBSCRIPTION: &str = "subscription";
}

/// Channel name for events addressed to a user.
#[must_use]
pub fn user_channel(user_id: &str) -> String {
    format!("user:{user_id}")
}

/// Trait for publishing real-time events.
///
/// Delivery is at-most-once; nothing in the core relies on it.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish `payload` as `event` on `channel`.
    async fn publish(&self, channel: &str, event: &str, payload: serde_json::Value)
    -> AppResult<()>;
}

/// Type alias for a shared event publisher.
pub type EventPublisherService = Arc<dyn EventPublisher>;

/// Publish an event, logging instead of failing when delivery breaks.
pub async fn publish_best_effort(
    publisher: Option<&EventPublisherService>,
    channel: &str,
    event: &str,
    payload: serde_json::Value,
) {
    if let Some(publisher) = publisher
        && let Err(e) = publisher.publish(channel, event, payload).await
    {
        tracing::warn!(error = %e, channel = channel, event = event, "Failed to publish event");
    }
}

/// A no-op implementation of `EventPublisher` for when real-time events are disabled.
#[derive(Clone, Default)]
pub struct NoOpEventPublisher;

#[async_trait]
impl EventPublisher for NoOpEventPublisher {
    async fn publish(
        &self,
        _channel: &str,
        _event: &str,
        _payload: serde_json::Value,
    ) -> AppResult<()> {
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Recording publisher shared by service tests.

    use super::*;
    use std::sync::Mutex;

    /// Captures every published event.
    #[derive(Default)]
    pub struct RecordingPublisher {
        pub events: Mutex<Vec<(String, String, serde_json::Value)>>,
    }

    impl RecordingPublisher {
        #[allow(clippy::unwrap_used)]
        pub fn recorded(&self) -> Vec<(String, String, serde_json::Value)> {
            self.events.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl EventPublisher for RecordingPublisher {
        #[allow(clippy::unwrap_used)]
        async fn publish(
            &self,
            channel: &str,
            event: &str,
            payload: serde_json::Value,
        ) -> AppResult<()> {
            self.events
                .lock()
                .unwrap()
                .push((channel.to_string(), event.to_string(), payload));
            Ok(())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use livenest_common::AppError;
    use serde_json::json;

    struct FailingPublisher;

    #[async_trait]
    impl EventPublisher for FailingPublisher {
        async fn publish(
            &self,
            _channel: &str,
            _event: &str,
            _payload: serde_json::Value,
        ) -> AppResult<()> {
            Err(AppError::Upstream("transport down".to_string()))
        }
    }

    #[test]
    fn test_user_channel() {
        assert_eq!(user_channel("abc"), "user:abc");
    }

    #[tokio::test]
    async fn test_best_effort_swallows_failures() {
        let publisher: EventPublisherService = Arc::new(FailingPublisher);
        publish_best_effort(Some(&publisher), "user:a", events::FOLLOW, json!({})).await;
    }

    #[tokio::test]
    async fn test_best_effort_delivers() {
        let recorder = Arc::new(testing::RecordingPublisher::default());
        let publisher: EventPublisherService = recorder.clone();
        publish_best_effort(Some(&publisher), "user:a", events::FOLLOW, json!({"x": 1})).await;

        let recorded = recorder.recorded();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].0, "user:a");
        assert_eq!(recorded[0].1, "follow");
    }
}
