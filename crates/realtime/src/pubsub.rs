//! Redis Pub/Sub for cross-instance event distribution.
//!
//! Every instance publishes events to Redis and subscribes to the shared
//! channel pattern; received events are handed to the local
//! [`Broadcaster`]. An instance's own events reach its subscribers through
//! that same round trip.

use async_trait::async_trait;
use fred::clients::{Client, SubscriberClient};
use fred::error::Error as RedisError;
use fred::interfaces::{ClientLike, EventInterface, PubsubInterface};
use fred::types::config::Config as RedisConfig;
use livenest_common::{AppError, AppResult};
use livenest_core::EventPublisher;
use tracing::{debug, info, warn};

use crate::broadcaster::{Broadcaster, RealtimeEvent};

/// Redis Pub/Sub bridge feeding a local broadcaster.
#[derive(Clone)]
pub struct RedisPubSub {
    publisher: Client,
    subscriber: SubscriberClient,
    prefix: String,
    local: Broadcaster,
}

impl RedisPubSub {
    /// Connect the publishing and subscribing clients.
    pub async fn new(
        redis_url: &str,
        prefix: &str,
        local: Broadcaster,
    ) -> Result<Self, RedisError> {
        let config = RedisConfig::from_url(redis_url)?;

        let publisher = Client::new(config.clone(), None, None, None);
        publisher.init().await?;

        let subscriber = SubscriberClient::new(config, None, None, None);
        subscriber.init().await?;

        info!("Redis Pub/Sub initialized");

        Ok(Self {
            publisher,
            subscriber,
            prefix: prefix.to_string(),
            local,
        })
    }

    /// Subscribe to every prefixed channel and start relaying to the local
    /// broadcaster.
    pub async fn start(&self) -> Result<(), RedisError> {
        self.subscriber
            .psubscribe(format!("{}:*", self.prefix))
            .await?;

        info!(prefix = %self.prefix, "Subscribed to Redis Pub/Sub channels");

        let local = self.local.clone();
        let mut message_stream = self.subscriber.message_rx();

        tokio::spawn(async move {
            while let Ok(message) = message_stream.recv().await {
                let Some(payload) = message.value.as_string() else {
                    continue;
                };
                match serde_json::from_str::<RealtimeEvent>(&payload) {
                    Ok(event) => {
                        debug!(channel = %event.channel, event = %event.event, "Received Pub/Sub event");
                        local.deliver(event).await;
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to parse Pub/Sub message");
                    }
                }
            }
            info!("Pub/Sub message stream ended");
        });

        Ok(())
    }

    /// Redis channel name for an application channel.
    #[must_use]
    pub fn redis_channel(&self, channel: &str) -> String {
        format!("{}:{channel}", self.prefix)
    }

    /// Shutdown the Pub/Sub clients.
    pub async fn shutdown(&self) -> Result<(), RedisError> {
        self.subscriber.quit().await?;
        self.publisher.quit().await?;
        info!("Redis Pub/Sub shutdown");
        Ok(())
    }
}

#[async_trait]
impl EventPublisher for RedisPubSub {
    async fn publish(
        &self,
        channel: &str,
        event: &str,
        payload: serde_json::Value,
    ) -> AppResult<()> {
        let message = serde_json::to_string(&RealtimeEvent {
            channel: channel.to_string(),
            event: event.to_string(),
            payload,
        })
        .map_err(|e| AppError::Internal(format!("Serialization error: {e}")))?;

        let _: () = self
            .publisher
            .publish(self.redis_channel(channel), message)
            .await
            .map_err(|e| AppError::Upstream(format!("Redis publish failed: {e}")))?;

        debug!(channel, event, "Published Pub/Sub event");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_wire_format() {
        let event = RealtimeEvent {
            channel: "user:a".to_string(),
            event: "new-message".to_string(),
            payload: json!({ "id": "m1" }),
        };

        let wire = serde_json::to_string(&event).unwrap();
        assert!(wire.contains("\"channel\":\"user:a\""));
        assert!(wire.contains("\"event\":\"new-message\""));

        let parsed: RealtimeEvent = serde_json::from_str(&wire).unwrap();
        assert_eq!(parsed, event);
    }

    #[tokio::test]
    #[ignore = "requires a running Redis"]
    async fn test_round_trip_through_redis() {
        let local = Broadcaster::new();
        let pubsub = RedisPubSub::new("redis://localhost:6379", "livenest-test", local.clone())
            .await
            .unwrap();
        pubsub.start().await.unwrap();
        let mut rx = local.subscribe("user:a").await;

        pubsub
            .publish("user:a", "follow", json!({ "followerId": "b" }))
            .await
            .unwrap();

        let event = tokio::time::timeout(std::time::Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.event, "follow");
        pubsub.shutdown().await.unwrap();
    }
}
