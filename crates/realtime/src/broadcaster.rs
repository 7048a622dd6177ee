//! In-process event fan-out, one broadcast channel per channel name.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use livenest_common::AppResult;
use livenest_core::EventPublisher;
use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, broadcast};
use tracing::debug;

/// Buffered events per channel before slow receivers start lagging.
const CHANNEL_CAPACITY: usize = 100;

/// An event addressed to a channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealtimeEvent {
    pub channel: String,
    /// Event name, e.g. `new-message`
    pub event: String,
    pub payload: serde_json::Value,
}

/// Local broadcaster shared by every connection of this process.
#[derive(Clone, Default)]
pub struct Broadcaster {
    channels: Arc<RwLock<HashMap<String, broadcast::Sender<RealtimeEvent>>>>,
}

impl Broadcaster {
    /// Create an empty broadcaster.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to a channel, creating it if needed.
    pub async fn subscribe(&self, channel: &str) -> broadcast::Receiver<RealtimeEvent> {
        let mut channels = self.channels.write().await;

        if let Some(sender) = channels.get(channel) {
            return sender.subscribe();
        }

        let (sender, receiver) = broadcast::channel(CHANNEL_CAPACITY);
        channels.insert(channel.to_string(), sender);
        receiver
    }

    /// Hand an event to the current subscribers of its channel.
    ///
    /// Returns how many receivers got it. Events for channels nobody
    /// listens to are dropped.
    pub async fn deliver(&self, event: RealtimeEvent) -> usize {
        let channels = self.channels.read().await;
        let Some(sender) = channels.get(&event.channel) else {
            return 0;
        };
        sender.send(event).unwrap_or(0)
    }

    /// Drop channels without receivers.
    pub async fn cleanup(&self) {
        let mut channels = self.channels.write().await;
        let before = channels.len();
        channels.retain(|_, sender| sender.receiver_count() > 0);
        debug!(removed = before - channels.len(), "Cleaned up idle channels");
    }

    /// Number of open channels.
    pub async fn channel_count(&self) -> usize {
        self.channels.read().await.len()
    }
}

#[async_trait]
impl EventPublisher for Broadcaster {
    async fn publish(
        &self,
        channel: &str,
        event: &str,
        payload: serde_json::Value,
    ) -> AppResult<()> {
        let delivered = self
            .deliver(RealtimeEvent {
                channel: channel.to_string(),
                event: event.to_string(),
                payload,
            })
            .await;
        debug!(channel, event, delivered, "Published local event");
        Ok(())
    }
}
