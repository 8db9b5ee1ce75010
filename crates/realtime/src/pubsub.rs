//! Redis Pub/Sub for cross-instance update distribution.
//!
//! One topic per poll. A single shared `SubscriberClient` holds the Redis
//! subscriptions; a registry maps each poll to a local tokio broadcast
//! channel. The first local subscriber for a poll triggers the Redis
//! SUBSCRIBE, a routing task fans received messages into the matching
//! channel, and the last receiver dropping triggers UNSUBSCRIBE.

#![allow(missing_docs)]

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use fred::clients::{Client, SubscriberClient};
use fred::error::Error as RedisError;
use fred::interfaces::{ClientLike, EventInterface, PubsubInterface};
use fred::types::config::Config as RedisConfig;
use pollwave_common::{AppError, AppResult};
use pollwave_core::services::EventPublisher;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, info, warn};

/// Per-poll channel name prefix.
pub const POLL_CHANNEL_PREFIX: &str = "pollwave:poll:";

/// Buffered messages per poll topic before slow local receivers start
/// lagging.
const TOPIC_CAPACITY: usize = 256;

/// Redis channel name for a poll's updates.
#[must_use]
pub fn poll_channel(poll_id: &str) -> String {
    format!("{POLL_CHANNEL_PREFIX}{poll_id}")
}

/// One update on a poll topic: an event name plus its JSON payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollMessage {
    pub event: String,
    pub data: serde_json::Value,
}

/// Redis Pub/Sub manager for poll update distribution.
#[derive(Clone)]
pub struct RedisPubSub {
    publisher: Client,
    subscriber: SubscriberClient,
    /// poll ID → local fan-out channel. Guarded so subscribe/unsubscribe
    /// and the Redis round-trips they imply are serialized per registry.
    topics: Arc<Mutex<HashMap<String, broadcast::Sender<PollMessage>>>>,
}

impl RedisPubSub {
    /// Create a new Redis Pub/Sub manager.
    pub async fn new(redis_url: &str) -> Result<Self, RedisError> {
        let config = RedisConfig::from_url(redis_url)?;

        let publisher = Client::new(config.clone(), None, None, None);
        publisher.init().await?;

        let subscriber = SubscriberClient::new(config, None, None, None);
        subscriber.init().await?;

        info!("Redis Pub/Sub initialized");

        Ok(Self {
            publisher,
            subscriber,
            topics: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Start the routing task that fans Redis messages into local topics.
    pub fn start(&self) {
        let topics = Arc::clone(&self.topics);
        let mut message_stream = self.subscriber.message_rx();

        tokio::spawn(async move {
            while let Ok(message) = message_stream.recv().await {
                let channel = message.channel.to_string();
                let Some(poll_id) = channel.strip_prefix(POLL_CHANNEL_PREFIX) else {
                    continue;
                };
                let Some(payload) = message.value.as_string() else {
                    continue;
                };
                match serde_json::from_str::<PollMessage>(&payload) {
                    Ok(msg) => {
                        let topics = topics.lock().await;
                        if let Some(tx) = topics.get(poll_id) {
                            // A send error only means every local receiver
                            // disconnected between routing and delivery.
                            let _ = tx.send(msg);
                        }
                    }
                    Err(e) => {
                        warn!(channel = %channel, error = %e, "Failed to parse Pub/Sub message");
                    }
                }
            }
            info!("Pub/Sub message stream ended");
        });
    }

    /// Subscribe to a poll's topic. The first subscriber for a poll opens
    /// the Redis subscription.
    pub async fn subscribe_poll(&self, poll_id: &str) -> AppResult<PollSubscription> {
        let mut topics = self.topics.lock().await;

        let rx = if let Some(tx) = topics.get(poll_id) {
            tx.subscribe()
        } else {
            let (tx, rx) = broadcast::channel(TOPIC_CAPACITY);
            self.subscriber
                .subscribe(poll_channel(poll_id))
                .await
                .map_err(|e| AppError::Redis(e.to_string()))?;
            debug!(poll_id, "Subscribed to poll channel");
            topics.insert(poll_id.to_string(), tx);
            rx
        };

        Ok(PollSubscription {
            rx: Some(rx),
            poll_id: poll_id.to_string(),
            pubsub: self.clone(),
        })
    }

    /// Drop the Redis subscription for a poll once no local receivers
    /// remain.
    async fn release_poll(&self, poll_id: &str) {
        let mut topics = self.topics.lock().await;
        let drained = topics
            .get(poll_id)
            .is_some_and(|tx| tx.receiver_count() == 0);
        if !drained {
            return;
        }
        topics.remove(poll_id);
        if let Err(e) = self.subscriber.unsubscribe(poll_channel(poll_id)).await {
            warn!(poll_id, error = %e, "Failed to unsubscribe from poll channel");
        } else {
            debug!(poll_id, "Unsubscribed from poll channel");
        }
    }

    /// Publish an event to a poll's topic. Zero subscribers is not an
    /// error.
    pub async fn publish(
        &self,
        poll_id: &str,
        event: &str,
        data: serde_json::Value,
    ) -> AppResult<()> {
        let msg = PollMessage {
            event: event.to_string(),
            data,
        };
        let payload =
            serde_json::to_string(&msg).map_err(|e| AppError::Internal(e.to_string()))?;
        let _: () = self
            .publisher
            .publish(poll_channel(poll_id), payload)
            .await
            .map_err(|e| AppError::Redis(e.to_string()))?;
        debug!(poll_id, event, "Published poll event");
        Ok(())
    }

    /// Shutdown both Redis connections.
    pub async fn shutdown(&self) -> Result<(), RedisError> {
        self.subscriber.quit().await?;
        self.publisher.quit().await?;
        info!("Redis Pub/Sub shutdown");
        Ok(())
    }
}

/// A live subscription to one poll's topic.
///
/// Dropping it releases the local receiver and, when it was the last one,
/// schedules the Redis unsubscribe.
pub struct PollSubscription {
    rx: Option<broadcast::Receiver<PollMessage>>,
    poll_id: String,
    pubsub: RedisPubSub,
}

impl PollSubscription {
    /// Receive the next message on the topic.
    pub async fn recv(&mut self) -> Result<PollMessage, broadcast::error::RecvError> {
        match self.rx.as_mut() {
            Some(rx) => rx.recv().await,
            None => Err(broadcast::error::RecvError::Closed),
        }
    }
}

impl Drop for PollSubscription {
    fn drop(&mut self) {
        // Drop the receiver before the cleanup task counts the survivors.
        self.rx.take();
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let pubsub = self.pubsub.clone();
        let poll_id = std::mem::take(&mut self.poll_id);
        handle.spawn(async move {
            pubsub.release_poll(&poll_id).await;
        });
    }
}

/// Implementation of `EventPublisher` for `RedisPubSub`.
/// This allows core services to publish events without depending on the
/// realtime crate directly.
#[async_trait]
impl EventPublisher for RedisPubSub {
    async fn publish_vote_accepted(
        &self,
        poll_id: &str,
        option_id: &str,
        total_votes: i64,
        counts: &HashMap<String, i64>,
        percents: &HashMap<String, f64>,
    ) -> AppResult<()> {
        self.publish(
            poll_id,
            "update",
            json!({
                "pollId": poll_id,
                "optionId": option_id,
                "totalVotes": total_votes,
                "counts": counts,
                "percents": percents,
            }),
        )
        .await
    }

    async fn publish_stats_updated(
        &self,
        poll_id: &str,
        total_votes: i64,
        counts: &HashMap<String, i64>,
    ) -> AppResult<()> {
        self.publish(
            poll_id,
            "stats",
            json!({
                "pollId": poll_id,
                "totalVotes": total_votes,
                "counts": counts,
            }),
        )
        .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_channel_name() {
        assert_eq!(poll_channel("abc123"), "pollwave:poll:abc123");
    }

    #[test]
    fn test_poll_message_frame_shape() {
        let msg = PollMessage {
            event: "update".to_string(),
            data: json!({"pollId": "p1", "totalVotes": 3}),
        };
        let encoded = serde_json::to_value(&msg).unwrap();
        assert_eq!(encoded["event"], "update");
        assert_eq!(encoded["data"]["totalVotes"], 3);
    }

    #[test]
    fn test_poll_message_round_trip() {
        let raw = r#"{"event":"stats","data":{"pollId":"p1","counts":{"o1":2}}}"#;
        let msg: PollMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(msg.event, "stats");
        assert_eq!(msg.data["counts"]["o1"], 2);
    }
}
