//! Event publisher service.
//!
//! Provides an abstraction for publishing real-time poll events.
//! The actual implementation is provided by the realtime crate (Redis Pub/Sub).

use async_trait::async_trait;
use pollwave_common::AppResult;
use std::collections::HashMap;
use std::sync::Arc;

/// Trait for publishing real-time events.
///
/// This allows the core services to publish events
/// without directly depending on the pubsub implementation.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish an accepted vote, carrying the post-vote aggregate.
    async fn publish_vote_accepted(
        &self,
        poll_id: &str,
        option_id: &str,
        total_votes: i64,
        counts: &HashMap<String, i64>,
        percents: &HashMap<String, f64>,
    ) -> AppResult<()>;

    /// Publish a refreshed aggregate (reconciliation, administrative delete).
    async fn publish_stats_updated(
        &self,
        poll_id: &str,
        total_votes: i64,
        counts: &HashMap<String, i64>,
    ) -> AppResult<()>;
}

/// A no-op implementation of `EventPublisher` for testing or when real-time
/// events are disabled.
pub struct NoopEventPublisher;

#[async_trait]
impl EventPublisher for NoopEventPublisher {
    async fn publish_vote_accepted(
        &self,
        _poll_id: &str,
        _option_id: &str,
        _total_votes: i64,
        _counts: &HashMap<String, i64>,
        _percents: &HashMap<String, f64>,
    ) -> AppResult<()> {
        Ok(())
    }

    async fn publish_stats_updated(
        &self,
        _poll_id: &str,
        _total_votes: i64,
        _counts: &HashMap<String, i64>,
    ) -> AppResult<()> {
        Ok(())
    }
}

/// Shared reference to an event publisher.
pub type SharedEventPublisher = Arc<dyn EventPublisher>;
