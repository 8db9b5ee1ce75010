//! Real-time update broadcasting for pollwave.

pub mod pubsub;

pub use pubsub::{PollMessage, PollSubscription, RedisPubSub, poll_channel};
