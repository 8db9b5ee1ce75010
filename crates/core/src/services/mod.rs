//! Business logic services.

#![allow(missing_docs)]

pub mod aggregate;
pub mod event_publisher;
pub mod feed;
pub mod identity;
pub mod vote;

pub use aggregate::{AggregateService, PollAggregate};
pub use event_publisher::{EventPublisher, NoopEventPublisher};
pub use feed::{FeedCursor, FeedFilters, FeedItem, FeedPage, FeedService, Viewer};
pub use identity::{IdentityService, RawIdentity, ResolvedIdentity};
pub use vote::{VoteInput, VoteOutcome, VoteService};
