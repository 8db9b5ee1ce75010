//! Database entities.

#![allow(missing_docs)]

pub mod follow_author;
pub mod follow_topic;
pub mod poll;
pub mod poll_option;
pub mod poll_stats;
pub mod poll_topic;
pub mod topic;
pub mod user;
pub mod vote;

pub use follow_author::Entity as FollowAuthor;
pub use follow_topic::Entity as FollowTopic;
pub use poll::Entity as Poll;
pub use poll_option::Entity as PollOption;
pub use poll_stats::Entity as PollStats;
pub use poll_topic::Entity as PollTopic;
pub use topic::Entity as Topic;
pub use user::Entity as User;
pub use vote::Entity as Vote;
