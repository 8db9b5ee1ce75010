//! Database repositories.

#![allow(missing_docs)]

mod follow;
mod poll;
mod poll_stats;
mod user;
mod vote;

pub use follow::FollowRepository;
pub use poll::{FeedFilter, PollRepository};
pub use poll_stats::PollStatsRepository;
pub use user::UserRepository;
pub use vote::{VoteInsert, VoteRepository};
