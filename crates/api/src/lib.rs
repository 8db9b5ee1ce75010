//! HTTP API layer for pollwave.
//!
//! This crate provides the REST API and real-time streaming:
//!
//! - **Endpoints**: vote casting, poll read model, ranked feed
//! - **Extractors**: optional bearer auth, device/network identity
//! - **Middleware**: token authentication
//! - **Rate limiting**: Redis fixed-window counters per identity channel
//! - **SSE**: per-poll live update streams
//!
//! Built on Axum 0.8 with Tower middleware stack.

pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod rate_limit;
pub mod sse;

pub use endpoints::router;
pub use middleware::AppState;
pub use rate_limit::VoteRateLimiter;
