//! API middleware.

#![allow(missing_docs)]

use axum::{body::Body, extract::State, http::Request, middleware::Next, response::Response};
use pollwave_core::{AggregateService, FeedService, IdentityService, VoteService};
use pollwave_db::repositories::{PollRepository, UserRepository, VoteRepository};
use pollwave_realtime::RedisPubSub;

use crate::rate_limit::VoteRateLimiter;

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub identity_service: IdentityService,
    pub vote_service: VoteService,
    pub aggregate_service: AggregateService,
    pub feed_service: FeedService,
    pub poll_repo: PollRepository,
    pub vote_repo: VoteRepository,
    pub user_repo: UserRepository,
    pub pubsub: RedisPubSub,
    pub rate_limiter: VoteRateLimiter,
}

/// Authentication middleware.
///
/// Resolves an optional `Authorization: Bearer` token to an account and
/// stashes it in request extensions. Every endpoint works anonymously; a
/// bad or missing token just leaves the request unauthenticated.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    if let Some(auth_header) = req.headers().get("Authorization")
        && let Ok(auth_str) = auth_header.to_str()
        && let Some(token) = auth_str.strip_prefix("Bearer ")
        && let Ok(Some(user)) = state.user_repo.find_by_api_token(token).await
    {
        req.extensions_mut().insert(user);
    }

    next.run(req).await
}
