//! API endpoints.

#![allow(missing_docs)]

mod feed;
mod poll;
mod vote;

use axum::{
    Router,
    routing::{get, post},
};

use crate::middleware::AppState;
use crate::sse;

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/polls/{id}", get(poll::show_poll))
        .route("/polls/{id}/vote", post(vote::cast_vote))
        .route("/polls/{id}/stream", get(sse::poll_stream))
        .route("/feed", get(feed::feed))
}
