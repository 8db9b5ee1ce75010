//! Ranked feed endpoint.

use std::collections::HashMap;

use axum::{
    Json,
    extract::{Query, State},
};
use pollwave_common::AppResult;
use pollwave_core::{FeedFilters, FeedItem, Viewer};
use serde::{Deserialize, Serialize};

use crate::{extractors::ClientIdentity, middleware::AppState};

/// Feed query parameters.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedQuery {
    pub topic_id: Option<String>,
    pub author_id: Option<String>,
    pub cursor: Option<String>,
    pub limit: Option<u64>,
}

/// One feed entry.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedItemResponse {
    pub id: String,
    pub title: String,
    pub author_id: String,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closes_at: Option<String>,
    pub score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_votes: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counts: Option<HashMap<String, i64>>,
}

impl From<FeedItem> for FeedItemResponse {
    fn from(item: FeedItem) -> Self {
        Self {
            id: item.poll.id.clone(),
            title: item.poll.title.clone(),
            author_id: item.poll.author_id.clone(),
            created_at: item.poll.created_at.to_rfc3339(),
            closes_at: item.poll.closes_at.map(|t| t.to_rfc3339()),
            score: item.score,
            total_votes: item.total_votes,
            counts: item.counts,
        }
    }
}

/// Feed response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedResponse {
    pub items: Vec<FeedItemResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// `GET /feed`
pub async fn feed(
    State(state): State<AppState>,
    ClientIdentity(raw): ClientIdentity,
    Query(query): Query<FeedQuery>,
) -> AppResult<Json<FeedResponse>> {
    // Read path: hash only what the client presented, never mint. Any channel
    // a client has voted through unlocks hidden-until-vote results for it.
    let identity = state.identity_service.resolve_presented(raw);
    let viewer = Viewer {
        account_id: identity.account_id,
        device_hash: identity.device_hash,
        network_hash: identity.network_hash,
    };
    let filters = FeedFilters {
        topic_id: query.topic_id,
        author_id: query.author_id,
    };

    let page = state
        .feed_service
        .rank_feed(&viewer, &filters, query.cursor.as_deref(), query.limit)
        .await?;

    Ok(Json(FeedResponse {
        items: page.items.into_iter().map(FeedItemResponse::from).collect(),
        next_cursor: page.next_cursor,
    }))
}
