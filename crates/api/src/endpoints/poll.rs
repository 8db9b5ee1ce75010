//! Poll read model endpoint.

use std::collections::HashMap;

use axum::{
    Json,
    extract::{Path, State},
};
use pollwave_common::AppResult;
use pollwave_db::entities::poll::{ResultsMode, Visibility};
use serde::Serialize;

use crate::{extractors::ClientIdentity, middleware::AppState};

/// Poll option response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionResponse {
    pub id: String,
    pub text: String,
    pub ordinal: i32,
}

/// Aggregate results, present only when the poll's results policy exposes
/// them to this viewer.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultsResponse {
    pub total_votes: i64,
    pub counts: HashMap<String, i64>,
    pub percents: HashMap<String, f64>,
}

/// Poll response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollResponse {
    pub id: String,
    pub title: String,
    pub author_id: String,
    pub visibility: Visibility,
    pub results_mode: ResultsMode,
    pub is_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closes_at: Option<String>,
    pub created_at: String,
    pub options: Vec<OptionResponse>,
    pub already_voted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<ResultsResponse>,
}

/// `GET /polls/{id}`
pub async fn show_poll(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ClientIdentity(raw): ClientIdentity,
) -> AppResult<Json<PollResponse>> {
    // Existence-only gate; hidden polls stay directly readable, moderation
    // removes them from the feed.
    let poll = state.poll_repo.get_by_id(&id).await?;
    let options = state.poll_repo.find_options(&poll.id).await?;

    // Read path: hash only what the client presented, never mint.
    let identity = state.identity_service.resolve_presented(raw);
    let already_voted = if identity.has_channel() {
        state
            .vote_repo
            .find_by_identity(
                &poll.id,
                identity.account_id.as_deref(),
                identity.device_hash.as_deref(),
                identity.network_hash.as_deref(),
            )
            .await?
            .is_some()
    } else {
        false
    };

    let results_open = match poll.results_mode {
        ResultsMode::Open => true,
        ResultsMode::HiddenUntilVote => already_voted,
        ResultsMode::HiddenUntilClose => poll.is_closed_by_time(),
    };
    let results = if results_open {
        let aggregate = state.aggregate_service.load(&poll.id).await?;
        Some(ResultsResponse {
            total_votes: aggregate.total_votes,
            percents: aggregate.percents(),
            counts: aggregate.counts,
        })
    } else {
        None
    };

    Ok(Json(PollResponse {
        id: poll.id.clone(),
        title: poll.title.clone(),
        author_id: poll.author_id.clone(),
        visibility: poll.visibility,
        results_mode: poll.results_mode,
        is_active: poll.is_active(),
        closes_at: poll.closes_at.map(|t| t.to_rfc3339()),
        created_at: poll.created_at.to_rfc3339(),
        options: options
            .into_iter()
            .map(|o| OptionResponse {
                id: o.id,
                text: o.text,
                ordinal: o.ordinal,
            })
            .collect(),
        already_voted,
        results,
    }))
}
