//! Vote casting endpoint.

use std::collections::HashMap;

use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue},
    response::IntoResponse,
};
use axum_extra::extract::{
    CookieJar,
    cookie::{Cookie, SameSite},
};
use pollwave_common::AppResult;
use pollwave_core::{VoteInput, VoteOutcome};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    extractors::{ClientIdentity, DEVICE_COOKIE, DEVICE_HEADER, IdempotencyKey},
    middleware::AppState,
};

/// Minted device cookies live for a year.
const DEVICE_COOKIE_DAYS: i64 = 365;

/// Vote request.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    #[validate(length(min = 1, max = 64))]
    pub option_id: String,
}

/// Vote response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteResponse {
    pub poll_id: String,
    pub voted_option_id: String,
    pub already_voted: bool,
    pub idempotent: bool,
    pub total_votes: i64,
    pub counts: HashMap<String, i64>,
    pub percents: HashMap<String, f64>,
}

impl From<VoteOutcome> for VoteResponse {
    fn from(outcome: VoteOutcome) -> Self {
        Self {
            poll_id: outcome.poll_id,
            voted_option_id: outcome.voted_option_id,
            already_voted: outcome.already_voted,
            idempotent: outcome.idempotent,
            total_votes: outcome.total_votes,
            counts: outcome.counts,
            percents: outcome.percents,
        }
    }
}

/// `POST /polls/{id}/vote`
pub async fn cast_vote(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ClientIdentity(raw): ClientIdentity,
    IdempotencyKey(idempotency_key): IdempotencyKey,
    jar: CookieJar,
    Json(req): Json<VoteRequest>,
) -> AppResult<impl IntoResponse> {
    req.validate()?;

    let identity = state.identity_service.resolve(raw);
    state.rate_limiter.check_vote(&identity).await?;

    let outcome = state
        .vote_service
        .cast_vote(
            VoteInput {
                poll_id: id,
                option_id: req.option_id,
                idempotency_key,
            },
            &identity,
        )
        .await?;

    // Hand a minted device token back both ways: cookie for browsers,
    // header for clients that manage the token themselves.
    let mut headers = HeaderMap::new();
    let jar = match identity.minted_device_token {
        Some(token) => {
            if let Ok(value) = HeaderValue::from_str(&token) {
                headers.insert(DEVICE_HEADER, value);
            }
            jar.add(device_cookie(token))
        }
        None => jar,
    };

    Ok((jar, headers, Json(VoteResponse::from(outcome))))
}

fn device_cookie(token: String) -> Cookie<'static> {
    Cookie::build((DEVICE_COOKIE, token))
        .path("/")
        .max_age(time::Duration::days(DEVICE_COOKIE_DAYS))
        .same_site(SameSite::Lax)
        .http_only(true)
        .build()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_device_cookie_attributes() {
        let cookie = device_cookie("tok123".to_string());
        assert_eq!(cookie.name(), DEVICE_COOKIE);
        assert_eq!(cookie.value(), "tok123");
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(
            cookie.max_age(),
            Some(time::Duration::days(DEVICE_COOKIE_DAYS))
        );
    }

    #[test]
    fn test_vote_request_validation() {
        let ok = VoteRequest {
            option_id: "o1".to_string(),
        };
        assert!(ok.validate().is_ok());

        let empty = VoteRequest {
            option_id: String::new(),
        };
        assert!(empty.validate().is_err());
    }

    #[test]
    fn test_vote_request_camel_case() {
        let req: VoteRequest = serde_json::from_str(r#"{"optionId": "o1"}"#).unwrap();
        assert_eq!(req.option_id, "o1");
    }
}
