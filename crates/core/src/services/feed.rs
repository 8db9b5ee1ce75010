//! Feed ranking service.
//!
//! Scores eligible public polls per viewer and pages through them with a
//! keyset cursor. The cursor encodes the last returned `(score, created_at,
//! id)` key, and the next page seeks strictly past it, so polls created after
//! a client started paging never reshuffle what it has already seen.

use std::collections::{HashMap, HashSet};

use crate::services::aggregate::AggregateService;
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use pollwave_common::AppResult;
use pollwave_common::config::FeedConfig;
use pollwave_db::entities::poll::{self, ResultsMode};
use pollwave_db::repositories::{FeedFilter, FollowRepository, PollRepository, VoteRepository};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// How many candidates are scored per request before paging. Bounds memory
/// on very large poll sets; older low-scoring polls fall off the feed.
const CANDIDATE_WINDOW: u64 = 500;

/// Hard ceiling on the requested page size.
const MAX_PAGE_SIZE: u64 = 50;

/// The requesting viewer's resolved identity channels. All `None` for a
/// viewer presenting nothing.
#[derive(Debug, Clone, Default)]
pub struct Viewer {
    pub account_id: Option<String>,
    pub device_hash: Option<String>,
    pub network_hash: Option<String>,
}

/// Pre-scoring feed filters.
#[derive(Debug, Clone, Default)]
pub struct FeedFilters {
    pub topic_id: Option<String>,
    pub author_id: Option<String>,
}

/// Keyset cursor: the ranking key of the last item the client has seen.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedCursor {
    pub score: f64,
    pub created_at: DateTime<Utc>,
    pub id: String,
}

impl FeedCursor {
    /// Encode as URL-safe base64 JSON.
    #[must_use]
    pub fn encode(&self) -> String {
        // Serialization of a plain struct cannot fail.
        let json = serde_json::to_vec(self).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json)
    }

    /// Decode a client-supplied cursor. `None` for anything malformed.
    #[must_use]
    pub fn decode(raw: &str) -> Option<Self> {
        let bytes = URL_SAFE_NO_PAD.decode(raw).ok()?;
        serde_json::from_slice(&bytes).ok()
    }
}

/// One ranked feed entry.
#[derive(Debug, Clone)]
pub struct FeedItem {
    pub poll: poll::Model,
    pub score: f64,
    /// `None` when the poll's results policy hides counts from this viewer.
    pub total_votes: Option<i64>,
    pub counts: Option<HashMap<String, i64>>,
}

/// One page of the ranked feed.
#[derive(Debug, Clone)]
pub struct FeedPage {
    pub items: Vec<FeedItem>,
    pub next_cursor: Option<String>,
}

/// Feed service for ranking and pagination.
#[derive(Clone)]
pub struct FeedService {
    poll_repo: PollRepository,
    vote_repo: VoteRepository,
    follow_repo: FollowRepository,
    aggregate: AggregateService,
    config: FeedConfig,
}

impl FeedService {
    /// Create a new feed service.
    #[must_use]
    pub const fn new(
        poll_repo: PollRepository,
        vote_repo: VoteRepository,
        follow_repo: FollowRepository,
        aggregate: AggregateService,
        config: FeedConfig,
    ) -> Self {
        Self {
            poll_repo,
            vote_repo,
            follow_repo,
            aggregate,
            config,
        }
    }

    /// Rank the feed for a viewer and return one page.
    pub async fn rank_feed(
        &self,
        viewer: &Viewer,
        filters: &FeedFilters,
        cursor: Option<&str>,
        limit: Option<u64>,
    ) -> AppResult<FeedPage> {
        let limit = limit.unwrap_or(self.config.page_size).clamp(1, MAX_PAGE_SIZE) as usize;

        let cursor = match cursor {
            Some(raw) => match FeedCursor::decode(raw) {
                Some(c) => Some(c),
                None => {
                    debug!("Malformed feed cursor, returning empty page");
                    return Ok(FeedPage {
                        items: vec![],
                        next_cursor: None,
                    });
                }
            },
            None => None,
        };

        let candidates = self
            .poll_repo
            .feed_candidates(
                &FeedFilter {
                    topic_id: filters.topic_id.clone(),
                    author_id: filters.author_id.clone(),
                },
                CANDIDATE_WINDOW,
            )
            .await?;

        let poll_ids: Vec<String> = candidates.iter().map(|p| p.id.clone()).collect();
        let topics = self.poll_repo.topic_ids_by_poll(&poll_ids).await?;
        let aggregates = self.aggregate.load_many(&poll_ids).await?;

        let (followed_authors, followed_topics) = match viewer.account_id.as_deref() {
            Some(account_id) => (
                self.follow_repo.followed_author_ids(account_id).await?,
                self.follow_repo.followed_topic_ids(account_id).await?,
            ),
            None => (HashSet::new(), HashSet::new()),
        };

        let now = Utc::now();
        let mut scored: Vec<(f64, poll::Model, i64)> = candidates
            .into_iter()
            .map(|p| {
                let total_votes = aggregates.get(&p.id).map_or(0, |a| a.total_votes);
                let interest = interest_signal(
                    &p.author_id,
                    topics.get(&p.id).map_or(&[][..], Vec::as_slice),
                    &followed_authors,
                    &followed_topics,
                );
                let score = self.score(total_votes, p.created_at.with_timezone(&Utc), now, interest);
                (score, p, total_votes)
            })
            .collect();

        scored.sort_by(|a, b| {
            b.0.total_cmp(&a.0)
                .then_with(|| b.1.created_at.cmp(&a.1.created_at))
                .then_with(|| b.1.id.cmp(&a.1.id))
        });

        let after_cursor = scored.into_iter().filter(|(score, p, _)| match &cursor {
            Some(c) => ranks_after(*score, &p.created_at.with_timezone(&Utc), &p.id, c),
            None => true,
        });

        let voted_polls = self.voted_polls(viewer, &poll_ids).await?;

        let mut items = Vec::with_capacity(limit);
        let mut remainder = false;
        for (score, p, total_votes) in after_cursor {
            if items.len() == limit {
                remainder = true;
                break;
            }
            let show_results = results_visible(&p, voted_polls.contains(&p.id));
            let counts = if show_results {
                Some(
                    aggregates
                        .get(&p.id)
                        .map(|a| a.counts.clone())
                        .unwrap_or_default(),
                )
            } else {
                None
            };
            items.push(FeedItem {
                total_votes: show_results.then_some(total_votes),
                counts,
                score,
                poll: p,
            });
        }

        let next_cursor = if remainder {
            items.last().map(|last| {
                FeedCursor {
                    score: last.score,
                    created_at: last.poll.created_at.with_timezone(&Utc),
                    id: last.poll.id.clone(),
                }
                .encode()
            })
        } else {
            None
        };

        Ok(FeedPage { items, next_cursor })
    }

    /// `score = wTrend·ln(1+votes) + wFresh·exp(-ageHours/24) + wInterest·interest`
    #[must_use]
    pub fn score(
        &self,
        total_votes: i64,
        created_at: DateTime<Utc>,
        now: DateTime<Utc>,
        interest: f64,
    ) -> f64 {
        let age_hours = (now - created_at).num_seconds().max(0) as f64 / 3600.0;
        let trend = (1.0 + total_votes.max(0) as f64).ln();
        let freshness = (-age_hours / 24.0).exp();
        self.config.w_trend * trend
            + self.config.w_fresh * freshness
            + self.config.w_interest * interest
    }

    /// Polls this viewer has voted in, matched on any identity channel, so
    /// `hidden_until_vote` results unlock for anonymous device voters too.
    async fn voted_polls(&self, viewer: &Viewer, poll_ids: &[String]) -> AppResult<HashSet<String>> {
        if viewer.account_id.is_none() && viewer.device_hash.is_none() && viewer.network_hash.is_none() {
            return Ok(HashSet::new());
        }
        Ok(self
            .vote_repo
            .voted_poll_ids(
                viewer.account_id.as_deref(),
                viewer.device_hash.as_deref(),
                viewer.network_hash.as_deref(),
                poll_ids,
            )
            .await?
            .into_iter()
            .collect())
    }
}

/// Follow-graph interest: +1 for a followed author, +1 for any followed
/// tagged topic. Always 0 for anonymous viewers (both sets empty).
fn interest_signal(
    author_id: &str,
    topic_ids: &[String],
    followed_authors: &HashSet<String>,
    followed_topics: &HashSet<String>,
) -> f64 {
    let mut interest = 0.0;
    if followed_authors.contains(author_id) {
        interest += 1.0;
    }
    if topic_ids.iter().any(|t| followed_topics.contains(t)) {
        interest += 1.0;
    }
    interest
}

/// Whether the poll's results policy exposes counts to this viewer in the
/// feed. Feed polls are never past close time, so `hidden_until_close`
/// always hides here.
fn results_visible(p: &poll::Model, viewer_voted: bool) -> bool {
    match p.results_mode {
        ResultsMode::Open => true,
        ResultsMode::HiddenUntilVote => viewer_voted,
        ResultsMode::HiddenUntilClose => p.is_closed_by_time(),
    }
}

/// `true` when the item sits strictly after the cursor in the total order
/// (score desc, created_at desc, id desc).
fn ranks_after(score: f64, created_at: &DateTime<Utc>, id: &str, cursor: &FeedCursor) -> bool {
    match score.total_cmp(&cursor.score) {
        std::cmp::Ordering::Less => true,
        std::cmp::Ordering::Greater => false,
        std::cmp::Ordering::Equal => match created_at.cmp(&cursor.created_at) {
            std::cmp::Ordering::Less => true,
            std::cmp::Ordering::Greater => false,
            std::cmp::Ordering::Equal => id < cursor.id.as_str(),
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn config() -> FeedConfig {
        FeedConfig::default()
    }

    fn service_score(votes: i64, age_hours: i64, interest: f64) -> f64 {
        let cfg = config();
        cfg.w_trend * (1.0 + votes as f64).ln()
            + cfg.w_fresh * (-(age_hours as f64) / 24.0).exp()
            + cfg.w_interest * interest
    }

    #[test]
    fn test_score_fresh_empty_vs_old_popular() {
        // Poll A: 1 hour old, 0 votes. Poll B: 48 hours old, 100 votes.
        let a = service_score(0, 1, 0.0);
        let b = service_score(100, 48, 0.0);

        let expected_a = 0.6 * 1.0_f64.ln() + 0.4 * (-1.0_f64 / 24.0).exp();
        let expected_b = 0.6 * 101.0_f64.ln() + 0.4 * (-48.0_f64 / 24.0).exp();
        assert!((a - expected_a).abs() < 1e-9);
        assert!((b - expected_b).abs() < 1e-9);
        // The formula, not recency alone, decides: B's vote mass wins.
        assert!(b > a);
    }

    #[test]
    fn test_interest_lifts_score() {
        let plain = service_score(10, 5, 0.0);
        let followed = service_score(10, 5, 2.0);
        assert!((followed - plain - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_interest_signal() {
        let authors: HashSet<String> = ["a1".to_string()].into_iter().collect();
        let topics: HashSet<String> = ["t1".to_string()].into_iter().collect();

        let both = interest_signal(
            "a1",
            &["t1".to_string(), "t9".to_string()],
            &authors,
            &topics,
        );
        assert!((both - 2.0).abs() < f64::EPSILON);

        let none = interest_signal("a2", &["t2".to_string()], &authors, &topics);
        assert!(none.abs() < f64::EPSILON);
    }

    #[test]
    fn test_cursor_round_trip() {
        let cursor = FeedCursor {
            score: 1.2345,
            created_at: Utc::now(),
            id: "01hq0000000000000000000000".to_string(),
        };
        let decoded = FeedCursor::decode(&cursor.encode()).unwrap();
        assert!((decoded.score - cursor.score).abs() < f64::EPSILON);
        assert_eq!(decoded.id, cursor.id);
        assert_eq!(decoded.created_at, cursor.created_at);
    }

    #[test]
    fn test_cursor_decode_garbage() {
        assert!(FeedCursor::decode("not base64!!").is_none());
        assert!(FeedCursor::decode("aGVsbG8").is_none()); // valid base64, not a cursor
    }

    #[test]
    fn test_ranks_after_total_order() {
        let t = Utc::now();
        let cursor = FeedCursor {
            score: 2.0,
            created_at: t,
            id: "m".to_string(),
        };

        // Lower score ranks after.
        assert!(ranks_after(1.5, &t, "z", &cursor));
        // Higher score ranks before.
        assert!(!ranks_after(2.5, &t, "a", &cursor));
        // Same score, older ranks after.
        assert!(ranks_after(2.0, &(t - Duration::hours(1)), "z", &cursor));
        // Same score and time, smaller id ranks after.
        assert!(ranks_after(2.0, &t, "a", &cursor));
        // The cursor element itself is excluded.
        assert!(!ranks_after(2.0, &t, "m", &cursor));
    }
}
