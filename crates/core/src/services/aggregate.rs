//! Aggregate maintenance service.
//!
//! `poll_stats` holds one denormalized row per poll, always recomputed from a
//! full scan of the vote ledger. The full scan is the correctness anchor:
//! recompute is idempotent, and concurrent recomputes converge because each
//! one overwrites the row with a complete snapshot.

use std::collections::HashMap;

use pollwave_common::AppResult;
use pollwave_db::repositories::{PollStatsRepository, VoteRepository};
use serde_json::json;
use tracing::warn;

/// Denormalized vote aggregate for one poll.
#[derive(Debug, Clone)]
pub struct PollAggregate {
    pub poll_id: String,
    pub total_votes: i64,
    /// Vote count per option, built from vote rows alone; options nobody has
    /// voted for are absent.
    pub counts: HashMap<String, i64>,
}

impl PollAggregate {
    /// Vote share per option as percentages, rounded to two decimals.
    /// All zeros when the poll has no votes.
    #[must_use]
    pub fn percents(&self) -> HashMap<String, f64> {
        self.counts
            .iter()
            .map(|(option_id, &count)| {
                let pct = if self.total_votes > 0 {
                    let raw = count as f64 * 100.0 / self.total_votes as f64;
                    (raw * 100.0).round() / 100.0
                } else {
                    0.0
                };
                (option_id.clone(), pct)
            })
            .collect()
    }
}

/// Aggregate service for recomputing and reading poll stats.
#[derive(Clone)]
pub struct AggregateService {
    vote_repo: VoteRepository,
    stats_repo: PollStatsRepository,
}

impl AggregateService {
    /// Create a new aggregate service.
    #[must_use]
    pub const fn new(vote_repo: VoteRepository, stats_repo: PollStatsRepository) -> Self {
        Self {
            vote_repo,
            stats_repo,
        }
    }

    /// Recompute the aggregate for a poll from the vote ledger and persist
    /// the snapshot.
    pub async fn recompute(&self, poll_id: &str) -> AppResult<PollAggregate> {
        let counts = self.vote_repo.counts_by_option(poll_id).await?;
        let total_votes: i64 = counts.values().sum();

        self.stats_repo
            .upsert(poll_id, total_votes, json!(counts))
            .await?;

        Ok(PollAggregate {
            poll_id: poll_id.to_string(),
            total_votes,
            counts,
        })
    }

    /// Read the stored aggregate, recomputing when no snapshot exists yet.
    pub async fn load(&self, poll_id: &str) -> AppResult<PollAggregate> {
        match self.stats_repo.find_by_poll(poll_id).await? {
            Some(stats) => {
                let counts: HashMap<String, i64> =
                    serde_json::from_value(stats.option_counts).unwrap_or_else(|e| {
                        warn!(poll_id = %poll_id, error = %e, "Malformed option_counts, recomputing lazily");
                        HashMap::new()
                    });
                if counts.is_empty() && stats.total_votes > 0 {
                    return self.recompute(poll_id).await;
                }
                Ok(PollAggregate {
                    poll_id: poll_id.to_string(),
                    total_votes: stats.total_votes,
                    counts,
                })
            }
            None => self.recompute(poll_id).await,
        }
    }

    /// Stored aggregates for a batch of polls, keyed by poll ID. Polls with
    /// no snapshot are simply absent (treated as zero votes by callers).
    pub async fn load_many(
        &self,
        poll_ids: &[String],
    ) -> AppResult<HashMap<String, PollAggregate>> {
        let rows = self.stats_repo.find_by_polls(poll_ids).await?;
        Ok(rows
            .into_iter()
            .map(|(poll_id, stats)| {
                let counts =
                    serde_json::from_value(stats.option_counts).unwrap_or_default();
                (
                    poll_id.clone(),
                    PollAggregate {
                        poll_id,
                        total_votes: stats.total_votes,
                        counts,
                    },
                )
            })
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::Utc;
    use pollwave_db::entities::{poll_stats, vote};
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn aggregate(counts: &[(&str, i64)]) -> PollAggregate {
        let counts: HashMap<String, i64> =
            counts.iter().map(|(k, v)| ((*k).to_string(), *v)).collect();
        PollAggregate {
            poll_id: "p1".to_string(),
            total_votes: counts.values().sum(),
            counts,
        }
    }

    #[test]
    fn test_percents_rounded_two_decimals() {
        let agg = aggregate(&[("o1", 1), ("o2", 2)]);
        let pct = agg.percents();
        assert!((pct["o1"] - 33.33).abs() < f64::EPSILON);
        assert!((pct["o2"] - 66.67).abs() < f64::EPSILON);
    }

    #[test]
    fn test_percents_zero_votes() {
        let agg = aggregate(&[("o1", 0), ("o2", 0)]);
        let pct = agg.percents();
        assert!((pct["o1"]).abs() < f64::EPSILON);
        assert!((pct["o2"]).abs() < f64::EPSILON);
    }

    #[test]
    fn test_percents_single_option() {
        let agg = aggregate(&[("o1", 7)]);
        assert!((agg.percents()["o1"] - 100.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_recompute_counts_only_voted_options() {
        let votes = vec![vote::Model {
            id: "v1".to_string(),
            poll_id: "p1".to_string(),
            option_id: "o1".to_string(),
            account_id: None,
            device_hash: Some("devhash".to_string()),
            network_hash: None,
            idempotency_key: None,
            created_at: Utc::now().into(),
        }];
        let stats_row = poll_stats::Model {
            poll_id: "p1".to_string(),
            total_votes: 1,
            option_counts: serde_json::json!({"o1": 1}),
            updated_at: Utc::now().into(),
        };

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([votes])
                .append_query_results([[stats_row]])
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }])
                .into_connection(),
        );
        let service = AggregateService::new(
            VoteRepository::new(Arc::clone(&db)),
            PollStatsRepository::new(db),
        );

        // A two-option poll with one vote for o1: the unvoted option does
        // not appear in the counts map at all.
        let agg = service.recompute("p1").await.unwrap();
        assert_eq!(agg.total_votes, 1);
        assert_eq!(agg.counts.len(), 1);
        assert_eq!(agg.counts.get("o1"), Some(&1));
    }
}
