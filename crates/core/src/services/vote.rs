//! Vote casting service.
//!
//! One vote per identity channel per poll, enforced twice: a read-side check
//! for the common path, and the ledger's partial unique indexes for the
//! concurrent one. A unique violation on insert is not an error: it means
//! somebody (possibly this same client retrying) won the race, and the
//! surviving row's option is what the caller is told.

use std::collections::HashMap;
use std::sync::Arc;

use crate::services::aggregate::{AggregateService, PollAggregate};
use crate::services::event_publisher::EventPublisher;
use crate::services::identity::ResolvedIdentity;
use pollwave_common::{AppError, AppResult, IdGenerator};
use pollwave_db::{
    entities::vote,
    repositories::{PollRepository, VoteInsert, VoteRepository},
};
use sea_orm::Set;
use tracing::warn;

/// Maximum stored idempotency-key length; longer keys are truncated.
pub const IDEMPOTENCY_KEY_MAX: usize = 64;

/// Input for casting a vote.
#[derive(Debug, Clone)]
pub struct VoteInput {
    pub poll_id: String,
    pub option_id: String,
    pub idempotency_key: Option<String>,
}

/// Outcome of a vote cast, always carrying the freshest known aggregate.
#[derive(Debug, Clone)]
pub struct VoteOutcome {
    pub poll_id: String,
    /// The option actually on record for this identity. On replay this is
    /// the original vote's option, not the requested one.
    pub voted_option_id: String,
    pub already_voted: bool,
    pub idempotent: bool,
    pub total_votes: i64,
    pub counts: HashMap<String, i64>,
    pub percents: HashMap<String, f64>,
}

/// Vote service for business logic.
#[derive(Clone)]
pub struct VoteService {
    poll_repo: PollRepository,
    vote_repo: VoteRepository,
    aggregate: AggregateService,
    publisher: Arc<dyn EventPublisher>,
    id_gen: IdGenerator,
}

impl VoteService {
    /// Create a new vote service.
    #[must_use]
    pub fn new(
        poll_repo: PollRepository,
        vote_repo: VoteRepository,
        aggregate: AggregateService,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            poll_repo,
            vote_repo,
            aggregate,
            publisher,
            id_gen: IdGenerator::new(),
        }
    }

    /// Cast a vote for an identity.
    ///
    /// Repeated attempts from the same identity always resolve to the
    /// original option; the per-identity state machine is `Unvoted → Voted`,
    /// one-way.
    pub async fn cast_vote(
        &self,
        input: VoteInput,
        identity: &ResolvedIdentity,
    ) -> AppResult<VoteOutcome> {
        let poll = self.poll_repo.get_by_id(&input.poll_id).await?;
        // Hidden, frozen and time-closed are the same refusal: the poll is
        // not accepting votes.
        if poll.is_hidden || poll.is_frozen || poll.is_closed_by_time() {
            return Err(AppError::PollClosed(input.poll_id));
        }

        let option = self
            .poll_repo
            .find_option(&input.option_id, &poll.id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "Option {} not found in poll {}",
                    input.option_id, poll.id
                ))
            })?;

        let idempotency_key = input
            .idempotency_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .map(|k| truncate_key(k));

        // Replay short-circuit: same (poll, key) always returns the stored
        // vote, regardless of what option the retry asked for.
        if let Some(key) = idempotency_key.as_deref() {
            if let Some(existing) = self.vote_repo.find_by_idempotency_key(&poll.id, key).await? {
                return self.outcome(&poll.id, existing.option_id, true, true).await;
            }
        }

        if let Some(existing) = self
            .vote_repo
            .find_by_identity(
                &poll.id,
                identity.account_id.as_deref(),
                identity.device_hash.as_deref(),
                identity.network_hash.as_deref(),
            )
            .await?
        {
            return self
                .outcome(&poll.id, existing.option_id, true, false)
                .await;
        }

        let model = vote::ActiveModel {
            id: Set(self.id_gen.generate()),
            poll_id: Set(poll.id.clone()),
            option_id: Set(option.id.clone()),
            account_id: Set(identity.account_id.clone()),
            device_hash: Set(identity.device_hash.clone()),
            network_hash: Set(identity.network_hash.clone()),
            idempotency_key: Set(idempotency_key.clone()),
            created_at: Set(chrono::Utc::now().into()),
        };

        match self.vote_repo.insert(model).await? {
            VoteInsert::Inserted(inserted) => {
                let aggregate = self.refresh_aggregate(&poll.id).await;
                self.broadcast(&aggregate, &inserted.option_id).await;
                Ok(self.build_outcome(aggregate, inserted.option_id, false, false))
            }
            VoteInsert::Conflict => {
                self.resolve_conflict(&poll.id, identity, idempotency_key)
                    .await
            }
        }
    }

    /// Administratively remove a vote, then recompute and rebroadcast the
    /// poll's aggregate.
    pub async fn delete_vote(&self, vote_id: &str) -> AppResult<()> {
        let vote = self
            .vote_repo
            .find_by_id(vote_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Vote {vote_id} not found")))?;

        self.vote_repo.delete(vote_id).await?;

        let aggregate = self.refresh_aggregate(&vote.poll_id).await;
        if let Err(e) = self
            .publisher
            .publish_stats_updated(&vote.poll_id, aggregate.total_votes, &aggregate.counts)
            .await
        {
            warn!(poll_id = %vote.poll_id, error = %e, "Failed to broadcast stats after vote delete");
        }
        Ok(())
    }

    /// The insert lost the check-then-act race. Re-read the surviving row
    /// (key first, then channels) so replays still report the first call's
    /// option.
    async fn resolve_conflict(
        &self,
        poll_id: &str,
        identity: &ResolvedIdentity,
        idempotency_key: Option<String>,
    ) -> AppResult<VoteOutcome> {
        if let Some(key) = idempotency_key.as_deref() {
            if let Some(existing) = self.vote_repo.find_by_idempotency_key(poll_id, key).await? {
                return self.outcome(poll_id, existing.option_id, true, true).await;
            }
        }
        // The race winner is committed by now; the constraint that fired
        // names one of our channels (or the key, handled above).
        let existing = self
            .vote_repo
            .find_by_identity(
                poll_id,
                identity.account_id.as_deref(),
                identity.device_hash.as_deref(),
                identity.network_hash.as_deref(),
            )
            .await?;
        match existing {
            Some(v) => self.outcome(poll_id, v.option_id, true, false).await,
            None => Err(AppError::Conflict(
                "Vote collided with a concurrent request".to_string(),
            )),
        }
    }

    async fn outcome(
        &self,
        poll_id: &str,
        voted_option_id: String,
        already_voted: bool,
        idempotent: bool,
    ) -> AppResult<VoteOutcome> {
        let aggregate = self.aggregate.load(poll_id).await?;
        Ok(self.build_outcome(aggregate, voted_option_id, already_voted, idempotent))
    }

    fn build_outcome(
        &self,
        aggregate: PollAggregate,
        voted_option_id: String,
        already_voted: bool,
        idempotent: bool,
    ) -> VoteOutcome {
        VoteOutcome {
            poll_id: aggregate.poll_id.clone(),
            voted_option_id,
            already_voted,
            idempotent,
            total_votes: aggregate.total_votes,
            percents: aggregate.percents(),
            counts: aggregate.counts,
        }
    }

    /// Post-insert recompute. Never fails the vote response; on error the
    /// outcome degrades to the last stored snapshot, or zeros.
    async fn refresh_aggregate(&self, poll_id: &str) -> PollAggregate {
        match self.aggregate.recompute(poll_id).await {
            Ok(agg) => agg,
            Err(e) => {
                warn!(poll_id = %poll_id, error = %e, "Aggregate recompute failed after vote insert");
                match self.aggregate.load(poll_id).await {
                    Ok(agg) => agg,
                    Err(_) => PollAggregate {
                        poll_id: poll_id.to_string(),
                        total_votes: 0,
                        counts: HashMap::new(),
                    },
                }
            }
        }
    }

    async fn broadcast(&self, aggregate: &PollAggregate, option_id: &str) {
        if let Err(e) = self
            .publisher
            .publish_vote_accepted(
                &aggregate.poll_id,
                option_id,
                aggregate.total_votes,
                &aggregate.counts,
                &aggregate.percents(),
            )
            .await
        {
            warn!(poll_id = %aggregate.poll_id, error = %e, "Failed to broadcast vote update");
        }
    }
}

/// Truncate an idempotency key to the stored length, on a char boundary.
fn truncate_key(key: &str) -> String {
    key.chars().take(IDEMPOTENCY_KEY_MAX).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::event_publisher::NoopEventPublisher;
    use chrono::Utc;
    use pollwave_db::entities::poll::{self, ResultsMode, Visibility};
    use pollwave_db::entities::{poll_option, poll_stats};
    use pollwave_db::repositories::PollStatsRepository;
    use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase, MockExecResult};

    #[test]
    fn test_truncate_key_short_unchanged() {
        assert_eq!(truncate_key("abc"), "abc");
    }

    #[test]
    fn test_truncate_key_long() {
        let long = "x".repeat(200);
        assert_eq!(truncate_key(&long).len(), IDEMPOTENCY_KEY_MAX);
    }

    fn service(db: Arc<DatabaseConnection>) -> VoteService {
        let poll_repo = PollRepository::new(Arc::clone(&db));
        let vote_repo = VoteRepository::new(Arc::clone(&db));
        let stats_repo = PollStatsRepository::new(Arc::clone(&db));
        let aggregate = AggregateService::new(vote_repo.clone(), stats_repo);
        VoteService::new(poll_repo, vote_repo, aggregate, Arc::new(NoopEventPublisher))
    }

    fn device_identity() -> ResolvedIdentity {
        ResolvedIdentity {
            account_id: None,
            device_hash: Some("devhash".to_string()),
            network_hash: None,
            minted_device_token: None,
        }
    }

    fn test_poll(id: &str, hidden: bool) -> poll::Model {
        poll::Model {
            id: id.to_string(),
            author_id: "u1".to_string(),
            title: "favorite color".to_string(),
            visibility: Visibility::Public,
            results_mode: ResultsMode::Open,
            is_hidden: hidden,
            is_frozen: false,
            closes_at: None,
            created_at: Utc::now().into(),
        }
    }

    fn test_stats(poll_id: &str) -> poll_stats::Model {
        poll_stats::Model {
            poll_id: poll_id.to_string(),
            total_votes: 1,
            option_counts: serde_json::json!({"o1": 1}),
            updated_at: Utc::now().into(),
        }
    }

    fn test_vote(id: &str, poll_id: &str, option_id: &str) -> vote::Model {
        vote::Model {
            id: id.to_string(),
            poll_id: poll_id.to_string(),
            option_id: option_id.to_string(),
            account_id: None,
            device_hash: Some("devhash".to_string()),
            network_hash: None,
            idempotency_key: None,
            created_at: Utc::now().into(),
        }
    }

    fn test_option(id: &str, poll_id: &str, ordinal: i32) -> poll_option::Model {
        poll_option::Model {
            id: id.to_string(),
            poll_id: poll_id.to_string(),
            text: format!("option {ordinal}"),
            ordinal,
        }
    }

    #[tokio::test]
    async fn test_delete_vote_missing_is_not_found() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<vote::Model>::new()])
                .into_connection(),
        );

        let err = service(db).delete_vote("missing").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_vote_recomputes_aggregate() {
        let stats_row = poll_stats::Model {
            poll_id: "p1".to_string(),
            total_votes: 1,
            option_counts: serde_json::json!({"o2": 1}),
            updated_at: Utc::now().into(),
        };

        // Lookup, then recompute scans the remaining votes and the snapshot
        // upsert returns its key.
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[test_vote("v1", "p1", "o1")]])
                .append_query_results([[test_vote("v2", "p1", "o2")]])
                .append_query_results([[stats_row]])
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }])
                .into_connection(),
        );

        service(db).delete_vote("v1").await.unwrap();
    }

    #[tokio::test]
    async fn test_cast_vote_hidden_poll_is_closed() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[test_poll("p1", true)]])
                .into_connection(),
        );

        let input = VoteInput {
            poll_id: "p1".to_string(),
            option_id: "o1".to_string(),
            idempotency_key: None,
        };
        let err = service(db)
            .cast_vote(input, &device_identity())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::PollClosed(_)));
    }

    #[tokio::test]
    async fn test_cast_vote_key_replay_returns_first_option() {
        // A replay with the same key but a different option: the stored
        // vote (o1) wins over the requested option (o2).
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[test_poll("p1", false)]])
                .append_query_results([[test_option("o2", "p1", 1)]])
                .append_query_results([[test_vote("v1", "p1", "o1")]])
                .append_query_results([[test_stats("p1")]])
                .into_connection(),
        );

        let input = VoteInput {
            poll_id: "p1".to_string(),
            option_id: "o2".to_string(),
            idempotency_key: Some("k1".to_string()),
        };
        let outcome = service(db)
            .cast_vote(input, &device_identity())
            .await
            .unwrap();
        assert_eq!(outcome.voted_option_id, "o1");
        assert!(outcome.already_voted);
        assert!(outcome.idempotent);
        assert_eq!(outcome.total_votes, 1);
    }

    #[tokio::test]
    async fn test_cast_vote_channel_match_already_voted() {
        // No idempotency key: the device channel already holds a vote, so
        // no new row is written and the stored option is reported.
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[test_poll("p1", false)]])
                .append_query_results([[test_option("o2", "p1", 1)]])
                .append_query_results([[test_vote("v1", "p1", "o1")]])
                .append_query_results([[test_stats("p1")]])
                .into_connection(),
        );

        let input = VoteInput {
            poll_id: "p1".to_string(),
            option_id: "o2".to_string(),
            idempotency_key: None,
        };
        let outcome = service(db)
            .cast_vote(input, &device_identity())
            .await
            .unwrap();
        assert_eq!(outcome.voted_option_id, "o1");
        assert!(outcome.already_voted);
        assert!(!outcome.idempotent);
    }

    #[tokio::test]
    async fn test_conflict_fallback_reports_surviving_row() {
        // The insert lost the race: the key lookup finds nothing, the
        // channel lookup finds the row the winner committed.
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<vote::Model>::new()])
                .append_query_results([[test_vote("v1", "p1", "o1")]])
                .append_query_results([[test_stats("p1")]])
                .into_connection(),
        );

        let outcome = service(db)
            .resolve_conflict("p1", &device_identity(), Some("k1".to_string()))
            .await
            .unwrap();
        assert_eq!(outcome.voted_option_id, "o1");
        assert!(outcome.already_voted);
        assert!(!outcome.idempotent);
    }
}
