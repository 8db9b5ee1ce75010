//! Vote ledger repository.
//!
//! The ledger is append-only; cross-request atomicity comes from the store's
//! partial unique indexes, not from in-process locking. An insert that loses
//! the check-then-act race surfaces as [`VoteInsert::Conflict`] instead of an
//! error.

use std::collections::HashMap;
use std::sync::Arc;

use crate::entities::{Vote, vote};
use chrono::{DateTime, Utc};
use pollwave_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter,
    QuerySelect, SqlErr,
};

/// Outcome of a ledger insert attempt.
#[derive(Debug)]
pub enum VoteInsert {
    /// The row was written.
    Inserted(vote::Model),
    /// A unique constraint fired: another vote already holds one of this
    /// identity's channels (or the idempotency key) for the poll.
    Conflict,
}

/// Vote repository for database operations.
#[derive(Clone)]
pub struct VoteRepository {
    db: Arc<DatabaseConnection>,
}

impl VoteRepository {
    /// Create a new vote repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a vote by `(poll, idempotency_key)`.
    pub async fn find_by_idempotency_key(
        &self,
        poll_id: &str,
        key: &str,
    ) -> AppResult<Option<vote::Model>> {
        Vote::find()
            .filter(vote::Column::PollId.eq(poll_id))
            .filter(vote::Column::IdempotencyKey.eq(key))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find an existing vote for the poll matching the voter on *any*
    /// resolved identity channel (account OR device OR network).
    pub async fn find_by_identity(
        &self,
        poll_id: &str,
        account_id: Option<&str>,
        device_hash: Option<&str>,
        network_hash: Option<&str>,
    ) -> AppResult<Option<vote::Model>> {
        let mut cond = Condition::any();
        if let Some(account_id) = account_id {
            cond = cond.add(vote::Column::AccountId.eq(account_id));
        }
        if let Some(device_hash) = device_hash {
            cond = cond.add(vote::Column::DeviceHash.eq(device_hash));
        }
        if let Some(network_hash) = network_hash {
            cond = cond.add(vote::Column::NetworkHash.eq(network_hash));
        }
        if cond.is_empty() {
            return Ok(None);
        }

        Vote::find()
            .filter(vote::Column::PollId.eq(poll_id))
            .filter(cond)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Insert a vote, folding unique-constraint violations into
    /// [`VoteInsert::Conflict`].
    pub async fn insert(&self, model: vote::ActiveModel) -> AppResult<VoteInsert> {
        match model.insert(self.db.as_ref()).await {
            Ok(inserted) => Ok(VoteInsert::Inserted(inserted)),
            Err(e) => {
                if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
                    Ok(VoteInsert::Conflict)
                } else {
                    Err(AppError::Database(e.to_string()))
                }
            }
        }
    }

    /// All votes for a poll (aggregate recompute input).
    pub async fn find_by_poll(&self, poll_id: &str) -> AppResult<Vec<vote::Model>> {
        Vote::find()
            .filter(vote::Column::PollId.eq(poll_id))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count votes per option for a poll.
    pub async fn counts_by_option(&self, poll_id: &str) -> AppResult<HashMap<String, i64>> {
        let votes = self.find_by_poll(poll_id).await?;
        let mut counts: HashMap<String, i64> = HashMap::new();
        for v in votes {
            *counts.entry(v.option_id).or_insert(0) += 1;
        }
        Ok(counts)
    }

    /// Of the given polls, the subset this identity has voted in, matched on
    /// any resolved channel (account OR device OR network).
    pub async fn voted_poll_ids(
        &self,
        account_id: Option<&str>,
        device_hash: Option<&str>,
        network_hash: Option<&str>,
        poll_ids: &[String],
    ) -> AppResult<Vec<String>> {
        let mut cond = Condition::any();
        if let Some(account_id) = account_id {
            cond = cond.add(vote::Column::AccountId.eq(account_id));
        }
        if let Some(device_hash) = device_hash {
            cond = cond.add(vote::Column::DeviceHash.eq(device_hash));
        }
        if let Some(network_hash) = network_hash {
            cond = cond.add(vote::Column::NetworkHash.eq(network_hash));
        }
        if poll_ids.is_empty() || cond.is_empty() {
            return Ok(Vec::new());
        }
        Vote::find()
            .select_only()
            .column(vote::Column::PollId)
            .filter(cond)
            .filter(vote::Column::PollId.is_in(poll_ids.iter().cloned()))
            .distinct()
            .into_tuple::<String>()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a vote by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<vote::Model>> {
        Vote::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Administratively delete a vote. The caller is responsible for
    /// recomputing the affected poll's aggregate.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        Vote::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Poll IDs with any vote activity since the given instant
    /// (reconciliation working set).
    pub async fn poll_ids_with_votes_since(
        &self,
        since: DateTime<Utc>,
    ) -> AppResult<Vec<String>> {
        Vote::find()
            .select_only()
            .column(vote::Column::PollId)
            .filter(vote::Column::CreatedAt.gte(since))
            .distinct()
            .into_tuple::<String>()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::collections::BTreeMap;

    fn create_test_vote(id: &str, poll_id: &str, option_id: &str) -> vote::Model {
        vote::Model {
            id: id.to_string(),
            poll_id: poll_id.to_string(),
            option_id: option_id.to_string(),
            account_id: None,
            device_hash: Some("devhash".to_string()),
            network_hash: Some("nethash".to_string()),
            idempotency_key: None,
            created_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_find_by_identity_no_channels_is_none() {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());

        let repo = VoteRepository::new(db);
        let found = repo.find_by_identity("p1", None, None, None).await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_find_by_identity_found() {
        let vote = create_test_vote("v1", "p1", "o1");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[vote.clone()]])
                .into_connection(),
        );

        let repo = VoteRepository::new(db);
        let found = repo
            .find_by_identity("p1", None, Some("devhash"), None)
            .await
            .unwrap();
        assert_eq!(found.unwrap().option_id, "o1");
    }

    #[tokio::test]
    async fn test_voted_poll_ids_no_channels_is_empty() {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());

        let repo = VoteRepository::new(db);
        let ids = repo
            .voted_poll_ids(None, None, None, &["p1".to_string()])
            .await
            .unwrap();
        assert!(ids.is_empty());
    }

    #[tokio::test]
    async fn test_voted_poll_ids_matches_device_channel() {
        let row: BTreeMap<&str, sea_orm::Value> =
            [("poll_id", sea_orm::Value::from("p1"))].into_iter().collect();

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[row]])
                .into_connection(),
        );

        // An anonymous device voter is matched the same way an account is.
        let repo = VoteRepository::new(db);
        let ids = repo
            .voted_poll_ids(None, Some("devhash"), None, &["p1".to_string(), "p2".to_string()])
            .await
            .unwrap();
        assert_eq!(ids, vec!["p1".to_string()]);
    }

    #[tokio::test]
    async fn test_counts_by_option_groups() {
        let votes = vec![
            create_test_vote("v1", "p1", "o1"),
            create_test_vote("v2", "p1", "o1"),
            create_test_vote("v3", "p1", "o2"),
        ];

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([votes])
                .into_connection(),
        );

        let repo = VoteRepository::new(db);
        let counts = repo.counts_by_option("p1").await.unwrap();
        assert_eq!(counts.get("o1"), Some(&2));
        assert_eq!(counts.get("o2"), Some(&1));
    }
}
