//! Poll aggregate snapshot repository.

use std::collections::HashMap;
use std::sync::Arc;

use crate::entities::{PollStats, poll_stats};
use chrono::Utc;
use pollwave_common::{AppError, AppResult};
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};

/// Poll stats repository for database operations.
#[derive(Clone)]
pub struct PollStatsRepository {
    db: Arc<DatabaseConnection>,
}

impl PollStatsRepository {
    /// Create a new poll stats repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find the aggregate snapshot for a poll.
    pub async fn find_by_poll(&self, poll_id: &str) -> AppResult<Option<poll_stats::Model>> {
        PollStats::find_by_id(poll_id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Fetch snapshots for a batch of polls, keyed by poll ID.
    pub async fn find_by_polls(
        &self,
        poll_ids: &[String],
    ) -> AppResult<HashMap<String, poll_stats::Model>> {
        if poll_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = PollStats::find()
            .filter(poll_stats::Column::PollId.is_in(poll_ids.iter().cloned()))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(rows.into_iter().map(|s| (s.poll_id.clone(), s)).collect())
    }

    /// Write a recomputed snapshot, replacing any existing row for the poll.
    pub async fn upsert(
        &self,
        poll_id: &str,
        total_votes: i64,
        option_counts: serde_json::Value,
    ) -> AppResult<()> {
        let model = poll_stats::ActiveModel {
            poll_id: Set(poll_id.to_string()),
            total_votes: Set(total_votes),
            option_counts: Set(option_counts),
            updated_at: Set(Utc::now().into()),
        };

        PollStats::insert(model)
            .on_conflict(
                OnConflict::column(poll_stats::Column::PollId)
                    .update_columns([
                        poll_stats::Column::TotalVotes,
                        poll_stats::Column::OptionCounts,
                        poll_stats::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn create_test_stats(poll_id: &str, total: i64) -> poll_stats::Model {
        poll_stats::Model {
            poll_id: poll_id.to_string(),
            total_votes: total,
            option_counts: serde_json::json!({"o1": total}),
            updated_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_find_by_poll_found() {
        let stats = create_test_stats("p1", 5);

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[stats]])
                .into_connection(),
        );

        let repo = PollStatsRepository::new(db);
        let found = repo.find_by_poll("p1").await.unwrap().unwrap();
        assert_eq!(found.total_votes, 5);
    }

    #[tokio::test]
    async fn test_find_by_polls_empty_input() {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());

        let repo = PollStatsRepository::new(db);
        let map = repo.find_by_polls(&[]).await.unwrap();
        assert!(map.is_empty());
    }

    #[tokio::test]
    async fn test_find_by_polls_keys_by_poll_id() {
        let rows = vec![create_test_stats("p1", 3), create_test_stats("p2", 7)];

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([rows])
                .into_connection(),
        );

        let repo = PollStatsRepository::new(db);
        let map = repo
            .find_by_polls(&["p1".to_string(), "p2".to_string()])
            .await
            .unwrap();
        assert_eq!(map.get("p1").unwrap().total_votes, 3);
        assert_eq!(map.get("p2").unwrap().total_votes, 7);
    }
}
