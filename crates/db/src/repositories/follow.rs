//! Follow-graph lookups used by feed personalization.

use std::collections::HashSet;
use std::sync::Arc;

use crate::entities::{FollowAuthor, FollowTopic, follow_author, follow_topic};
use pollwave_common::{AppError, AppResult};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};

/// Follow repository for database operations.
#[derive(Clone)]
pub struct FollowRepository {
    db: Arc<DatabaseConnection>,
}

impl FollowRepository {
    /// Create a new follow repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Author IDs the user follows.
    pub async fn followed_author_ids(&self, user_id: &str) -> AppResult<HashSet<String>> {
        let rows = FollowAuthor::find()
            .filter(follow_author::Column::UserId.eq(user_id))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(rows.into_iter().map(|f| f.author_id).collect())
    }

    /// Topic IDs the user follows.
    pub async fn followed_topic_ids(&self, user_id: &str) -> AppResult<HashSet<String>> {
        let rows = FollowTopic::find()
            .filter(follow_topic::Column::UserId.eq(user_id))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(rows.into_iter().map(|f| f.topic_id).collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn test_followed_topic_ids() {
        let rows = vec![
            follow_topic::Model {
                id: "f1".to_string(),
                user_id: "u1".to_string(),
                topic_id: "t1".to_string(),
                created_at: Utc::now().into(),
            },
            follow_topic::Model {
                id: "f2".to_string(),
                user_id: "u1".to_string(),
                topic_id: "t2".to_string(),
                created_at: Utc::now().into(),
            },
        ];

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([rows])
                .into_connection(),
        );

        let repo = FollowRepository::new(db);
        let topics = repo.followed_topic_ids("u1").await.unwrap();
        assert!(topics.contains("t1"));
        assert!(topics.contains("t2"));
    }
}
