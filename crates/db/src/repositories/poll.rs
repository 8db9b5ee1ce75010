//! Poll repository.

use std::collections::HashMap;
use std::sync::Arc;

use crate::entities::{Poll, PollOption, PollTopic, poll, poll_option, poll_topic};
use chrono::Utc;
use pollwave_common::{AppError, AppResult};
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, JoinType, QueryFilter, QueryOrder,
    QuerySelect, RelationTrait,
};

/// Filters applied to the feed candidate query before scoring.
#[derive(Debug, Clone, Default)]
pub struct FeedFilter {
    /// Only polls tagged with this topic.
    pub topic_id: Option<String>,
    /// Only polls by this author.
    pub author_id: Option<String>,
}

/// Poll repository for database operations.
#[derive(Clone)]
pub struct PollRepository {
    db: Arc<DatabaseConnection>,
}

impl PollRepository {
    /// Create a new poll repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a poll by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<poll::Model>> {
        Poll::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a poll by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<poll::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::PollNotFound(id.to_string()))
    }

    /// List a poll's options in display order.
    pub async fn find_options(&self, poll_id: &str) -> AppResult<Vec<poll_option::Model>> {
        PollOption::find()
            .filter(poll_option::Column::PollId.eq(poll_id))
            .order_by_asc(poll_option::Column::Ordinal)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find an option by ID, scoped to its poll.
    pub async fn find_option(
        &self,
        option_id: &str,
        poll_id: &str,
    ) -> AppResult<Option<poll_option::Model>> {
        PollOption::find_by_id(option_id)
            .filter(poll_option::Column::PollId.eq(poll_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Feed candidates: public, not hidden, not frozen, not closed by time,
    /// newest first, with optional topic/author filters. `limit` bounds the
    /// scoring working set.
    pub async fn feed_candidates(
        &self,
        filter: &FeedFilter,
        limit: u64,
    ) -> AppResult<Vec<poll::Model>> {
        let mut query = Poll::find()
            .filter(poll::Column::Visibility.eq(poll::Visibility::Public))
            .filter(poll::Column::IsHidden.eq(false))
            .filter(poll::Column::IsFrozen.eq(false))
            .filter(
                Condition::any()
                    .add(poll::Column::ClosesAt.is_null())
                    .add(poll::Column::ClosesAt.gt(Utc::now())),
            );

        if let Some(author_id) = &filter.author_id {
            query = query.filter(poll::Column::AuthorId.eq(author_id));
        }
        if let Some(topic_id) = &filter.topic_id {
            query = query
                .join_rev(JoinType::InnerJoin, poll_topic::Relation::Poll.def())
                .filter(poll_topic::Column::TopicId.eq(topic_id));
        }

        query
            .order_by_desc(poll::Column::CreatedAt)
            .order_by_desc(poll::Column::Id)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Topic IDs per poll for a set of polls.
    pub async fn topic_ids_by_poll(
        &self,
        poll_ids: &[String],
    ) -> AppResult<HashMap<String, Vec<String>>> {
        if poll_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let links = PollTopic::find()
            .filter(poll_topic::Column::PollId.is_in(poll_ids.iter().cloned()))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let mut map: HashMap<String, Vec<String>> = HashMap::new();
        for link in links {
            map.entry(link.poll_id).or_default().push(link.topic_id);
        }
        Ok(map)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn create_test_poll(id: &str) -> poll::Model {
        poll::Model {
            id: id.to_string(),
            author_id: "u1".to_string(),
            title: "Best editor?".to_string(),
            visibility: poll::Visibility::Public,
            results_mode: poll::ResultsMode::Open,
            is_hidden: false,
            is_frozen: false,
            closes_at: None,
            created_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_get_by_id_not_found() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<poll::Model>::new()])
                .into_connection(),
        );

        let repo = PollRepository::new(db);
        let result = repo.get_by_id("missing").await;
        match result {
            Err(AppError::PollNotFound(id)) => assert_eq!(id, "missing"),
            _ => panic!("Expected PollNotFound"),
        }
    }

    #[tokio::test]
    async fn test_find_option_scoped_to_poll() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<poll_option::Model>::new()])
                .into_connection(),
        );

        let repo = PollRepository::new(db);
        let found = repo.find_option("o1", "other-poll").await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_feed_candidates_returns_models() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([vec![create_test_poll("p1"), create_test_poll("p2")]])
                .into_connection(),
        );

        let repo = PollRepository::new(db);
        let candidates = repo
            .feed_candidates(&FeedFilter::default(), 100)
            .await
            .unwrap();
        assert_eq!(candidates.len(), 2);
    }

    #[tokio::test]
    async fn test_topic_ids_by_poll_empty_input_skips_query() {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());

        let repo = PollRepository::new(db);
        let map = repo.topic_ids_by_poll(&[]).await.unwrap();
        assert!(map.is_empty());
    }
}
